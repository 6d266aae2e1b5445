//! Output Namer: filename patterns per artifact kind.
//!
//! Patterns use bracket placeholders:
//!
//! | placeholder        | value                                        |
//! |--------------------|----------------------------------------------|
//! | `[name]`           | chunk or asset name                          |
//! | `[ext]`            | asset extension, without the leading dot     |
//! | `[contenthash:N]`  | digest of the emitted file                   |
//! | `[chunkhash:N]`    | digest of the chunk's modules                |
//! | `[hash:N]`         | digest of the emitted file (assets)          |
//!
//! `:N` truncates the hex digest to N characters.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::mode::Mode;
use packline_util::hash::truncate_digest;

/// Kind of emitted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Entry and runtime scripts.
    Script,
    /// Non-entry scripts (split and async chunks).
    Chunk,
    /// Stylesheets extracted from entry chunks.
    Stylesheet,
    /// Stylesheets extracted from non-entry chunks.
    StyleChunk,
    /// Emitted media (images).
    Asset,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        Self::Script,
        Self::Chunk,
        Self::Stylesheet,
        Self::StyleChunk,
        Self::Asset,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Chunk => "chunk",
            Self::Stylesheet => "stylesheet",
            Self::StyleChunk => "style-chunk",
            Self::Asset => "asset",
        }
    }

    /// Whether production patterns for this kind must carry a hash.
    #[must_use]
    pub fn requires_hash(&self) -> bool {
        !matches!(self, Self::Asset)
    }

    /// Built-in pattern for this kind in the given mode.
    #[must_use]
    pub fn default_pattern(&self, mode: Mode) -> &'static str {
        match (self, mode) {
            (Self::Script, Mode::Development) => "static/js/[name].js",
            (Self::Script, Mode::Production) => "static/js/[name].[contenthash:8].js",
            (Self::Chunk, Mode::Development) => "static/js/[name].chunk.js",
            (Self::Chunk, Mode::Production) => "static/js/[name].[chunkhash:8].chunk.js",
            (Self::Stylesheet, Mode::Development) => "static/css/[name].css",
            (Self::Stylesheet, Mode::Production) => "static/css/[name].[contenthash:9].css",
            (Self::StyleChunk, Mode::Development) => "static/css/[name].chunk.css",
            (Self::StyleChunk, Mode::Production) => "static/css/[name].[contenthash:9].chunk.css",
            (Self::Asset, Mode::Development) => "static/media/[name].[ext]",
            (Self::Asset, Mode::Production) => "static/media/[name].[hash:8].[ext]",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    /// Accepts the kind names and the rspack output keys they correspond to.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script" | "filename" => Ok(Self::Script),
            "chunk" | "chunkFilename" => Ok(Self::Chunk),
            "stylesheet" | "cssFilename" => Ok(Self::Stylesheet),
            "style-chunk" | "cssChunkFilename" => Ok(Self::StyleChunk),
            "asset" | "assetModuleFilename" => Ok(Self::Asset),
            other => Err(Error::UnknownArtifactKind {
                kind: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Name,
    Ext,
    ContentHash(Option<usize>),
    ChunkHash(Option<usize>),
}

impl Token {
    fn is_hash(&self) -> bool {
        matches!(self, Self::ContentHash(_) | Self::ChunkHash(_))
    }
}

/// A parsed filename pattern.
#[derive(Debug, Clone)]
struct Template {
    source: String,
    tokens: Vec<Token>,
}

impl Template {
    fn parse(pattern: &str) -> Result<Self, Error> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('[') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find(']') else {
                return Err(Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: "unclosed '['".to_string(),
                });
            };
            let inner = &after[..close];

            let (key, len) = match inner.split_once(':') {
                Some((key, n)) => {
                    let n: usize = n.parse().map_err(|_| Error::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: format!("hash length '{n}' is not a number"),
                    })?;
                    (key, Some(n))
                }
                None => (inner, None),
            };

            let token = match (key, len) {
                ("name", None) => Token::Name,
                ("ext", None) => Token::Ext,
                ("contenthash" | "hash", len) => Token::ContentHash(len),
                ("chunkhash", len) => Token::ChunkHash(len),
                _ => {
                    return Err(Error::UnknownPlaceholder {
                        pattern: pattern.to_string(),
                        placeholder: inner.to_string(),
                    })
                }
            };

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    fn has_hash(&self) -> bool {
        self.tokens.iter().any(Token::is_hash)
    }
}

/// Values substituted into a pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    /// Chunk or asset name.
    pub name: &'a str,
    /// Extension without the dot (assets only).
    pub ext: &'a str,
    /// Full hex digest of the emitted content.
    pub content_hash: &'a str,
    /// Full hex digest of the chunk's modules; falls back to `content_hash`.
    pub chunk_hash: Option<&'a str>,
}

/// Maps artifact kinds to filename patterns for one build mode.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    mode: Mode,
    templates: BTreeMap<ArtifactKind, Template>,
}

impl OutputNamer {
    /// Namer with the built-in patterns for `mode`.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        let templates = ArtifactKind::ALL
            .iter()
            .map(|kind| {
                let template = Template::parse(kind.default_pattern(mode))
                    .unwrap_or_else(|_| unreachable!("built-in patterns are valid"));
                (*kind, template)
            })
            .collect();
        Self { mode, templates }
    }

    /// Namer with built-in patterns replaced by `overrides` (kind name → pattern).
    ///
    /// Fails on an unknown kind or an unknown placeholder. Production requires
    /// a hash placeholder in script, chunk and stylesheet patterns, and
    /// development forbids hash placeholders in every pattern.
    pub fn with_overrides(mode: Mode, overrides: &BTreeMap<String, String>) -> Result<Self, Error> {
        let mut namer = Self::new(mode);
        for (key, pattern) in overrides {
            let kind: ArtifactKind = key.parse()?;
            let template = Template::parse(pattern)?;
            if mode.is_production() && kind.requires_hash() && !template.has_hash() {
                return Err(Error::MissingHash {
                    kind: kind.to_string(),
                    pattern: pattern.clone(),
                });
            }
            if !mode.is_production() && template.has_hash() {
                return Err(Error::UnexpectedHash {
                    kind: kind.to_string(),
                    pattern: pattern.clone(),
                });
            }
            namer.templates.insert(kind, template);
        }
        Ok(namer)
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The pattern string for `kind`.
    #[must_use]
    pub fn pattern(&self, kind: ArtifactKind) -> &str {
        &self.templates[&kind].source
    }

    /// Whether the pattern for `kind` contains a hash placeholder.
    #[must_use]
    pub fn is_hashed(&self, kind: ArtifactKind) -> bool {
        self.templates[&kind].has_hash()
    }

    /// Substitute placeholders in the pattern for `kind`.
    #[must_use]
    pub fn render(&self, kind: ArtifactKind, ctx: &RenderContext<'_>) -> String {
        let mut out = String::new();
        for token in &self.templates[&kind].tokens {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::Name => out.push_str(ctx.name),
                Token::Ext => out.push_str(ctx.ext),
                Token::ContentHash(len) => out.push_str(truncate_digest(ctx.content_hash, *len)),
                Token::ChunkHash(len) => {
                    let digest = ctx.chunk_hash.unwrap_or(ctx.content_hash);
                    out.push_str(truncate_digest(digest, *len));
                }
            }
        }
        out
    }

    /// All kinds with their patterns, in kind order.
    pub fn patterns(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        self.templates.iter().map(|(k, t)| (*k, t.source.as_str()))
    }
}

/// Serializes as `{ kind: pattern }`.
impl Serialize for OutputNamer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.templates.len()))?;
        for (kind, pattern) in self.patterns() {
            map.serialize_entry(kind.as_str(), pattern)?;
        }
        map.end()
    }
}
