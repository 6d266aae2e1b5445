//! Serialized shape of `packline.config.{json,js}`.
//!
//! Every field is optional; [`crate::resolver::ResolvedConfig`] fills in the
//! built-in defaults. Key names follow rspack where the two overlap.

use crate::chunks::ChunkSelector;
use crate::rules::{ResolveOverride, UnmatchedPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub entry: Option<EntryConfig>,
    pub output: OutputConfig,
    pub dev_server: DevServerConfig,
    pub resolve: ResolveConfig,
    pub html: HtmlConfig,
    pub css: CssConfig,
    pub module: ModuleConfig,
    pub optimization: OptimizationConfig,
    /// `"source-map"` emits `.map` files next to scripts; `false` disables.
    pub devtool: Option<DevtoolConfig>,
    /// Keys this version does not understand.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `entry`: a single path (bundle name `main`) or a name → path map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryConfig {
    Single(String),
    Named(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub clean: Option<bool>,
    pub public_path: Option<String>,
    pub filename: Option<String>,
    pub chunk_filename: Option<String>,
    pub css_filename: Option<String>,
    pub css_chunk_filename: Option<String>,
    pub asset_module_filename: Option<String>,
    /// Patterns keyed by artifact kind (`script`, `chunk`, `stylesheet`, ...).
    pub filenames: BTreeMap<String, String>,
}

impl OutputConfig {
    /// All filename overrides, keyed as written.
    #[must_use]
    pub fn filename_overrides(&self) -> BTreeMap<String, String> {
        let mut overrides = self.filenames.clone();
        let rspack_keys = [
            ("filename", &self.filename),
            ("chunkFilename", &self.chunk_filename),
            ("cssFilename", &self.css_filename),
            ("cssChunkFilename", &self.css_chunk_filename),
            ("assetModuleFilename", &self.asset_module_filename),
        ];
        for (key, value) in rspack_keys {
            if let Some(pattern) = value {
                overrides.insert(key.to_string(), pattern.clone());
            }
        }
        overrides
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub history_api_fallback: Option<HistoryFallbackConfig>,
}

/// `historyApiFallback`: `true`/`false` or `{ index }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryFallbackConfig {
    Enabled(bool),
    Index { index: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolveConfig {
    pub extensions: Option<Vec<String>>,
    pub modules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HtmlConfig {
    pub template: Option<String>,
    /// `head` or `body`.
    pub inject: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CssConfig {
    pub extract: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleConfig {
    /// Replaces the built-in rules entirely when present.
    pub rules: Option<Vec<RuleConfig>>,
    pub unmatched: Option<UnmatchedPolicy>,
}

/// One entry of `module.rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub test: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<ExcludeConfig>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<UseConfig>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveOverride>,
}

/// `exclude`: a pattern, or a pattern with an allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExcludeConfig {
    Pattern(String),
    Guarded {
        pattern: String,
        #[serde(default)]
        unless: Option<String>,
    },
}

/// `use`: one loader or a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UseConfig {
    One(LoaderConfig),
    Many(Vec<LoaderConfig>),
}

/// A loader by name, or with options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoaderConfig {
    Name(String),
    Full {
        loader: String,
        #[serde(default)]
        options: Value,
    },
}

impl LoaderConfig {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Full { loader: name, .. } => name,
        }
    }

    #[must_use]
    pub fn options(&self) -> &Value {
        const NONE: &Value = &Value::Null;
        match self {
            Self::Name(_) => NONE,
            Self::Full { options, .. } => options,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizationConfig {
    pub minimize: Option<bool>,
    pub runtime_chunk: Option<bool>,
    pub split_chunks: Option<SplitChunksConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitChunksConfig {
    pub chunks: Option<ChunkSelector>,
    /// Merged over the built-in groups by key; `false` removes a group.
    /// Declaration order is kept and breaks priority ties.
    pub cache_groups: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheGroupConfig {
    pub test: Option<String>,
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub reuse_existing_chunk: Option<bool>,
    pub chunks: Option<ChunkSelector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DevtoolConfig {
    Enabled(bool),
    Named(String),
}
