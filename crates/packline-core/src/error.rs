use std::path::PathBuf;
use thiserror::Error;

/// Configuration and load-time errors.
///
/// Every variant is raised before any file is processed, so a build that
/// fails with one of these has emitted nothing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid config: {source}")]
    ConfigSchema {
        #[source]
        source: serde_json::Error,
    },

    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("No entry points configured")]
    NoEntries,

    #[error("Entry '{name}' points to {path}, which does not exist")]
    EntryNotFound { name: String, path: PathBuf },

    #[error("Unknown artifact kind '{kind}' (expected one of: script, chunk, stylesheet, style-chunk, asset)")]
    UnknownArtifactKind { kind: String },

    #[error("Filename pattern '{pattern}' for {kind} must contain a hash placeholder in production mode")]
    MissingHash { kind: String, pattern: String },

    #[error("Filename pattern '{pattern}' for {kind} must not contain a hash placeholder in development mode")]
    UnexpectedHash { kind: String, pattern: String },

    #[error("Unknown placeholder '[{placeholder}]' in filename pattern '{pattern}'")]
    UnknownPlaceholder { pattern: String, placeholder: String },

    #[error("Rule '{rule}' references unknown loader '{loader}'")]
    UnknownLoader { rule: String, loader: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Stable error code (SCREAMING_SNAKE_CASE) for machine-readable output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CONFIG_IO_ERROR",
            Self::ConfigRead { .. } => "CONFIG_READ_ERROR",
            Self::ConfigParse { .. } => "CONFIG_PARSE_ERROR",
            Self::ConfigSchema { .. } => "CONFIG_SCHEMA_ERROR",
            Self::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            Self::NoEntries => "CONFIG_NO_ENTRIES",
            Self::EntryNotFound { .. } => "CONFIG_ENTRY_NOT_FOUND",
            Self::UnknownArtifactKind { .. } => "CONFIG_UNKNOWN_ARTIFACT_KIND",
            Self::MissingHash { .. } => "CONFIG_MISSING_HASH",
            Self::UnexpectedHash { .. } => "CONFIG_UNEXPECTED_HASH",
            Self::UnknownPlaceholder { .. } => "CONFIG_UNKNOWN_PLACEHOLDER",
            Self::UnknownLoader { .. } => "CONFIG_UNKNOWN_LOADER",
            Self::InvalidPattern { .. } => "CONFIG_INVALID_PATTERN",
            Self::InvalidOption { .. } => "CONFIG_INVALID_OPTION",
            Self::Other(_) => "CONFIG_ERROR",
        }
    }
}

/// Compile a regular expression, mapping failures to [`Error::InvalidPattern`].
pub(crate) fn compile_pattern(pattern: &str) -> Result<regex_lite::Regex, Error> {
    regex_lite::Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_screaming_snake_case() {
        let errors = [
            Error::NoEntries,
            Error::other("x"),
            Error::UnknownArtifactKind {
                kind: "font".into(),
            },
            Error::UnknownLoader {
                rule: "r".into(),
                loader: "less-loader".into(),
            },
        ];
        for err in errors {
            assert!(err
                .code()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_compile_pattern_rejects_malformed() {
        let err = compile_pattern(r"\.(ts|tsx$").unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID_PATTERN");
        assert!(err.to_string().contains(r"\.(ts|tsx$"));
    }
}
