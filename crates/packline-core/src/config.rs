use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::mode::Mode;

/// Runtime configuration for the packline CLI.
///
/// This is the process-level configuration (where to run, how to log, which
/// mode). The project's build description lives in [`crate::project`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory (project root).
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Build mode, selected once at startup.
    pub mode: Mode,

    /// Explicit project config file (overrides discovery).
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            mode: Mode::default(),
            config_file: None,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set build mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set an explicit project config file.
    #[must_use]
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = Config::new(PathBuf::from("/proj"))
            .with_verbosity(2)
            .with_json_logs(true)
            .with_mode(Mode::Development)
            .with_config_file(Some(PathBuf::from("packline.config.json")));

        assert_eq!(config.cwd, PathBuf::from("/proj"));
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
        assert_eq!(config.mode, Mode::Development);
        assert!(config.config_file.is_some());
    }

    #[test]
    fn test_default_mode_is_production() {
        assert_eq!(Config::new(PathBuf::from(".")).mode, Mode::Production);
    }
}
