//! Project configuration file discovery and loading.
//!
//! Looks for `packline.config.json`, then `packline.config.js`, in the
//! project root. The JS form must export a static object literal:
//!
//! ```js
//! export default {
//!   entry: './src/index.tsx',
//!   output: { path: 'build', publicPath: '/' },
//!   devServer: { port: 26386 },
//!   css: { extract: true },
//! };
//! ```

mod object;
pub mod schema;

pub use schema::ProjectConfig;

use crate::error::Error;
use std::path::{Path, PathBuf};

/// Config file names in priority order.
pub const CONFIG_FILES: &[&str] = &["packline.config.json", "packline.config.js"];

/// Find a config file in the given root directory.
#[must_use]
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Load the project configuration.
///
/// With `explicit` set, that file must exist. Otherwise the root is searched
/// and `Ok(None)` means no config file was found.
pub fn load_project_config(
    root: &Path,
    explicit: Option<&Path>,
) -> Result<Option<(PathBuf, ProjectConfig)>, Error> {
    let path = match explicit {
        Some(p) => {
            let abs = if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            };
            if !abs.is_file() {
                return Err(Error::ConfigNotFound { path: abs });
            }
            abs
        }
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;

    let config = parse_config(&source, &path)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(Some((path, config)))
}

/// Parse config source; the format is chosen by the file extension.
pub fn parse_config(source: &str, path: &Path) -> Result<ProjectConfig, Error> {
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let value = if is_json {
        serde_json::from_str(source).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    } else {
        object::parse_exported_object(source).map_err(|message| Error::ConfigParse {
            path: path.to_path_buf(),
            message,
        })?
    };

    let config: ProjectConfig =
        serde_json::from_value(value).map_err(|source| Error::ConfigSchema { source })?;

    for key in config.extra.keys() {
        tracing::warn!(key = %key, path = %path.display(), "ignoring unknown config key");
    }

    Ok(config)
}
