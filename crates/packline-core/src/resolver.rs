//! Build Configuration Resolver.
//!
//! Turns a [`ProjectConfig`] (or the built-in defaults) into the immutable
//! components a build runs on. Every configuration error surfaces here,
//! before any file is read or written.

use crate::chunks::ChunkPartitioner;
use crate::config::Config;
use crate::devserver::DevServerDescriptor;
use crate::error::Error;
use crate::mode::Mode;
use crate::naming::OutputNamer;
use crate::project::schema::{DevtoolConfig, EntryConfig};
use crate::project::{load_project_config, ProjectConfig};
use crate::rules::{RuleRouter, UnmatchedPolicy};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_ENTRY: &str = "./src/index.tsx";
pub const DEFAULT_ENTRY_NAME: &str = "main";
pub const DEFAULT_OUTPUT_DIR: &str = "build";
pub const DEFAULT_PUBLIC_PATH: &str = "/";
pub const DEFAULT_TEMPLATE: &str = "./index.html";
pub const DEFAULT_EXTENSIONS: &[&str] = &["...", ".js", ".ts", ".tsx", ".jsx"];
/// What `"..."` in `resolve.extensions` expands to.
pub const BUILTIN_EXTENSIONS: &[&str] = &[".js", ".json", ".wasm"];

/// A named entry module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
}

/// Where generated tags go in the HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlInject {
    #[default]
    Head,
    Body,
}

#[derive(Debug, Clone, Serialize)]
pub struct HtmlOptions {
    /// Template file. `None` generates a minimal document.
    pub template: Option<PathBuf>,
    pub inject: HtmlInject,
    pub title: String,
}

/// The resolved, immutable build configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub root: PathBuf,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    pub entries: Vec<Entry>,
    pub output_dir: PathBuf,
    pub clean: bool,
    pub public_path: String,
    #[serde(rename = "output")]
    pub namer: OutputNamer,
    #[serde(rename = "rules")]
    pub router: RuleRouter,
    #[serde(rename = "optimization")]
    pub partitioner: ChunkPartitioner,
    pub dev_server: DevServerDescriptor,
    pub extensions: Vec<String>,
    pub modules: Vec<String>,
    pub html: HtmlOptions,
    pub css_extract: bool,
    pub source_maps: bool,
}

impl ResolvedConfig {
    /// Resolve runtime options: locate and load the project config, then resolve it.
    pub fn load(config: &Config) -> Result<Self, Error> {
        let root = dunce::canonicalize(&config.cwd).unwrap_or_else(|_| config.cwd.clone());
        match load_project_config(&root, config.config_file.as_deref())? {
            Some((path, project)) => {
                let mut resolved = Self::resolve(&project, &root, config.mode)?;
                resolved.config_path = Some(path);
                Ok(resolved)
            }
            None => {
                tracing::debug!(root = %root.display(), "no config file, using defaults");
                Self::resolve(&ProjectConfig::default(), &root, config.mode)
            }
        }
    }

    /// Resolve a project config against `root` in `mode`.
    pub fn resolve(project: &ProjectConfig, root: &Path, mode: Mode) -> Result<Self, Error> {
        let entries = resolve_entries(project.entry.as_ref(), root)?;

        let namer = OutputNamer::with_overrides(mode, &project.output.filename_overrides())?;

        let css_extract = project.css.extract.unwrap_or(false);
        let unmatched = project.module.unmatched.unwrap_or(UnmatchedPolicy::Passthrough);
        let router = match &project.module.rules {
            Some(rules) => RuleRouter::from_configs(rules, unmatched, root)?,
            None => {
                let defaults = RuleRouter::defaults(root, css_extract)?;
                RuleRouter::new(defaults.rules().to_vec(), unmatched)
            }
        };

        let partitioner = ChunkPartitioner::from_config(&project.optimization)?;
        let dev_server = DevServerDescriptor::from_config(&project.dev_server);

        let extensions = expand_extensions(
            project
                .resolve
                .extensions
                .as_deref()
                .map(|exts| exts.iter().map(String::as_str).collect::<Vec<_>>())
                .as_deref()
                .unwrap_or(DEFAULT_EXTENSIONS),
        );
        let modules = project
            .resolve
            .modules
            .clone()
            .unwrap_or_else(|| vec!["node_modules".to_string()]);

        let html = resolve_html(project, root)?;

        let source_maps = match &project.devtool {
            None | Some(DevtoolConfig::Enabled(false)) => false,
            Some(DevtoolConfig::Enabled(true)) => true,
            Some(DevtoolConfig::Named(name)) if name == "source-map" => true,
            Some(DevtoolConfig::Named(other)) => {
                return Err(Error::InvalidOption {
                    key: "devtool".to_string(),
                    message: format!("unsupported devtool '{other}' (expected \"source-map\" or false)"),
                })
            }
        };

        let output_dir = root.join(
            project
                .output
                .path
                .as_deref()
                .unwrap_or(DEFAULT_OUTPUT_DIR),
        );

        let public_path = project
            .output
            .public_path
            .clone()
            .unwrap_or_else(|| DEFAULT_PUBLIC_PATH.to_string());

        tracing::debug!(
            mode = %mode,
            entries = entries.len(),
            rules = router.rules().len(),
            "resolved config"
        );

        Ok(Self {
            root: root.to_path_buf(),
            mode,
            config_path: None,
            entries,
            output_dir: normalize_path(&output_dir),
            clean: project.output.clean.unwrap_or(true),
            public_path,
            namer,
            router,
            partitioner,
            dev_server,
            extensions,
            modules,
            html,
            css_extract,
            source_maps,
        })
    }

    /// Path relative to the project root with `/` separators, for ids and messages.
    #[must_use]
    pub fn relative_id(&self, path: &Path) -> String {
        module_id(&self.root, path)
    }
}

/// `./`-prefixed id of `path` relative to `root`, with `/` separators.
#[must_use]
pub fn module_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("./{joined}")
}

fn resolve_entries(entry: Option<&EntryConfig>, root: &Path) -> Result<Vec<Entry>, Error> {
    let declared: Vec<(String, String)> = match entry {
        None => vec![(DEFAULT_ENTRY_NAME.to_string(), DEFAULT_ENTRY.to_string())],
        Some(EntryConfig::Single(path)) => vec![(DEFAULT_ENTRY_NAME.to_string(), path.clone())],
        Some(EntryConfig::Named(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    };

    if declared.is_empty() {
        return Err(Error::NoEntries);
    }

    declared
        .into_iter()
        .map(|(name, path)| {
            let abs = normalize_path(&root.join(&path));
            if abs.is_file() {
                Ok(Entry { name, path: abs })
            } else {
                Err(Error::EntryNotFound { name, path: abs })
            }
        })
        .collect()
}

fn resolve_html(project: &ProjectConfig, root: &Path) -> Result<HtmlOptions, Error> {
    let inject = match project.html.inject.as_deref() {
        None | Some("head") => HtmlInject::Head,
        Some("body") => HtmlInject::Body,
        Some(other) => {
            return Err(Error::InvalidOption {
                key: "html.inject".to_string(),
                message: format!("expected \"head\" or \"body\", got \"{other}\""),
            })
        }
    };

    // An explicit template must exist; the default one is optional
    let template = match &project.html.template {
        Some(t) => {
            let path = normalize_path(&root.join(t));
            if !path.is_file() {
                return Err(Error::InvalidOption {
                    key: "html.template".to_string(),
                    message: format!("{} does not exist", path.display()),
                });
            }
            Some(path)
        }
        None => Some(normalize_path(&root.join(DEFAULT_TEMPLATE))).filter(|p| p.is_file()),
    };

    Ok(HtmlOptions {
        template,
        inject,
        title: project
            .html
            .title
            .clone()
            .unwrap_or_else(|| "packline app".to_string()),
    })
}

/// Expand `"..."` and drop duplicates, keeping first occurrences.
fn expand_extensions(declared: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in declared {
        let expanded: &[&str] = if *ext == "..." {
            BUILTIN_EXTENSIONS
        } else {
            std::slice::from_ref(ext)
        };
        for e in expanded {
            if !out.iter().any(|o| o == e) {
                out.push((*e).to_string());
            }
        }
    }
    out
}

/// Lexically remove `.` and `..` components.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
