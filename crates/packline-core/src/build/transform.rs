//! Per-module transformation: runs a rule's steps on one file.

use super::codes;
use super::BuildError;
use crate::compiler::{CompilerBackend, SourceMapKind};
use crate::css::sass::{compile_sass, SassOptions};
use crate::css::{is_css_module, process_css, CssOptions};
use crate::resolver::ResolvedConfig;
use crate::rules::{ModuleType, RouteMatch, Step, UnmatchedPolicy};
use std::collections::BTreeMap;
use std::path::Path;

/// The transformed form of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutput {
    Script {
        code: String,
        map: Option<String>,
        /// Minify when emitted, even if `optimization.minimize` is off.
        minify: bool,
    },
    Style {
        css: String,
        /// Local class name to scoped class name (CSS Modules).
        exports: BTreeMap<String, String>,
        /// Emit into a stylesheet instead of injecting a `<style>` tag.
        extract: bool,
    },
    Asset {
        bytes: Vec<u8>,
        name: String,
        ext: String,
    },
}

/// Transform the file at `path` per its route.
pub fn transform(
    config: &ResolvedConfig,
    backend: &dyn CompilerBackend,
    path: &Path,
    id: &str,
    route: Option<RouteMatch<'_>>,
) -> Result<ModuleOutput, BuildError> {
    let Some(route) = route else {
        return match config.router.unmatched() {
            UnmatchedPolicy::Reject => Err(BuildError::new(
                codes::BUILD_UNMATCHED_FILE,
                format!("No rule matches {id}"),
            )
            .with_path(path)),
            UnmatchedPolicy::Passthrough => passthrough(config, path),
        };
    };

    match route.module_type {
        ModuleType::AssetResource => asset(path),
        ModuleType::CssAuto => style(config, path, route),
        ModuleType::JavascriptAuto => script(config, backend, path, route),
    }
}

fn read_source(path: &Path) -> Result<String, BuildError> {
    packline_util::fs::read_to_string_lossy(path).map_err(|e| {
        BuildError::new(codes::BUILD_READ_FAILED, format!("Failed to read file: {e}")).with_path(path)
    })
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Unmatched files: scripts and JSON are included as-is, anything else is
/// emitted as a file.
fn passthrough(config: &ResolvedConfig, path: &Path) -> Result<ModuleOutput, BuildError> {
    match extension(path).as_str() {
        "json" => {
            let source = read_source(path)?;
            Ok(ModuleOutput::Script {
                code: format!("module.exports = {};\n", source.trim()),
                map: None,
                minify: false,
            })
        }
        "js" | "mjs" | "cjs" => Ok(ModuleOutput::Script {
            code: define_mode(&read_source(path)?, config),
            map: None,
            minify: false,
        }),
        _ => asset(path),
    }
}

fn asset(path: &Path) -> Result<ModuleOutput, BuildError> {
    let bytes = std::fs::read(path).map_err(|e| {
        BuildError::new(codes::BUILD_READ_FAILED, format!("Failed to read file: {e}")).with_path(path)
    })?;
    Ok(ModuleOutput::Asset {
        bytes,
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ext: extension(path),
    })
}

fn script(
    config: &ResolvedConfig,
    backend: &dyn CompilerBackend,
    path: &Path,
    route: RouteMatch<'_>,
) -> Result<ModuleOutput, BuildError> {
    let mut code = read_source(path)?;
    let mut map = None;
    let mut minify = false;

    // Loaders run last to first
    for step in route.steps.iter().rev() {
        match step {
            Step::Swc { options } => {
                minify |= options.minify;
                // Minification happens after linking, per chunk
                let mut spec = options.to_transpile_spec(path, false).with_minify(false);
                if !config.source_maps {
                    spec = spec.with_sourcemaps(SourceMapKind::None);
                }
                let output = backend.transpile(&spec, &code).map_err(|e| {
                    BuildError::new(codes::BUILD_TRANSFORM_FAILED, e.to_string()).with_path(path)
                })?;
                code = output.code;
                map = output.source_map;
            }
            other => {
                return Err(BuildError::new(
                    codes::BUILD_TRANSFORM_FAILED,
                    format!(
                        "Loader '{}' in rule '{}' cannot process scripts",
                        other.loader_name(),
                        route.rule
                    ),
                )
                .with_path(path))
            }
        }
    }

    Ok(ModuleOutput::Script {
        code: define_mode(&code, config),
        map,
        minify,
    })
}

fn style(
    config: &ResolvedConfig,
    path: &Path,
    route: RouteMatch<'_>,
) -> Result<ModuleOutput, BuildError> {
    let mut css = read_source(path)?;
    let mut autoprefixer = false;
    let mut extract = config.css_extract;

    for step in route.steps.iter().rev() {
        match step {
            Step::Sass { include_paths } => {
                let options = SassOptions {
                    include_paths: include_paths.clone(),
                    minify: false,
                    filename: Some(path.to_path_buf()),
                };
                css = compile_sass(&css, &options).map_err(|e| {
                    BuildError::new(codes::BUILD_SASS_FAILED, e.to_string()).with_path(path)
                })?;
            }
            Step::Postcss => autoprefixer = true,
            Step::Css => {}
            Step::CssExtract => extract = true,
            Step::Swc { .. } => {
                return Err(BuildError::new(
                    codes::BUILD_TRANSFORM_FAILED,
                    format!("Loader 'builtin:swc-loader' in rule '{}' cannot process stylesheets", route.rule),
                )
                .with_path(path))
            }
        }
    }

    let options = CssOptions {
        minify: config.partitioner.minimize(),
        css_modules: is_css_module(path),
        autoprefixer,
        filename: Some(path.display().to_string()),
        targets: None,
    };
    let result = process_css(&css, &options)
        .map_err(|e| BuildError::new(codes::BUILD_CSS_FAILED, e.to_string()).with_path(path))?;

    Ok(ModuleOutput::Style {
        css: result.code,
        exports: result.exports,
        extract,
    })
}

/// Replace `process.env.NODE_ENV` with the build mode literal.
///
/// Only whole expressions are replaced: `process.env.NODE_ENV_X` and
/// `obj.process.env.NODE_ENV` are left alone.
fn define_mode(code: &str, config: &ResolvedConfig) -> String {
    const NEEDLE: &str = "process.env.NODE_ENV";
    if !code.contains(NEEDLE) {
        return code.to_string();
    }
    let literal = format!("\"{}\"", config.mode.as_str());
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$';

    let mut out = String::with_capacity(code.len());
    let mut last = 0;
    for (start, _) in code.match_indices(NEEDLE) {
        let end = start + NEEDLE.len();
        let before = code[..start].chars().next_back();
        let after = code[end..].chars().next();
        if before.is_some_and(|c| is_ident(c) || c == '.') || after.is_some_and(is_ident) {
            continue;
        }
        out.push_str(&code[last..start]);
        out.push_str(&literal);
        last = end;
    }
    out.push_str(&code[last..]);
    out
}
