//! Transformation steps and loader option schemas.

use crate::compiler::{EsTarget, JsxRuntime, ParserSyntax, SourceMapKind, TranspileSpec};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One transformation in a rule's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "loader", rename_all = "kebab-case")]
pub enum Step {
    /// Script transform (`builtin:swc-loader`).
    #[serde(rename = "builtin:swc-loader")]
    Swc { options: Box<SwcLoaderOptions> },
    /// Stylesheet post-processing: target lowering and vendor prefixes.
    #[serde(rename = "postcss-loader")]
    Postcss,
    /// Sass/SCSS compilation.
    #[serde(rename = "sass-loader")]
    Sass { include_paths: Vec<PathBuf> },
    /// Stylesheet module handling (CSS Modules for `*.module.*`).
    #[serde(rename = "css-loader")]
    Css,
    /// Force the stylesheet into an extracted file.
    #[serde(rename = "css-extract-loader")]
    CssExtract,
}

impl Step {
    #[must_use]
    pub fn loader_name(&self) -> &'static str {
        match self {
            Self::Swc { .. } => "builtin:swc-loader",
            Self::Postcss => "postcss-loader",
            Self::Sass { .. } => "sass-loader",
            Self::Css => "css-loader",
            Self::CssExtract => "css-extract-loader",
        }
    }

    /// Build a step from a loader reference.
    pub fn from_loader(
        rule: &str,
        loader: &str,
        options: &serde_json::Value,
        root: &Path,
    ) -> Result<Self, Error> {
        let invalid = |e: serde_json::Error| Error::InvalidOption {
            key: format!("{rule}.{loader}.options"),
            message: e.to_string(),
        };

        match loader {
            "builtin:swc-loader" | "swc-loader" => {
                let options: SwcLoaderOptions = if options.is_null() {
                    SwcLoaderOptions::default()
                } else {
                    serde_json::from_value(options.clone()).map_err(invalid)?
                };
                Ok(Self::Swc {
                    options: Box::new(options),
                })
            }
            "postcss-loader" => Ok(Self::Postcss),
            "sass-loader" => {
                let options: SassLoaderOptions = if options.is_null() {
                    SassLoaderOptions::default()
                } else {
                    serde_json::from_value(options.clone()).map_err(invalid)?
                };
                let include_paths = options
                    .include_paths
                    .iter()
                    .chain(options.sass_options.include_paths.iter())
                    .map(|p| root.join(p))
                    .collect();
                Ok(Self::Sass { include_paths })
            }
            "css-loader" => Ok(Self::Css),
            "css-extract-loader" | "builtin:css-extract-loader" => Ok(Self::CssExtract),
            other => Err(Error::UnknownLoader {
                rule: rule.to_string(),
                loader: other.to_string(),
            }),
        }
    }
}

/// `sass-loader` options. Include paths may sit at the top level or under
/// `sassOptions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SassLoaderOptions {
    include_paths: Vec<String>,
    sass_options: SassImplOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SassImplOptions {
    include_paths: Vec<String>,
}

/// `builtin:swc-loader` options, in the loader's JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwcLoaderOptions {
    #[serde(alias = "sourceMap")]
    pub source_maps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EsTarget>,
    pub minify: bool,
    pub jsc: JscOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JscOptions {
    pub parser: JscParserOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EsTarget>,
    pub loose: bool,
    pub external_helpers: bool,
    pub preserve_all_comments: bool,
    pub transform: JscTransformOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JscParserOptions {
    pub syntax: ParserSyntax,
    pub jsx: bool,
    pub tsx: bool,
    pub decorators: bool,
    pub export_default_from: bool,
    pub export_namespace_from: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JscTransformOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub react: Option<ReactTransformOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactTransformOptions {
    pub runtime: JsxRuntime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pragma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pragma_frag: Option<String>,
    pub throw_if_namespace: bool,
    pub use_builtins: bool,
}

impl SwcLoaderOptions {
    /// Effective ECMAScript target (`target` wins over `jsc.target`).
    #[must_use]
    pub fn effective_target(&self) -> EsTarget {
        self.target.or(self.jsc.target).unwrap_or_default()
    }

    /// Resolve these options against one file.
    #[must_use]
    pub fn to_transpile_spec(&self, path: &Path, minify: bool) -> TranspileSpec {
        let parser = &self.jsc.parser;
        let mut spec = TranspileSpec::new(path)
            .with_syntax(parser.syntax)
            .with_jsx(parser.jsx || parser.tsx)
            .with_target(self.effective_target())
            .with_minify(minify || self.minify)
            .with_sourcemaps(if self.source_maps {
                SourceMapKind::External
            } else {
                SourceMapKind::None
            });
        spec.decorators = parser.decorators;

        if let Some(react) = &self.jsc.transform.react {
            spec = spec.with_jsx_runtime(react.runtime);
            if let Some(source) = &react.import_source {
                spec.jsx_import_source.clone_from(source);
            }
            if let Some(pragma) = &react.pragma {
                spec.jsx_pragma.clone_from(pragma);
            }
            if let Some(frag) = &react.pragma_frag {
                spec.jsx_pragma_frag.clone_from(frag);
            }
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_swc_options_from_loader_json() {
        let options = json!({
            "sourceMap": true,
            "target": "es5",
            "jsc": {
                "loose": true,
                "parser": { "syntax": "ecmascript", "jsx": true, "decorators": true },
                "externalHelpers": true,
                "transform": {
                    "react": {
                        "runtime": "automatic",
                        "pragma": "React.createElement",
                        "pragmaFrag": "React.Fragment",
                        "throwIfNamespace": true
                    }
                }
            }
        });
        let step = Step::from_loader("javascript", "builtin:swc-loader", &options, Path::new("/")).unwrap();
        let Step::Swc { options } = step else {
            panic!("expected swc step");
        };
        assert!(options.source_maps);
        assert!(options.jsc.loose);
        assert_eq!(options.effective_target(), EsTarget::ES5);

        let spec = options.to_transpile_spec(Path::new("src/App.js"), false);
        assert_eq!(spec.syntax, ParserSyntax::Ecmascript);
        assert!(spec.jsx);
        assert!(spec.decorators);
        assert_eq!(spec.target, EsTarget::ES5);
        assert_eq!(spec.sourcemaps, SourceMapKind::External);
        assert_eq!(spec.jsx_runtime, JsxRuntime::Automatic);
        assert_eq!(spec.jsx_pragma, "React.createElement");
    }

    #[test]
    fn test_swc_options_default_when_absent() {
        let step = Step::from_loader("r", "swc-loader", &serde_json::Value::Null, Path::new("/")).unwrap();
        assert_eq!(step.loader_name(), "builtin:swc-loader");
    }

    #[test]
    fn test_build_minify_overrides_loader() {
        let options = SwcLoaderOptions::default();
        assert!(options.to_transpile_spec(Path::new("a.js"), true).minify);
        assert!(!options.to_transpile_spec(Path::new("a.js"), false).minify);
    }

    #[test]
    fn test_sass_include_paths_anchored_at_root() {
        let options = json!({ "includePaths": ["src/scss", "node_modules"] });
        let step = Step::from_loader("sass", "sass-loader", &options, Path::new("/app")).unwrap();
        assert_eq!(
            step,
            Step::Sass {
                include_paths: vec![
                    PathBuf::from("/app/src/scss"),
                    PathBuf::from("/app/node_modules")
                ]
            }
        );
    }

    #[test]
    fn test_invalid_loader_options() {
        let options = json!({ "jsc": { "parser": { "syntax": "coffeescript" } } });
        let err = Step::from_loader("ts", "builtin:swc-loader", &options, Path::new("/")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID_OPTION");
    }

    #[test]
    fn test_unknown_loader() {
        let err = Step::from_loader("styles", "stylus-loader", &serde_json::Value::Null, Path::new("/"))
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_UNKNOWN_LOADER");
    }
}
