//! Stylesheet processing.
//!
//! The `postcss` step of a rule runs through lightningcss: vendor prefixing,
//! nesting, CSS Modules for `*.module.*` files and optional minification.
//! The `sass` step runs through grass (see [`sass`]).

pub mod sass;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// CSS processing options.
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// Enable minification.
    pub minify: bool,
    /// Scope class names and return the mapping.
    pub css_modules: bool,
    /// Lower modern syntax and add vendor prefixes for the browser targets.
    pub autoprefixer: bool,
    /// Source file path, used in error messages.
    pub filename: Option<String>,
    pub targets: Option<Browsers>,
}

/// Result of CSS processing.
#[derive(Debug, Clone, Default)]
pub struct CssResult {
    pub code: String,
    /// Local class name to scoped class name. Empty unless CSS Modules is on.
    pub exports: BTreeMap<String, String>,
}

#[derive(Error, Debug)]
pub enum CssError {
    #[error("CSS parse error: {0}")]
    Parse(String),
    #[error("CSS transform error: {0}")]
    Transform(String),
    #[error("CSS print error: {0}")]
    Print(String),
}

/// Process CSS with lightningcss.
pub fn process_css(source: &str, options: &CssOptions) -> Result<CssResult, CssError> {
    let filename = options.filename.as_deref().unwrap_or("input.css");

    let mut parser_options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };

    if options.css_modules {
        parser_options.css_modules = Some(lightningcss::css_modules::Config {
            pattern: lightningcss::css_modules::Pattern::parse("[hash]_[local]")
                .map_err(|e| CssError::Parse(format!("CSS Modules pattern error: {e}")))?,
            dashed_idents: false,
            animation: Default::default(),
            grid: Default::default(),
            container: Default::default(),
            custom_idents: Default::default(),
            pure: false,
        });
    }

    let mut stylesheet = StyleSheet::parse(source, parser_options)
        .map_err(|e| CssError::Parse(format!("{filename}: {e}")))?;

    let targets = if options.autoprefixer {
        options.targets.unwrap_or_else(default_browser_targets)
    } else {
        Browsers::default()
    };

    // minify() is also the pass that applies target lowering
    if options.minify || options.autoprefixer {
        stylesheet
            .minify(MinifyOptions {
                targets: Targets::from(targets),
                ..Default::default()
            })
            .map_err(|e| CssError::Transform(format!("{filename}: {e}")))?;
    }

    let printer_options = PrinterOptions {
        minify: options.minify,
        targets: Targets::from(targets),
        ..Default::default()
    };

    let output = stylesheet
        .to_css(printer_options)
        .map_err(|e| CssError::Print(format!("{filename}: {e}")))?;

    let exports = if options.css_modules {
        output
            .exports
            .map(|exp| {
                exp.iter()
                    .map(|(k, v)| (k.to_string(), v.name.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        BTreeMap::new()
    };

    Ok(CssResult {
        code: output.code,
        exports,
    })
}

/// Whether a stylesheet path opts into CSS Modules (`*.module.css`, `*.module.scss`, ...).
#[must_use]
pub fn is_css_module(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(".module"))
}

/// Chrome 80+, Firefox 75+, Safari 13+, Edge 80+.
fn default_browser_targets() -> Browsers {
    Browsers {
        chrome: Some(80 << 16),
        firefox: Some(75 << 16),
        safari: Some(13 << 16),
        edge: Some(80 << 16),
        ..Default::default()
    }
}

/// Module body for a stylesheet that is injected at runtime.
///
/// The module appends a `<style>` tag when first required and exports the
/// class name mapping (empty for plain stylesheets).
#[must_use]
pub fn style_injection_module(css: &str, exports: &BTreeMap<String, String>) -> String {
    let css_literal = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "var style = document.createElement('style');\n\
         style.setAttribute('data-packline', '');\n\
         style.textContent = {css_literal};\n\
         document.head.appendChild(style);\n\
         {}",
        class_map_module(exports)
    )
}

/// Module body for an extracted stylesheet: only the class name mapping remains.
#[must_use]
pub fn class_map_module(exports: &BTreeMap<String, String>) -> String {
    let map = serde_json::to_string(exports).unwrap_or_else(|_| "{}".to_string());
    format!("module.exports = {{ __esModule: true, default: {map} }};\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_css_processing() {
        let result = process_css(".foo { color: red; }", &CssOptions::default()).unwrap();
        assert!(result.code.contains("color"));
        assert!(result.exports.is_empty());
    }

    #[test]
    fn test_minification() {
        let options = CssOptions {
            minify: true,
            ..Default::default()
        };
        let result = process_css(".foo {\n  color: red;\n  margin: 10px;\n}", &options).unwrap();
        assert!(!result.code.contains('\n'));
    }

    #[test]
    fn test_nesting_flattened_with_targets() {
        let options = CssOptions {
            autoprefixer: true,
            ..Default::default()
        };
        let result = process_css(".parent { .child { color: red; } }", &options).unwrap();
        assert!(result.code.contains(".parent .child"));
    }

    #[test]
    fn test_css_modules_exports() {
        let options = CssOptions {
            css_modules: true,
            ..Default::default()
        };
        let result = process_css(".button { color: blue; }", &options).unwrap();
        assert!(result.exports.contains_key("button"));
        assert_ne!(result.exports["button"], "button");
    }

    #[test]
    fn test_parse_error_names_file() {
        let options = CssOptions {
            filename: Some("src/broken.css".into()),
            ..Default::default()
        };
        let err = process_css(".a { color: red; } }}} @media {", &options);
        if let Err(e) = err {
            assert!(e.to_string().contains("src/broken.css"));
        }
    }

    #[test]
    fn test_is_css_module() {
        assert!(is_css_module(Path::new("src/Button.module.css")));
        assert!(is_css_module(Path::new("src/theme.module.scss")));
        assert!(!is_css_module(Path::new("src/index.css")));
    }

    #[test]
    fn test_style_injection_module() {
        let mut exports = BTreeMap::new();
        exports.insert("btn".to_string(), "x1_btn".to_string());
        let js = style_injection_module(".x1_btn{color:red}", &exports);
        assert!(js.contains("document.createElement('style')"));
        assert!(js.contains(r#""btn":"x1_btn""#));
        assert!(js.contains("module.exports"));
    }
}
