//! Sass/SCSS preprocessing using grass.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sass compilation options.
#[derive(Debug, Clone, Default)]
pub struct SassOptions {
    /// Load paths for `@import`/`@use` resolution.
    pub include_paths: Vec<PathBuf>,
    /// Compressed output style.
    pub minify: bool,
    /// Source file path. Its directory is searched first.
    pub filename: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SassError {
    #[error("Sass compile error: {0}")]
    Compile(String),
}

/// Compile Sass/SCSS to CSS.
///
/// The indented `.sass` syntax is selected from the filename extension.
pub fn compile_sass(source: &str, options: &SassOptions) -> Result<String, SassError> {
    let mut grass_options = grass::Options::default().style(if options.minify {
        grass::OutputStyle::Compressed
    } else {
        grass::OutputStyle::Expanded
    });

    if let Some(parent) = options.filename.as_deref().and_then(Path::parent) {
        grass_options = grass_options.load_path(parent);
    }
    for path in &options.include_paths {
        grass_options = grass_options.load_path(path);
    }

    if options
        .filename
        .as_deref()
        .and_then(Path::extension)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sass"))
    {
        grass_options = grass_options.input_syntax(grass::InputSyntax::Sass);
    }

    grass::from_string(source.to_string(), &grass_options).map_err(|e| {
        let file = options
            .filename
            .as_deref()
            .map_or_else(|| "input.scss".to_string(), |p| p.display().to_string());
        SassError::Compile(format!("{file}: {e}"))
    })
}

#[must_use]
pub fn is_sass_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "scss" || e == "sass")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_scss() {
        let scss = r"
            $primary: blue;
            .button {
                color: $primary;
            }
        ";
        let result = compile_sass(scss, &SassOptions::default()).unwrap();
        assert!(result.contains("color: blue"));
    }

    #[test]
    fn test_scss_nesting() {
        let scss = ".parent { .child { color: red; } }";
        let result = compile_sass(scss, &SassOptions::default()).unwrap();
        assert!(result.contains(".parent .child"));
    }

    #[test]
    fn test_include_paths_resolve_imports() {
        let dir = tempfile::tempdir().unwrap();
        let scss_dir = dir.path().join("src/scss");
        std::fs::create_dir_all(&scss_dir).unwrap();
        std::fs::write(scss_dir.join("_vars.scss"), "$brand: #ff0000;\n").unwrap();

        let options = SassOptions {
            include_paths: vec![scss_dir],
            minify: false,
            filename: Some(dir.path().join("src/pages/home.scss")),
        };
        let result = compile_sass("@import 'vars';\n.home { color: $brand; }\n", &options).unwrap();
        assert!(result.contains(".home"));
        assert!(result.contains("red") || result.contains("#ff0000") || result.contains("#f00"));
    }

    #[test]
    fn test_compressed_output() {
        let options = SassOptions {
            minify: true,
            ..Default::default()
        };
        let result = compile_sass(".foo { color: red; }", &options).unwrap();
        assert!(!result.trim().contains('\n'));
    }

    #[test]
    fn test_indented_syntax() {
        let options = SassOptions {
            filename: Some(PathBuf::from("theme.sass")),
            ..Default::default()
        };
        let result = compile_sass(".box\n  width: 10px\n", &options).unwrap();
        assert!(result.contains("width: 10px"));
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let err = compile_sass(".a { color: $missing; }", &SassOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Sass compile error"));
    }

    #[test]
    fn test_is_sass_file() {
        assert!(is_sass_file(Path::new("styles.scss")));
        assert!(is_sass_file(Path::new("theme.sass")));
        assert!(!is_sass_file(Path::new("styles.css")));
    }
}
