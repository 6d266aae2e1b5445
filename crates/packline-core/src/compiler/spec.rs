//! Transpilation specification types.
//!
//! A `TranspileSpec` is the fully-resolved option set for one file: the
//! rule's SWC loader options combined with the file path and build flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source syntax the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParserSyntax {
    /// TypeScript (type annotations are stripped).
    Typescript,
    /// Plain ECMAScript.
    #[default]
    Ecmascript,
}

impl ParserSyntax {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Ecmascript => "ecmascript",
        }
    }
}

/// JSX runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    /// Classic JSX transform (React.createElement).
    Classic,
    /// Automatic JSX transform (React 17+ / jsx-runtime).
    #[default]
    Automatic,
}

impl JsxRuntime {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Automatic => "automatic",
        }
    }
}

impl std::fmt::Display for JsxRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source map generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapKind {
    /// No source map.
    #[default]
    None,
    /// External .map file.
    External,
}

/// ECMAScript target version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EsTarget {
    /// ECMAScript 5 (legacy browsers).
    #[serde(rename = "es5")]
    ES5,
    /// ECMAScript 2015 (ES6).
    #[serde(rename = "es2015", alias = "es6")]
    ES2015,
    #[serde(rename = "es2016")]
    ES2016,
    #[serde(rename = "es2017")]
    ES2017,
    #[serde(rename = "es2018")]
    ES2018,
    #[serde(rename = "es2019")]
    ES2019,
    #[serde(rename = "es2020")]
    ES2020,
    #[serde(rename = "es2021")]
    ES2021,
    #[default]
    #[serde(rename = "es2022")]
    ES2022,
    /// Latest ECMAScript features.
    #[serde(rename = "esnext")]
    ESNext,
}

impl EsTarget {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES5 => "es5",
            Self::ES2015 => "es2015",
            Self::ES2016 => "es2016",
            Self::ES2017 => "es2017",
            Self::ES2018 => "es2018",
            Self::ES2019 => "es2019",
            Self::ES2020 => "es2020",
            Self::ES2021 => "es2021",
            Self::ES2022 => "es2022",
            Self::ESNext => "esnext",
        }
    }
}

impl std::fmt::Display for EsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Info,
    Warning,
    Error,
}

impl DiagnosticSeverity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A compiler diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Human-readable message.
    pub message: String,
    /// Source file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            file: None,
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            file: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }
}

/// Transpilation specification for one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranspileSpec {
    /// Input path (used for syntax detection and error messages).
    pub input_path: PathBuf,
    /// Parser syntax.
    #[serde(default)]
    pub syntax: ParserSyntax,
    /// Accept and transform JSX.
    #[serde(default)]
    pub jsx: bool,
    /// Accept decorators.
    #[serde(default)]
    pub decorators: bool,
    /// JSX runtime mode.
    #[serde(default)]
    pub jsx_runtime: JsxRuntime,
    /// Package the automatic runtime imports from.
    pub jsx_import_source: String,
    /// Element factory for the classic runtime.
    pub jsx_pragma: String,
    /// Fragment factory for the classic runtime.
    pub jsx_pragma_frag: String,
    /// Source map generation mode.
    #[serde(default)]
    pub sourcemaps: SourceMapKind,
    /// ECMAScript target version.
    #[serde(default)]
    pub target: EsTarget,
    /// Whether to minify the output.
    #[serde(default)]
    pub minify: bool,
}

impl TranspileSpec {
    /// Create a spec for `input_path` with syntax inferred from its extension.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        let ext = input_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let syntax = if matches!(ext.as_str(), "ts" | "tsx" | "mts" | "cts") {
            ParserSyntax::Typescript
        } else {
            ParserSyntax::Ecmascript
        };
        Self {
            jsx: matches!(ext.as_str(), "jsx" | "tsx"),
            syntax,
            input_path,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_syntax(mut self, syntax: ParserSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    #[must_use]
    pub fn with_jsx(mut self, jsx: bool) -> Self {
        self.jsx = jsx;
        self
    }

    #[must_use]
    pub fn with_jsx_runtime(mut self, runtime: JsxRuntime) -> Self {
        self.jsx_runtime = runtime;
        self
    }

    #[must_use]
    pub fn with_sourcemaps(mut self, sourcemaps: SourceMapKind) -> Self {
        self.sourcemaps = sourcemaps;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: EsTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Whether the file should be parsed as TSX.
    ///
    /// TypeScript only enables JSX for `.tsx` files; `<T>expr` casts in
    /// `.ts` files would otherwise parse as elements.
    #[must_use]
    pub fn is_tsx(&self) -> bool {
        self.syntax == ParserSyntax::Typescript
            && self.jsx
            && self
                .input_path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("tsx"))
    }
}

impl Default for TranspileSpec {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            syntax: ParserSyntax::default(),
            jsx: false,
            decorators: false,
            jsx_runtime: JsxRuntime::default(),
            jsx_import_source: "react".to_string(),
            jsx_pragma: "React.createElement".to_string(),
            jsx_pragma_frag: "React.Fragment".to_string(),
            sourcemaps: SourceMapKind::default(),
            target: EsTarget::default(),
            minify: false,
        }
    }
}

/// Output from a successful transpilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranspileOutput {
    /// Transpiled JavaScript code.
    pub code: String,
    /// Source map (if generated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
    /// Compiler diagnostics (warnings, info).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl TranspileOutput {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source_map: None,
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_source_map(mut self, source_map: impl Into<String>) -> Self {
        self.source_map = Some(source_map.into());
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_inferred_from_extension() {
        let ts = TranspileSpec::new("src/App.tsx");
        assert_eq!(ts.syntax, ParserSyntax::Typescript);
        assert!(ts.jsx);
        assert!(ts.is_tsx());

        let plain_ts = TranspileSpec::new("src/util.ts").with_jsx(true);
        assert!(!plain_ts.is_tsx());

        let js = TranspileSpec::new("src/legacy.js");
        assert_eq!(js.syntax, ParserSyntax::Ecmascript);
        assert!(!js.jsx);
    }

    #[test]
    fn test_es_target_serialization() {
        assert_eq!(serde_json::to_string(&EsTarget::ES5).unwrap(), "\"es5\"");
        let t: EsTarget = serde_json::from_str("\"es6\"").unwrap();
        assert_eq!(t, EsTarget::ES2015);
    }

    #[test]
    fn test_transpile_spec_defaults() {
        let spec = TranspileSpec::default();
        assert_eq!(spec.jsx_runtime, JsxRuntime::Automatic);
        assert_eq!(spec.jsx_pragma, "React.createElement");
        assert_eq!(spec.jsx_pragma_frag, "React.Fragment");
        assert_eq!(spec.sourcemaps, SourceMapKind::None);
        assert!(!spec.minify);
    }

    #[test]
    fn test_transpile_spec_builder() {
        let spec = TranspileSpec::new("src/legacy.js")
            .with_jsx(true)
            .with_jsx_runtime(JsxRuntime::Classic)
            .with_sourcemaps(SourceMapKind::External)
            .with_target(EsTarget::ES5)
            .with_minify(true);

        assert!(spec.jsx);
        assert_eq!(spec.jsx_runtime, JsxRuntime::Classic);
        assert_eq!(spec.sourcemaps, SourceMapKind::External);
        assert_eq!(spec.target, EsTarget::ES5);
        assert!(spec.minify);
    }

    #[test]
    fn test_transpile_output_builder() {
        let output = TranspileOutput::new("const x = 1;")
            .with_source_map("{\"version\":3}")
            .with_diagnostics(vec![Diagnostic::warning("Unused variable")]);

        assert_eq!(output.code, "const x = 1;");
        assert_eq!(output.source_map, Some("{\"version\":3}".to_string()));
        assert_eq!(output.diagnostics.len(), 1);
    }
}
