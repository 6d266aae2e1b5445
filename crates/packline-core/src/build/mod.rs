//! Build execution.
//!
//! A build runs four phases over a [`ResolvedConfig`]:
//!
//! 1. **resolve**: start from the entries and resolve import specifiers.
//! 2. **transform**: route each module and run its rule's steps (rayon).
//! 3. **partition**: group modules into chunks.
//! 4. **emit**: write chunks, stylesheets, assets, `index.html` and
//!    `manifest.json` to the output root.
//!
//! With `output.clean`, output goes to a staging directory that replaces the
//! output root only after every file is written.

pub mod codes;
mod collect;
mod emit;
mod html;
mod link;
mod resolve;
mod runtime;
mod transform;

pub use collect::async_chunk_name;
pub use html::{render_document, HtmlTags};
pub use link::link;
pub use resolve::{ResolveError, Resolver};
pub use transform::ModuleOutput;

use crate::chunks::ChunkKind;
use crate::compiler::{CompilerBackend, SwcBackend};
use crate::mode::Mode;
use crate::resolver::ResolvedConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

pub use crate::version::MANIFEST_SCHEMA_VERSION;

/// A build failure with a stable code from [`codes`].
#[derive(Error, Debug)]
#[error("{code}: {message}")]
pub struct BuildError {
    pub code: &'static str,
    pub message: String,
    /// File the failure is about, if any.
    pub path: Option<PathBuf>,
}

impl BuildError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }
}

impl From<crate::Error> for BuildError {
    fn from(err: crate::Error) -> Self {
        Self::new(codes::BUILD_CONFIG_INVALID, err.to_string())
    }
}

/// What an emitted file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Script,
    Stylesheet,
    Asset,
    SourceMap,
    Html,
    Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedFile {
    pub kind: FileKind,
    /// Path relative to the output root, with `/` separators.
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub name: String,
    pub kind: ChunkKind,
    pub modules: usize,
    pub files: Vec<String>,
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub mode: Mode,
    pub modules: usize,
    pub chunks: Vec<ChunkSummary>,
    pub files: Vec<EmittedFile>,
    pub duration_ms: u64,
}

impl BuildReport {
    /// Files of one kind, in emit order.
    pub fn files_of(&self, kind: FileKind) -> impl Iterator<Item = &EmittedFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }
}

/// Build with the SWC backend.
pub fn build(config: &ResolvedConfig) -> Result<BuildReport, BuildError> {
    build_with_backend(config, &SwcBackend::new())
}

/// Build with an explicit compiler backend.
pub fn build_with_backend(
    config: &ResolvedConfig,
    backend: &dyn CompilerBackend,
) -> Result<BuildReport, BuildError> {
    let start = Instant::now();
    info!(
        phase = "resolve",
        mode = %config.mode,
        entries = config.entries.len(),
        backend = backend.name(),
        "build started"
    );

    let graph = collect::collect(config, backend)?;
    info!(
        phase = "transform",
        modules = graph.len(),
        elapsed_ms = elapsed_ms(start),
        "modules transformed"
    );

    let plan = config.partitioner.partition(&graph.records);
    info!(
        phase = "partition",
        chunks = plan.chunks().len(),
        elapsed_ms = elapsed_ms(start),
        "modules partitioned"
    );

    let emitted = emit::emit(config, &graph, &plan, backend)?;
    info!(
        phase = "emit",
        files = emitted.files.len(),
        output = %config.output_dir.display(),
        elapsed_ms = elapsed_ms(start),
        "build finished"
    );

    Ok(BuildReport {
        output_dir: config.output_dir.clone(),
        mode: config.mode,
        modules: graph.len(),
        chunks: emitted.chunks,
        files: emitted.files,
        duration_ms: elapsed_ms(start),
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectConfig;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A small React-style app with a vendor dependency, a lazy page,
    /// a stylesheet and an image.
    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "src/index.tsx",
            "import { createRoot } from 'react-dom';\nimport { helper } from 'left-pad';\nimport App from './App';\nimport './index.css';\ncreateRoot(App, helper);\n",
        );
        write(
            root,
            "src/App.tsx",
            "import logo from './logo.svg';\nconst Settings = () => import('./pages/Settings');\nexport default function App(): string {\n  return logo + Settings;\n}\n",
        );
        write(root, "src/pages/Settings.tsx", "export const title: string = 'Settings';\n");
        write(root, "src/index.css", ".app { display: flex; }\n");
        write(root, "src/logo.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        write(root, "index.html", "<!DOCTYPE html><html><head><title>t</title></head><body><div id=\"root\"></div></body></html>");
        write(
            root,
            "node_modules/react-dom/package.json",
            r#"{"name": "react-dom", "main": "index.js"}"#,
        );
        write(
            root,
            "node_modules/react-dom/index.js",
            "module.exports = { createRoot: function () { return process.env.NODE_ENV; } };\n",
        );
        write(root, "node_modules/left-pad/index.js", "exports.helper = 1;\n");
        dir
    }

    fn resolve(root: &Path, project: serde_json::Value, mode: Mode) -> ResolvedConfig {
        let project: ProjectConfig = serde_json::from_value(project).unwrap();
        ResolvedConfig::resolve(&project, root, mode).unwrap()
    }

    fn chunk<'a>(report: &'a BuildReport, name: &str) -> &'a ChunkSummary {
        report
            .chunks
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("no chunk {name}: {:?}", report.chunks))
    }

    #[test]
    fn test_production_build_names_and_chunks() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({}), Mode::Production);
        let report = build(&config).unwrap();

        assert_eq!(report.modules, 7);
        assert_eq!(chunk(&report, "runtime~main").kind, ChunkKind::Runtime);
        assert_eq!(chunk(&report, "main").kind, ChunkKind::Entry);
        assert_eq!(chunk(&report, "vendor-react").modules, 1);
        assert_eq!(chunk(&report, "vendors").modules, 1);
        assert_eq!(chunk(&report, "src_pages_Settings_tsx").kind, ChunkKind::Async);

        let hashed = regex_lite::Regex::new(r"\.[0-9a-f]{8,9}\.").unwrap();
        for file in report
            .files_of(FileKind::Script)
            .chain(report.files_of(FileKind::Stylesheet))
        {
            assert!(hashed.is_match(&file.path), "{} lacks a hash", file.path);
        }
        let asset = report.files_of(FileKind::Asset).next().unwrap();
        assert!(asset.path.starts_with("static/media/logo."));
        assert!(asset.path.ends_with(".svg"));

        let out = &config.output_dir;
        assert!(out.join("index.html").is_file());
        assert!(out.join("manifest.json").is_file());
        let main_js = &chunk(&report, "main").files[0];
        let main_code = fs::read_to_string(out.join(main_js)).unwrap();
        assert!(main_code.contains("\"./src/App.tsx\": function (module, exports, require)"));
        assert!(main_code.contains("[\"./src/index.tsx\"]"));
        assert!(main_code.contains("require.load(\"./src/pages/Settings.tsx\")"));

        let vendor = fs::read_to_string(out.join(&chunk(&report, "vendor-react").files[0])).unwrap();
        assert!(vendor.contains("return \"production\";"));
    }

    #[test]
    fn test_development_build_has_no_hashes() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({}), Mode::Development);
        let report = build(&config).unwrap();

        let scripts: Vec<&str> = report
            .files_of(FileKind::Script)
            .map(|f| f.path.as_str())
            .collect();
        assert!(scripts.contains(&"static/js/main.js"));
        assert!(scripts.contains(&"static/js/runtime~main.js"));
        assert!(scripts.contains(&"static/js/vendors.chunk.js"));
        assert!(scripts.contains(&"static/js/src_pages_Settings_tsx.chunk.js"));
        assert!(report
            .files_of(FileKind::Asset)
            .any(|f| f.path == "static/media/logo.svg"));
    }

    #[test]
    fn test_html_script_order_and_manifest() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({"css": {"extract": true}}), Mode::Development);
        build(&config).unwrap();

        let html = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        let pos = |needle: &str| html.find(needle).unwrap_or_else(|| panic!("{needle} missing in {html}"));
        let runtime = pos("/static/js/runtime~main.js");
        let vendors = pos("/static/js/vendors.chunk.js");
        let react = pos("/static/js/vendor-react.chunk.js");
        let main = pos("/static/js/main.js");
        assert!(runtime < vendors && runtime < react);
        assert!(vendors < main && react < main);
        assert!(pos("<link href=\"/static/css/main.css\" rel=\"stylesheet\">") < pos("</head>"));
        assert!(!html.contains("src_pages_Settings_tsx"));

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(config.output_dir.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["version"], MANIFEST_SCHEMA_VERSION);
        assert_eq!(manifest["entrypoints"]["main"]["css"][0], "static/css/main.css");
        assert_eq!(
            manifest["assets"]["./src/logo.svg"],
            "static/media/logo.svg"
        );
        assert_eq!(manifest["chunks"]["src_pages_Settings_tsx"]["kind"], "async");
    }

    #[test]
    fn test_inline_css_injects_style_tag() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({}), Mode::Development);
        let report = build(&config).unwrap();

        assert_eq!(report.files_of(FileKind::Stylesheet).count(), 0);
        let main = fs::read_to_string(config.output_dir.join("static/js/main.js")).unwrap();
        assert!(main.contains("document.createElement('style')"));
    }

    #[test]
    fn test_runtime_inlined_without_runtime_chunk() {
        let dir = fixture();
        let config = resolve(
            dir.path(),
            json!({"optimization": {"runtimeChunk": false}}),
            Mode::Development,
        );
        let report = build(&config).unwrap();

        assert!(report.chunks.iter().all(|c| c.kind != ChunkKind::Runtime));
        let main = fs::read_to_string(config.output_dir.join("static/js/main.js")).unwrap();
        assert!(main.starts_with("if (!self.__packline_require__)"));
        assert!(main.contains("static/js/src_pages_Settings_tsx.chunk.js"));
    }

    #[test]
    fn test_failed_build_keeps_previous_output() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({}), Mode::Development);
        build(&config).unwrap();
        let before = fs::read_to_string(config.output_dir.join("static/js/main.js")).unwrap();

        write(dir.path(), "src/App.tsx", "import missing from './missing';\n");
        let err = build(&config).unwrap_err();
        assert_eq!(err.code, codes::BUILD_RESOLVE_FAILED);

        let after = fs::read_to_string(config.output_dir.join("static/js/main.js")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_clean_removes_stale_files() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({}), Mode::Development);
        write(&config.output_dir, "stale.txt", "old");
        build(&config).unwrap();
        assert!(!config.output_dir.join("stale.txt").exists());

        let keep = resolve(dir.path(), json!({"output": {"clean": false}}), Mode::Development);
        write(&keep.output_dir, "stale.txt", "old");
        build(&keep).unwrap();
        assert!(keep.output_dir.join("stale.txt").exists());
    }

    #[test]
    fn test_source_maps() {
        let dir = fixture();
        let config = resolve(dir.path(), json!({"devtool": "source-map"}), Mode::Development);
        let report = build(&config).unwrap();

        let main = fs::read_to_string(config.output_dir.join("static/js/main.js")).unwrap();
        assert!(main.trim_end().ends_with("//# sourceMappingURL=main.js.map"));
        assert!(report
            .files_of(FileKind::SourceMap)
            .any(|f| f.path == "static/js/main.js.map"));
        let map: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(config.output_dir.join("static/js/main.js.map")).unwrap(),
        )
        .unwrap();
        assert_eq!(map["version"], 3);
        assert!(map["sections"].as_array().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn test_json_import_becomes_module_exports() {
        let dir = fixture();
        write(dir.path(), "src/data.json", "{\"a\": 1}");
        write(
            dir.path(),
            "src/App.tsx",
            "import data from './data.json';\nexport default function App(): number {\n  return data.a;\n}\n",
        );
        let config = resolve(dir.path(), json!({}), Mode::Development);
        build(&config).unwrap();

        let main = fs::read_to_string(config.output_dir.join("static/js/main.js")).unwrap();
        assert!(main.contains("module.exports = {\"a\": 1};"));
        assert!(!main.contains("{\n{\"a\": 1}\n}"));
    }

    #[test]
    fn test_conflicting_asset_names_fail_the_build() {
        let dir = fixture();
        write(dir.path(), "src/a/logo.svg", "<svg>A</svg>");
        write(dir.path(), "src/b/logo.svg", "<svg>B</svg>");
        write(
            dir.path(),
            "src/App.tsx",
            "import a from './a/logo.svg';\nimport b from './b/logo.svg';\nexport default function App(): string {\n  return a + b;\n}\n",
        );
        let config = resolve(dir.path(), json!({}), Mode::Development);
        let err = build(&config).unwrap_err();
        assert_eq!(err.code, codes::BUILD_OUTPUT_CONFLICT);
        assert!(err.message.contains("static/media/logo.svg"));

        // Hashed names keep both files apart
        let hashed = resolve(dir.path(), json!({}), Mode::Production);
        let report = build(&hashed).unwrap();
        assert_eq!(report.files_of(FileKind::Asset).count(), 2);
    }

    #[test]
    fn test_identical_assets_share_one_file() {
        let dir = fixture();
        write(dir.path(), "src/a/logo.svg", "<svg/>");
        write(dir.path(), "src/b/logo.svg", "<svg/>");
        write(
            dir.path(),
            "src/App.tsx",
            "import a from './a/logo.svg';\nimport b from './b/logo.svg';\nexport default function App(): string {\n  return a + b;\n}\n",
        );
        let config = resolve(dir.path(), json!({}), Mode::Development);
        let report = build(&config).unwrap();
        assert_eq!(report.files_of(FileKind::Asset).count(), 1);
    }

    #[test]
    fn test_build_error_display() {
        let err = BuildError::new(codes::BUILD_EMIT_FAILED, "disk full").with_path("/tmp/out");
        assert_eq!(err.to_string(), "BUILD_EMIT_FAILED: disk full");
        assert_eq!(err.path.as_deref(), Some(Path::new("/tmp/out")));
    }
}
