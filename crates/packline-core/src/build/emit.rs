//! Output emission.
//!
//! Writes assets, chunk scripts, extracted stylesheets, `index.html` and
//! `manifest.json`. Chunks are rendered leaves first: split and async chunks,
//! then entries, then runtimes, since a runtime embeds the file names of the
//! async chunks it loads.

use super::collect::{CollectedModule, ModuleGraph};
use super::html::{render_document, HtmlTags};
use super::link::link;
use super::runtime::{render_chunk, runtime_source};
use super::transform::ModuleOutput;
use super::{codes, BuildError, ChunkSummary, EmittedFile, FileKind, MANIFEST_SCHEMA_VERSION};
use crate::chunks::{Chunk, ChunkKind, ChunkPlan};
use crate::compiler::{CompilerBackend, ParserSyntax, TranspileSpec};
use crate::css::{class_map_module, style_injection_module};
use crate::naming::{ArtifactKind, RenderContext};
use crate::resolver::ResolvedConfig;
use packline_util::fs::{atomic_write, sibling_path, swap_dir};
use packline_util::hash::{blake3_bytes, blake3_parts};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub struct Emitted {
    pub chunks: Vec<ChunkSummary>,
    pub files: Vec<EmittedFile>,
}

/// A module ready to be placed in a chunk.
struct ModuleBody {
    code: String,
    map: Option<String>,
    /// Extracted CSS, in extract mode.
    css: Option<String>,
}

/// Files written for one chunk.
#[derive(Debug, Clone, Default)]
struct ChunkFiles {
    js: Option<String>,
    css: Option<String>,
}

impl ChunkFiles {
    /// Stylesheet first, so it starts loading before the script runs.
    fn all(&self) -> impl Iterator<Item = &String> {
        self.css.iter().chain(self.js.iter())
    }
}

struct Writer<'a> {
    dest: &'a Path,
    files: Vec<EmittedFile>,
    /// Output path to content digest.
    written: HashMap<String, String>,
}

impl Writer<'_> {
    /// Write one output file. Rewriting a path with identical content is a
    /// no-op; different content is a naming conflict.
    fn write(&mut self, kind: FileKind, rel: &str, bytes: &[u8]) -> Result<(), BuildError> {
        let digest = blake3_bytes(bytes);
        if let Some(previous) = self.written.get(rel) {
            if *previous == digest {
                return Ok(());
            }
            return Err(BuildError::new(
                codes::BUILD_OUTPUT_CONFLICT,
                format!("Multiple outputs emit different content to the same file name {rel}"),
            )
            .with_path(self.dest.join(rel)));
        }
        self.written.insert(rel.to_string(), digest);
        let path = self.dest.join(rel);
        atomic_write(&path, bytes).map_err(|e| {
            BuildError::new(codes::BUILD_EMIT_FAILED, format!("Failed to write {rel}: {e}")).with_path(&path)
        })?;
        debug!(file = %rel, size = bytes.len(), "emitted");
        self.files.push(EmittedFile {
            kind,
            path: rel.to_string(),
            size: bytes.len() as u64,
        });
        Ok(())
    }
}

/// Write the build output, replacing the output root when `output.clean` is on.
pub fn emit(
    config: &ResolvedConfig,
    graph: &ModuleGraph,
    plan: &ChunkPlan,
    backend: &dyn CompilerBackend,
) -> Result<Emitted, BuildError> {
    let emit_failed = |e: std::io::Error, path: &Path| {
        BuildError::new(codes::BUILD_EMIT_FAILED, e.to_string()).with_path(path)
    };

    if !config.clean {
        fs::create_dir_all(&config.output_dir).map_err(|e| emit_failed(e, &config.output_dir))?;
        return write_outputs(config, graph, plan, backend, &config.output_dir);
    }

    let staging = sibling_path(&config.output_dir, "staging");
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| emit_failed(e, &staging))?;
    }
    fs::create_dir_all(&staging).map_err(|e| emit_failed(e, &staging))?;

    let result = write_outputs(config, graph, plan, backend, &staging).and_then(|emitted| {
        swap_dir(&staging, &config.output_dir).map_err(|e| emit_failed(e, &config.output_dir))?;
        Ok(emitted)
    });
    if result.is_err() {
        let _ = fs::remove_dir_all(&staging);
    }
    result
}

fn write_outputs(
    config: &ResolvedConfig,
    graph: &ModuleGraph,
    plan: &ChunkPlan,
    backend: &dyn CompilerBackend,
    dest: &Path,
) -> Result<Emitted, BuildError> {
    let mut writer = Writer {
        dest,
        files: Vec::new(),
        written: HashMap::new(),
    };

    let assets = emit_assets(config, graph, &mut writer)?;

    let bodies: HashMap<&str, ModuleBody> = graph
        .modules
        .par_iter()
        .map(|module| module_body(config, backend, module, &assets).map(|b| (module.id.as_str(), b)))
        .collect::<Result<_, _>>()?;

    let mut files: HashMap<String, ChunkFiles> = HashMap::new();
    let kinds_in_order = [
        &[ChunkKind::Split, ChunkKind::Async][..],
        &[ChunkKind::Entry][..],
        &[ChunkKind::Runtime][..],
    ];

    let mut async_files = BTreeMap::new();
    for (pass, kinds) in kinds_in_order.iter().enumerate() {
        if pass == 1 {
            async_files = async_file_map(graph, plan, &files);
        }
        for chunk in plan.chunks().iter().filter(|c| kinds.contains(&c.kind)) {
            // Empty split and async chunks are never loaded
            if chunk.modules.is_empty() && matches!(chunk.kind, ChunkKind::Split | ChunkKind::Async) {
                continue;
            }
            let written = emit_chunk(config, graph, chunk, &bodies, &async_files, &mut writer)?;
            files.insert(chunk.name.clone(), written);
        }
    }

    let entrypoints = emit_html(config, graph, plan, &files, &mut writer)?;
    emit_manifest(config, plan, &files, &entrypoints, &assets, &mut writer)?;

    let chunks = plan
        .chunks()
        .iter()
        .filter_map(|c| {
            files.get(&c.name).map(|f| ChunkSummary {
                name: c.name.clone(),
                kind: c.kind,
                modules: c.modules.len(),
                files: f.js.iter().chain(f.css.iter()).cloned().collect(),
            })
        })
        .collect();

    Ok(Emitted {
        chunks,
        files: writer.files,
    })
}

/// Write asset modules. Returns module id to emitted file.
fn emit_assets(
    config: &ResolvedConfig,
    graph: &ModuleGraph,
    writer: &mut Writer<'_>,
) -> Result<BTreeMap<String, String>, BuildError> {
    let mut assets = BTreeMap::new();
    for module in &graph.modules {
        if let ModuleOutput::Asset { bytes, name, ext } = &module.output {
            let hash = blake3_bytes(bytes);
            let file = config.namer.render(
                ArtifactKind::Asset,
                &RenderContext {
                    name,
                    ext,
                    content_hash: &hash,
                    chunk_hash: None,
                },
            );
            writer.write(FileKind::Asset, &file, bytes)?;
            assets.insert(module.id.clone(), file);
        }
    }
    Ok(assets)
}

fn module_body(
    config: &ResolvedConfig,
    backend: &dyn CompilerBackend,
    module: &CollectedModule,
    assets: &BTreeMap<String, String>,
) -> Result<ModuleBody, BuildError> {
    let body = match &module.output {
        ModuleOutput::Script { code, map, minify } => {
            let linked = link(code, &module.deps);
            if *minify || config.partitioner.minimize() {
                ModuleBody {
                    code: minify_script(backend, module, linked),
                    map: None,
                    css: None,
                }
            } else {
                ModuleBody {
                    code: linked,
                    map: map.clone(),
                    css: None,
                }
            }
        }
        ModuleOutput::Style { css, exports, extract } => {
            if *extract {
                ModuleBody {
                    code: class_map_module(exports),
                    map: None,
                    css: Some(css.clone()),
                }
            } else {
                ModuleBody {
                    code: style_injection_module(css, exports),
                    map: None,
                    css: None,
                }
            }
        }
        ModuleOutput::Asset { .. } => {
            let file = assets.get(&module.id).ok_or_else(|| {
                BuildError::new(codes::BUILD_EMIT_FAILED, format!("Asset {} was not emitted", module.id))
            })?;
            let url = format!("{}{file}", config.public_path);
            ModuleBody {
                code: format!("module.exports = {};\n", Value::String(url)),
                map: None,
                css: None,
            }
        }
    };
    Ok(body)
}

/// Run the backend's minifying codegen over a linked module body.
///
/// Bodies the backend cannot parse are kept unminified.
fn minify_script(backend: &dyn CompilerBackend, module: &CollectedModule, code: String) -> String {
    let spec = TranspileSpec::new(&module.path)
        .with_syntax(ParserSyntax::Ecmascript)
        .with_jsx(false)
        .with_minify(true);
    match backend.transpile(&spec, &code) {
        Ok(output) => output.code,
        Err(e) => {
            warn!(module = %module.id, error = %e, "minification skipped");
            code
        }
    }
}

/// Dynamically imported module id to the files `require.load` fetches.
///
/// Split chunks an entry already loads are left out.
fn async_file_map(
    graph: &ModuleGraph,
    plan: &ChunkPlan,
    files: &HashMap<String, ChunkFiles>,
) -> BTreeMap<String, Vec<String>> {
    let entry_names: HashSet<&str> = graph.entries.iter().map(|(name, _)| name.as_str()).collect();
    let mut map = BTreeMap::new();

    for (id, origin) in &graph.async_origins {
        let mut list: Vec<String> = Vec::new();
        let shared = plan
            .split_chunks_for(origin)
            .filter(|c| !c.required_by.iter().any(|o| entry_names.contains(o.as_str())));
        for chunk in shared.chain(plan.get(origin)) {
            if let Some(f) = files.get(&chunk.name) {
                list.extend(f.all().cloned());
            }
        }
        map.insert(id.clone(), list);
    }
    map
}

fn emit_chunk(
    config: &ResolvedConfig,
    graph: &ModuleGraph,
    chunk: &Chunk,
    bodies: &HashMap<&str, ModuleBody>,
    async_files: &BTreeMap<String, Vec<String>>,
    writer: &mut Writer<'_>,
) -> Result<ChunkFiles, BuildError> {
    let namer = &config.namer;

    if chunk.kind == ChunkKind::Runtime {
        let code = runtime_source(&config.public_path, async_files);
        let hash = blake3_bytes(code.as_bytes());
        let file = namer.render(
            ArtifactKind::Script,
            &RenderContext {
                name: &chunk.name,
                ext: "js",
                content_hash: &hash,
                chunk_hash: None,
            },
        );
        writer.write(FileKind::Script, &file, code.as_bytes())?;
        return Ok(ChunkFiles {
            js: Some(file),
            css: None,
        });
    }

    let modules: Vec<(&str, &str)> = chunk
        .modules
        .iter()
        .filter_map(|id| bodies.get(id.as_str()).map(|b| (id.as_str(), b.code.as_str())))
        .collect();
    let entry_ids: Vec<&str> = if chunk.kind == ChunkKind::Entry {
        graph
            .entries
            .iter()
            .filter(|(name, _)| *name == chunk.name)
            .map(|(_, id)| id.as_str())
            .collect()
    } else {
        Vec::new()
    };

    let inline_runtime = (chunk.kind == ChunkKind::Entry && !config.partitioner.runtime_chunk())
        .then(|| runtime_source(&config.public_path, async_files));
    let rendered = render_chunk(&chunk.name, &modules, &entry_ids, inline_runtime.as_deref());

    let chunk_hash = blake3_parts(
        modules
            .iter()
            .flat_map(|(id, code)| [id.as_bytes(), code.as_bytes()]),
    );
    let content_hash = blake3_bytes(rendered.code.as_bytes());
    let artifact = match chunk.kind {
        ChunkKind::Entry | ChunkKind::Runtime => ArtifactKind::Script,
        ChunkKind::Async | ChunkKind::Split => ArtifactKind::Chunk,
    };
    let js_file = namer.render(
        artifact,
        &RenderContext {
            name: &chunk.name,
            ext: "js",
            content_hash: &content_hash,
            chunk_hash: Some(&chunk_hash),
        },
    );

    let mut code = rendered.code;
    if config.source_maps {
        let sections: Vec<Value> = rendered
            .offsets
            .iter()
            .filter_map(|(id, line)| {
                let map = bodies.get(id.as_str())?.map.as_deref()?;
                let map: Value = serde_json::from_str(map).ok()?;
                Some(json!({ "offset": { "line": line, "column": 0 }, "map": map }))
            })
            .collect();
        let index_map = json!({
            "version": 3,
            "file": file_name(&js_file),
            "sections": sections,
        });
        let map_file = format!("{js_file}.map");
        writer.write(FileKind::SourceMap, &map_file, index_map.to_string().as_bytes())?;
        code.push_str(&format!("//# sourceMappingURL={}\n", file_name(&map_file)));
    }
    writer.write(FileKind::Script, &js_file, code.as_bytes())?;

    let css: String = chunk
        .modules
        .iter()
        .filter_map(|id| bodies.get(id.as_str())?.css.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    let css_file = if css.trim().is_empty() {
        None
    } else {
        let hash = blake3_bytes(css.as_bytes());
        let kind = if chunk.kind == ChunkKind::Entry {
            ArtifactKind::Stylesheet
        } else {
            ArtifactKind::StyleChunk
        };
        let file = namer.render(
            kind,
            &RenderContext {
                name: &chunk.name,
                ext: "css",
                content_hash: &hash,
                chunk_hash: None,
            },
        );
        writer.write(FileKind::Stylesheet, &file, css.as_bytes())?;
        Some(file)
    };

    Ok(ChunkFiles {
        js: Some(js_file),
        css: css_file,
    })
}

/// Write `index.html`. Returns the initial files of each entry.
fn emit_html(
    config: &ResolvedConfig,
    graph: &ModuleGraph,
    plan: &ChunkPlan,
    files: &HashMap<String, ChunkFiles>,
    writer: &mut Writer<'_>,
) -> Result<BTreeMap<String, EntrypointFiles>, BuildError> {
    let mut tags = HtmlTags::default();
    let mut entrypoints = BTreeMap::new();

    for (entry, _) in &graph.entries {
        let mut scripts = Vec::new();
        let mut styles = Vec::new();
        let chunks = plan
            .runtime_for(entry)
            .into_iter()
            .chain(plan.split_chunks_for(entry))
            .chain(plan.get(entry));
        for chunk in chunks {
            if let Some(f) = files.get(&chunk.name) {
                scripts.extend(f.js.iter().cloned());
                styles.extend(f.css.iter().cloned());
            }
        }

        for file in &scripts {
            push_unique(&mut tags.scripts, format!("{}{file}", config.public_path));
        }
        for file in &styles {
            push_unique(&mut tags.styles, format!("{}{file}", config.public_path));
        }
        entrypoints.insert(
            entry.clone(),
            EntrypointFiles {
                js: scripts,
                css: styles,
            },
        );
    }

    let template = match &config.html.template {
        Some(path) => Some(packline_util::fs::read_to_string_lossy(path).map_err(|e| {
            BuildError::new(codes::BUILD_READ_FAILED, format!("Failed to read HTML template: {e}"))
                .with_path(path)
        })?),
        None => None,
    };
    let document = render_document(
        template.as_deref(),
        &config.html.title,
        &tags,
        config.html.inject,
    );
    writer.write(FileKind::Html, "index.html", document.as_bytes())?;

    Ok(entrypoints)
}

/// Files an entry loads from the HTML document, in load order.
#[derive(Debug, Clone, Default, Serialize)]
struct EntrypointFiles {
    js: Vec<String>,
    css: Vec<String>,
}

fn emit_manifest(
    config: &ResolvedConfig,
    plan: &ChunkPlan,
    files: &HashMap<String, ChunkFiles>,
    entrypoints: &BTreeMap<String, EntrypointFiles>,
    assets: &BTreeMap<String, String>,
    writer: &mut Writer<'_>,
) -> Result<(), BuildError> {
    let mut chunks = Map::new();
    for chunk in plan.chunks() {
        if let Some(f) = files.get(&chunk.name) {
            chunks.insert(
                chunk.name.clone(),
                json!({
                    "kind": chunk.kind,
                    "files": f.js.iter().chain(f.css.iter()).collect::<Vec<_>>(),
                }),
            );
        }
    }

    let manifest = json!({
        "version": MANIFEST_SCHEMA_VERSION,
        "mode": config.mode,
        "publicPath": config.public_path,
        "entrypoints": entrypoints,
        "chunks": chunks,
        "assets": assets,
    });
    let bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| BuildError::new(codes::BUILD_EMIT_FAILED, e.to_string()))?;
    writer.write(FileKind::Manifest, "manifest.json", &bytes)
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}
