//! Module collection.
//!
//! Starting from the entries, modules are discovered in waves: every module
//! of a wave is routed and transformed in parallel, its import specifiers are
//! resolved, and unseen targets form the next wave. A dynamic import of an
//! unseen module starts a new async origin chunk.

use super::codes;
use super::resolve::Resolver;
use super::transform::{transform, ModuleOutput};
use super::BuildError;
use crate::chunks::{ModuleRecord, OriginKind};
use crate::compiler::CompilerBackend;
use crate::imports::{scan_imports, ImportKind};
use crate::resolver::{module_id, ResolvedConfig};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A transformed module with its resolved dependencies.
#[derive(Debug, Clone)]
pub struct CollectedModule {
    pub id: String,
    pub path: PathBuf,
    pub output: ModuleOutput,
    /// Raw specifier to target module id.
    pub deps: BTreeMap<String, String>,
}

/// Every module reachable from the entries.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// Modules in discovery order.
    pub modules: Vec<CollectedModule>,
    pub records: Vec<ModuleRecord>,
    /// Entry name and entry module id, in declaration order.
    pub entries: Vec<(String, String)>,
    /// Dynamically imported module id to the async origin it starts.
    pub async_origins: BTreeMap<String, String>,
    index: HashMap<String, usize>,
}

impl ModuleGraph {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CollectedModule> {
        self.index.get(id).map(|&i| &self.modules[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }
}

#[derive(Debug, Clone)]
struct Pending {
    path: PathBuf,
    id: String,
    origin: String,
    origin_kind: OriginKind,
}

struct Processed {
    output: ModuleOutput,
    imports: Vec<(String, ImportKind, PathBuf)>,
}

/// Name of the async origin chunk a dynamic import of `id` starts.
///
/// `./src/pages/Settings.tsx` becomes `src_pages_Settings_tsx`.
#[must_use]
pub fn async_chunk_name(id: &str) -> String {
    id.trim_start_matches("./")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Collect and transform every module reachable from the entries.
pub fn collect(config: &ResolvedConfig, backend: &dyn CompilerBackend) -> Result<ModuleGraph, BuildError> {
    let root = dunce::canonicalize(&config.root).unwrap_or_else(|_| config.root.clone());
    let resolver = Resolver::new(config.extensions.clone(), config.modules.clone());

    let mut graph = ModuleGraph::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut wave = Vec::new();

    for entry in &config.entries {
        let path = dunce::canonicalize(&entry.path).map_err(|e| {
            BuildError::new(codes::BUILD_READ_FAILED, format!("Entry '{}': {e}", entry.name))
                .with_path(&entry.path)
        })?;
        let id = module_id(&root, &path);
        graph.entries.push((entry.name.clone(), id.clone()));
        if seen.insert(path.clone()) {
            wave.push(Pending {
                path,
                id,
                origin: entry.name.clone(),
                origin_kind: OriginKind::Initial,
            });
        }
    }

    while !wave.is_empty() {
        tracing::debug!(modules = wave.len(), "transforming wave");
        let results: Vec<Result<Processed, BuildError>> = wave
            .par_iter()
            .map(|pending| process(config, backend, &resolver, pending))
            .collect();

        let mut next = Vec::new();
        for (pending, result) in wave.into_iter().zip(results) {
            let processed = result?;
            let mut deps = BTreeMap::new();

            for (raw, kind, target) in processed.imports {
                let target_id = module_id(&root, &target);
                deps.insert(raw, target_id.clone());
                if !seen.insert(target.clone()) {
                    continue;
                }
                let (origin, origin_kind) = if kind.is_sync() {
                    (pending.origin.clone(), pending.origin_kind)
                } else {
                    let name = async_chunk_name(&target_id);
                    graph.async_origins.insert(target_id.clone(), name.clone());
                    (name, OriginKind::Async)
                };
                next.push(Pending {
                    path: target,
                    id: target_id,
                    origin,
                    origin_kind,
                });
            }

            graph.records.push(ModuleRecord {
                id: pending.id.clone(),
                origin: pending.origin,
                origin_kind: pending.origin_kind,
            });
            graph.index.insert(pending.id.clone(), graph.modules.len());
            graph.modules.push(CollectedModule {
                id: pending.id,
                path: pending.path,
                output: processed.output,
                deps,
            });
        }
        wave = next;
    }

    Ok(graph)
}

fn process(
    config: &ResolvedConfig,
    backend: &dyn CompilerBackend,
    resolver: &Resolver,
    pending: &Pending,
) -> Result<Processed, BuildError> {
    let route = config.router.route(Path::new(&pending.id));
    let fully_specified = route
        .and_then(|m| m.resolve)
        .and_then(|r| r.fully_specified)
        .unwrap_or_else(|| {
            pending
                .path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("mjs"))
        });

    let output = transform(config, backend, &pending.path, &pending.id, route)?;

    let imports = match &output {
        ModuleOutput::Script { code, .. } => scan_imports(code)
            .into_iter()
            .map(|spec| {
                let target = resolver
                    .resolve(&spec.raw, &pending.path, fully_specified)
                    .map_err(|e| {
                        let line = spec.line.map(|l| format!(":{l}")).unwrap_or_default();
                        BuildError::new(
                            codes::BUILD_RESOLVE_FAILED,
                            format!("{e} ({}{line})", pending.id),
                        )
                        .with_path(&pending.path)
                    })?;
                Ok((spec.raw, spec.kind, target))
            })
            .collect::<Result<Vec<_>, BuildError>>()?,
        ModuleOutput::Style { .. } | ModuleOutput::Asset { .. } => Vec::new(),
    };

    Ok(Processed { output, imports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SwcBackend;
    use crate::mode::Mode;
    use crate::project::ProjectConfig;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolved(root: &Path) -> ResolvedConfig {
        ResolvedConfig::resolve(&ProjectConfig::default(), root, Mode::Development).unwrap()
    }

    #[test]
    fn test_async_chunk_name() {
        assert_eq!(async_chunk_name("./src/pages/Settings.tsx"), "src_pages_Settings_tsx");
        assert_eq!(async_chunk_name("./node_modules/@scope/x/index.js"), "node_modules__scope_x_index_js");
    }

    #[test]
    fn test_collects_static_and_dynamic_imports() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root,
            "src/index.tsx",
            "import { render } from 'react-dom';\nimport App from './App';\nimport './index.css';\nrender(App);\n",
        );
        write(
            &root,
            "src/App.tsx",
            "const Settings = () => import('./pages/Settings');\nexport default function App() { return Settings; }\n",
        );
        write(&root, "src/pages/Settings.tsx", "export default 1;\n");
        write(&root, "src/index.css", "body { margin: 0; }");
        write(&root, "node_modules/react-dom/index.js", "module.exports = { render() {} };\n");

        let config = resolved(&root);
        let graph = collect(&config, &SwcBackend::new()).unwrap();

        assert_eq!(graph.entries, vec![("main".to_string(), "./src/index.tsx".to_string())]);
        assert_eq!(graph.len(), 5);

        let record = |id: &str| graph.records.iter().find(|r| r.id == id).unwrap().clone();
        assert_eq!(record("./src/App.tsx").origin, "main");
        assert_eq!(record("./node_modules/react-dom/index.js").origin_kind, OriginKind::Initial);
        let settings = record("./src/pages/Settings.tsx");
        assert_eq!(settings.origin, "src_pages_Settings_tsx");
        assert_eq!(settings.origin_kind, OriginKind::Async);
        assert_eq!(
            graph.async_origins.get("./src/pages/Settings.tsx").map(String::as_str),
            Some("src_pages_Settings_tsx")
        );

        let entry = graph.get("./src/index.tsx").unwrap();
        assert_eq!(entry.deps.get("./App").map(String::as_str), Some("./src/App.tsx"));
        assert_eq!(
            entry.deps.get("react-dom").map(String::as_str),
            Some("./node_modules/react-dom/index.js")
        );
        assert!(matches!(
            graph.get("./src/index.css").unwrap().output,
            ModuleOutput::Style { .. }
        ));
    }

    #[test]
    fn test_unresolvable_import_fails() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(&root, "src/index.tsx", "import missing from './missing';\n");

        let config = resolved(&root);
        let err = collect(&config, &SwcBackend::new()).unwrap_err();
        assert_eq!(err.code, codes::BUILD_RESOLVE_FAILED);
        assert!(err.message.contains("./missing"));
    }

    #[test]
    fn test_shared_module_recorded_once() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root,
            "src/index.tsx",
            "import { a } from './a';\nimport { b } from './b';\nconsole.log(a, b);\n",
        );
        write(&root, "src/a.ts", "import { shared } from './shared';\nexport const a = shared;\n");
        write(&root, "src/b.ts", "import { shared } from './shared';\nexport const b = shared;\n");
        write(&root, "src/shared.ts", "export const shared = 1;\n");

        let config = resolved(&root);
        let graph = collect(&config, &SwcBackend::new()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(
            graph.records.iter().filter(|r| r.id == "./src/shared.ts").count(),
            1
        );
    }
}
