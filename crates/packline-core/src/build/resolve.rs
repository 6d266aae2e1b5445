//! Import specifier resolution.
//!
//! Resolves import specifiers to absolute file paths.
//!
//! ## Specifier Types
//!
//! - Relative: `./utils`, `../lib/foo`
//! - Absolute: `/abs/path/to/module`
//! - Bare: `lodash`, `@scope/pkg`, `react/jsx-runtime`
//!
//! Extensionless paths are tried with each configured extension in order,
//! then as a directory with an `index` file. Bare specifiers are looked up in
//! every `resolve.modules` directory from the importer's directory upwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Error during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub specifier: String,
    pub from: PathBuf,
    pub message: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cannot resolve '{}' from '{}': {}",
            self.specifier,
            self.from.display(),
            self.message
        )
    }
}

impl std::error::Error for ResolveError {}

/// Import resolver for one build.
#[derive(Debug)]
pub struct Resolver {
    extensions: Vec<String>,
    modules: Vec<String>,
    /// Bare specifier resolutions keyed by (specifier, importer directory).
    cache: RwLock<HashMap<(String, PathBuf), PathBuf>>,
}

impl Resolver {
    #[must_use]
    pub fn new(extensions: Vec<String>, modules: Vec<String>) -> Self {
        Self {
            extensions,
            modules,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve `specifier` imported by the file `from`.
    ///
    /// With `fully_specified`, relative specifiers must name an existing
    /// file exactly; no extension or `index` lookup is attempted.
    pub fn resolve(
        &self,
        specifier: &str,
        from: &Path,
        fully_specified: bool,
    ) -> Result<PathBuf, ResolveError> {
        let fail = |message: &str| ResolveError {
            specifier: specifier.to_string(),
            from: from.to_path_buf(),
            message: message.to_string(),
        };

        if specifier.starts_with("node:") {
            return Err(fail("Node.js built-in modules are not available in browser builds"));
        }

        if is_relative(specifier) {
            let from_dir = from.parent().unwrap_or(Path::new("."));
            let target = from_dir.join(specifier);
            if fully_specified {
                return if target.is_file() {
                    canonical(&target).ok_or_else(|| fail("cannot canonicalize path"))
                } else {
                    Err(fail("fully specified import must include the file extension"))
                };
            }
            return self
                .resolve_path(&target)
                .ok_or_else(|| fail("File not found"));
        }

        if specifier.starts_with('/') {
            return self
                .resolve_path(Path::new(specifier))
                .ok_or_else(|| fail("File not found"));
        }

        self.resolve_bare(specifier, from)
    }

    fn resolve_bare(&self, specifier: &str, from: &Path) -> Result<PathBuf, ResolveError> {
        let from_dir = from.parent().unwrap_or(Path::new(".")).to_path_buf();
        let cache_key = (specifier.to_string(), from_dir.clone());
        if let Some(hit) = self.cache.read().ok().and_then(|c| c.get(&cache_key).cloned()) {
            return Ok(hit);
        }

        let (pkg_name, subpath) = parse_bare_specifier(specifier);

        // Walk up from the importer looking in each modules directory
        let mut current = Some(from_dir.as_path());
        while let Some(dir) = current {
            for modules_dir in &self.modules {
                let base = if Path::new(modules_dir).is_absolute() {
                    PathBuf::from(modules_dir)
                } else {
                    dir.join(modules_dir)
                };
                let pkg_dir = base.join(pkg_name);
                if !pkg_dir.is_dir() {
                    continue;
                }

                let found = match subpath {
                    Some(sub) => self.resolve_path(&pkg_dir.join(sub)),
                    None => self.package_entry(&pkg_dir),
                };
                if let Some(path) = found {
                    if let Ok(mut cache) = self.cache.write() {
                        cache.insert(cache_key, path.clone());
                    }
                    return Ok(path);
                }
            }
            current = dir.parent();
        }

        Err(ResolveError {
            specifier: specifier.to_string(),
            from: from.to_path_buf(),
            message: format!(
                "Cannot find package '{pkg_name}' in {}",
                self.modules.join(", ")
            ),
        })
    }

    /// A file, a file with one of the extensions, or a directory entry.
    fn resolve_path(&self, target: &Path) -> Option<PathBuf> {
        self.try_file(target).or_else(|| {
            if target.is_dir() {
                if target.join("package.json").is_file() {
                    self.package_entry(target)
                } else {
                    self.try_file(&target.join("index"))
                }
            } else {
                None
            }
        })
    }

    /// Entry point of a package: `module`, then `main`, then `index`.
    fn package_entry(&self, pkg_dir: &Path) -> Option<PathBuf> {
        let manifest = std::fs::read_to_string(pkg_dir.join("package.json"))
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok());

        if let Some(json) = manifest {
            for field in ["module", "main"] {
                if let Some(entry) = json.get(field).and_then(|v| v.as_str()) {
                    let target = pkg_dir.join(entry);
                    if let Some(found) = self
                        .try_file(&target)
                        .or_else(|| self.try_file(&target.join("index")))
                    {
                        return Some(found);
                    }
                }
            }
        }

        self.try_file(&pkg_dir.join("index"))
    }

    fn try_file(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return canonical(target);
        }
        for ext in &self.extensions {
            let mut candidate = target.as_os_str().to_os_string();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return canonical(&candidate);
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

fn canonical(path: &Path) -> Option<PathBuf> {
    dunce::canonicalize(path).ok()
}

/// Split a bare specifier into package name and subpath.
fn parse_bare_specifier(specifier: &str) -> (&str, Option<&str>) {
    let split_at = if specifier.starts_with('@') {
        // Scoped package: @scope/pkg or @scope/pkg/subpath
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(i, _)| i)
    } else {
        specifier.find('/')
    };
    match split_at {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn resolver() -> Resolver {
        Resolver::new(
            vec![".js".into(), ".json".into(), ".ts".into(), ".tsx".into()],
            vec!["node_modules".into()],
        )
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_bare_specifier() {
        assert_eq!(parse_bare_specifier("react"), ("react", None));
        assert_eq!(
            parse_bare_specifier("react/jsx-runtime"),
            ("react", Some("jsx-runtime"))
        );
        assert_eq!(parse_bare_specifier("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(
            parse_bare_specifier("@scope/pkg/a/b"),
            ("@scope/pkg", Some("a/b"))
        );
    }

    #[test]
    fn test_relative_with_extensions_and_index() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(&root.join("src/index.tsx"), "");
        write(&root.join("src/App.tsx"), "");
        write(&root.join("src/pages/index.ts"), "");

        let r = resolver();
        let from = root.join("src/index.tsx");
        assert_eq!(r.resolve("./App", &from, false).unwrap(), root.join("src/App.tsx"));
        assert_eq!(
            r.resolve("./pages", &from, false).unwrap(),
            root.join("src/pages/index.ts")
        );
        let err = r.resolve("./Missing", &from, false).unwrap_err();
        assert!(err.to_string().contains("./Missing"));
    }

    #[test]
    fn test_fully_specified_requires_extension() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(&root.join("lib/a.mjs"), "");
        write(&root.join("lib/b.js"), "");

        let r = resolver();
        let from = root.join("lib/a.mjs");
        assert!(r.resolve("./b.js", &from, true).is_ok());
        let err = r.resolve("./b", &from, true).unwrap_err();
        assert!(err.message.contains("fully specified"));
        assert!(r.resolve("./b", &from, false).is_ok());
    }

    #[test]
    fn test_bare_package_entry_order() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(&root.join("src/index.js"), "");
        write(
            &root.join("node_modules/esm-pkg/package.json"),
            r#"{"main": "cjs.js", "module": "esm.js"}"#,
        );
        write(&root.join("node_modules/esm-pkg/esm.js"), "");
        write(&root.join("node_modules/esm-pkg/cjs.js"), "");
        write(&root.join("node_modules/plain/index.js"), "");
        write(&root.join("node_modules/react/package.json"), r#"{"main": "index"}"#);
        write(&root.join("node_modules/react/index.js"), "");
        write(&root.join("node_modules/react/jsx-runtime.js"), "");

        let r = resolver();
        let from = root.join("src/index.js");
        assert_eq!(
            r.resolve("esm-pkg", &from, false).unwrap(),
            root.join("node_modules/esm-pkg/esm.js")
        );
        assert_eq!(
            r.resolve("plain", &from, false).unwrap(),
            root.join("node_modules/plain/index.js")
        );
        assert_eq!(
            r.resolve("react", &from, false).unwrap(),
            root.join("node_modules/react/index.js")
        );
        assert_eq!(
            r.resolve("react/jsx-runtime", &from, false).unwrap(),
            root.join("node_modules/react/jsx-runtime.js")
        );
    }

    #[test]
    fn test_bare_missing_and_builtin() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("src/index.js");
        write(&from, "");

        let r = resolver();
        let err = r.resolve("left-pad", &from, false).unwrap_err();
        assert!(err.message.contains("left-pad"));

        let err = r.resolve("node:fs", &from, false).unwrap_err();
        assert!(err.message.contains("built-in"));
    }
}
