//! Browser module registry and chunk rendering.
//!
//! Chunks push `[name, modules, entryIds]` onto `self.__packline_chunks__`.
//! The runtime drains that queue, installs module factories, runs entry
//! modules, and loads async chunks on `require.load`. Entry chunks load with
//! `<script defer>`, so the runtime and split chunks listed before an entry
//! have already pushed their modules when the entry runs.

use std::collections::BTreeMap;

/// Global the chunks and runtime share.
pub const CHUNK_QUEUE: &str = "__packline_chunks__";

const RUNTIME_TEMPLATE: &str = r#"if (!self.__packline_require__) (function () {
  var factories = {};
  var cache = {};
  var loaded = {};
  var publicPath = __PUBLIC_PATH__;
  var asyncFiles = __ASYNC_FILES__;
  function require(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var factory = factories[id];
    if (!factory) throw new Error("Cannot find module '" + id + "'");
    var module = (cache[id] = { exports: {} });
    factory.call(module.exports, module, module.exports, require);
    return module.exports;
  }
  require.i = function (m) {
    return m && m.__esModule ? m : { default: m };
  };
  require.d = function (exports, name, getter) {
    Object.defineProperty(exports, name, { enumerable: true, get: getter });
  };
  require.e = function (exports, source) {
    Object.keys(source).forEach(function (key) {
      if (key !== "default" && !Object.prototype.hasOwnProperty.call(exports, key)) {
        require.d(exports, key, function () { return source[key]; });
      }
    });
  };
  function loadFile(file) {
    if (loaded[file]) return loaded[file];
    return (loaded[file] = new Promise(function (resolve, reject) {
      var el;
      if (/\.css$/.test(file)) {
        el = document.createElement("link");
        el.rel = "stylesheet";
        el.href = publicPath + file;
      } else {
        el = document.createElement("script");
        el.src = publicPath + file;
      }
      el.onload = function () { resolve(); };
      el.onerror = function () {
        delete loaded[file];
        reject(new Error("Loading chunk file " + file + " failed"));
      };
      document.head.appendChild(el);
    }));
  }
  require.load = function (id) {
    var files = asyncFiles[id] || [];
    return Promise.all(files.map(loadFile)).then(function () {
      return require(id);
    });
  };
  function install(chunk) {
    var modules = chunk[1];
    for (var id in modules) {
      if (Object.prototype.hasOwnProperty.call(modules, id)) factories[id] = modules[id];
    }
    var entries = chunk[2] || [];
    for (var i = 0; i < entries.length; i++) require(entries[i]);
  }
  var queue = (self.__packline_chunks__ = self.__packline_chunks__ || []);
  for (var i = 0; i < queue.length; i++) install(queue[i]);
  queue.push = install;
  self.__packline_require__ = require;
})();
"#;

/// Source of the module registry.
///
/// `async_files` maps each dynamically imported module id to the files
/// (relative to `public_path`) that must load before it can be required.
#[must_use]
pub fn runtime_source(public_path: &str, async_files: &BTreeMap<String, Vec<String>>) -> String {
    RUNTIME_TEMPLATE
        .replace("__PUBLIC_PATH__", &json(public_path))
        .replace(
            "__ASYNC_FILES__",
            &serde_json::to_string(async_files).unwrap_or_else(|_| "{}".to_string()),
        )
}

/// A chunk rendered as a registry push.
#[derive(Debug, Clone, Default)]
pub struct RenderedChunk {
    pub code: String,
    /// Zero-based line where each module's body starts.
    pub offsets: Vec<(String, usize)>,
}

/// Render modules as one registry push.
///
/// `prelude` (the inlined runtime, when runtime chunks are off) is placed
/// before the push.
#[must_use]
pub fn render_chunk(
    name: &str,
    modules: &[(&str, &str)],
    entry_ids: &[&str],
    prelude: Option<&str>,
) -> RenderedChunk {
    let mut out = LineWriter::default();
    if let Some(prelude) = prelude {
        out.push(prelude);
    }
    out.push(&format!("(self.{CHUNK_QUEUE} = self.{CHUNK_QUEUE} || []).push([\n"));
    out.push(&json(name));
    out.push(",\n{\n");

    let mut offsets = Vec::with_capacity(modules.len());
    for (i, (id, body)) in modules.iter().enumerate() {
        out.push(&json(id));
        out.push(": function (module, exports, require) {\n");
        offsets.push(((*id).to_string(), out.lines));
        out.push(body);
        if !body.ends_with('\n') {
            out.push("\n");
        }
        out.push(if i + 1 < modules.len() { "},\n" } else { "}\n" });
    }

    out.push("},\n");
    out.push(&serde_json::to_string(entry_ids).unwrap_or_else(|_| "[]".to_string()));
    out.push("\n]);\n");

    RenderedChunk {
        code: out.code,
        offsets,
    }
}

/// String builder that tracks how many lines it holds.
#[derive(Default)]
struct LineWriter {
    code: String,
    lines: usize,
}

impl LineWriter {
    fn push(&mut self, s: &str) {
        self.lines += s.matches('\n').count();
        self.code.push_str(s);
    }
}

fn json(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
