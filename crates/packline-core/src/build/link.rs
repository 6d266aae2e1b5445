//! Rewrites module syntax into registry form.
//!
//! Every module becomes the body of `function (module, exports, require)`.
//! Static `import`/`export` statements turn into `require` calls and export
//! getters, `import("x")` turns into `require.load(id)`, and every resolved
//! specifier is replaced with the target's module id. Statements are matched
//! at line starts, which is how SWC prints them; line counts are preserved
//! so per-module source maps stay usable.

use regex_lite::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

struct Patterns {
    export_from: Regex,
    import_from: Regex,
    import_bare: Regex,
    export_default_decl: Regex,
    export_default: Regex,
    export_decl: Regex,
    export_list: Regex,
    require_call: Regex,
    dynamic_import: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).unwrap_or_else(|e| unreachable!("static pattern {p}: {e}"));
        Patterns {
            export_from: re(
                r#"(?m)^([ \t]*)export\s+(\*\s+as\s+[\w$]+|\*|\{[^}]*\})\s*from\s*["']([^"']+)["'][ \t]*;?"#,
            ),
            import_from: re(
                r#"(?m)^([ \t]*)import\s+([\w$*{}\s,]+?)\s*from\s*["']([^"']+)["'][ \t]*;?"#,
            ),
            import_bare: re(r#"(?m)^([ \t]*)import\s*["']([^"']+)["'][ \t]*;?"#),
            export_default_decl: re(
                r"(?m)^([ \t]*)export\s+default\s+((?:async\s+)?function\s*\*?\s*([\w$]+)|class\s+([\w$]+))",
            ),
            export_default: re(r"(?m)^([ \t]*)export\s+default\s+"),
            export_decl: re(
                r"(?m)^([ \t]*)export\s+((?:async\s+)?function\s*\*?\s*([\w$]+)|class\s+([\w$]+)|(?:const|let|var)\s+([\w$]+))",
            ),
            export_list: re(r"(?m)^([ \t]*)export\s*\{([^}]*)\}[ \t]*;?"),
            require_call: re(r#"\brequire\(\s*["']([^"']+)["']\s*\)"#),
            dynamic_import: re(r#"\bimport\(\s*["']([^"']+)["']\s*\)"#),
        }
    })
}

#[derive(Default)]
struct Linker {
    /// Exported name to the expression that reads it.
    exports: Vec<(String, String)>,
    esm: bool,
    temps: usize,
}

impl Linker {
    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("__packline_import_{}__", self.temps)
    }

    fn export(&mut self, name: &str, expr: String) {
        self.esm = true;
        if let Some(slot) = self.exports.iter_mut().find(|(n, _)| n == name) {
            slot.1 = expr;
        } else {
            self.exports.push((name.to_string(), expr));
        }
    }

    fn header(&self) -> String {
        if !self.esm {
            return String::new();
        }
        let mut header = String::from("Object.defineProperty(exports, \"__esModule\", { value: true }); ");
        for (name, expr) in &self.exports {
            header.push_str(&format!(
                "require.d(exports, {}, function () {{ return {expr}; }}); ",
                quote(name)
            ));
        }
        header
    }
}

/// Rewrite `code` into a registry module body.
///
/// `deps` maps each raw specifier to the resolved module id; unknown
/// specifiers are left as written.
#[must_use]
pub fn link(code: &str, deps: &BTreeMap<String, String>) -> String {
    let p = patterns();
    let mut linker = Linker::default();

    let code = p.export_from.replace_all(code, |caps: &Captures<'_>| {
        let indent = &caps[1];
        let clause = caps[2].trim();
        let tmp = linker.temp();
        linker.esm = true;
        let mut out = format!("{indent}var {tmp} = require({});", quote(&caps[3]));
        if let Some(ns) = clause.strip_prefix('*').map(str::trim).and_then(|c| c.strip_prefix("as")) {
            linker.export(ns.trim(), tmp);
        } else if clause == "*" {
            out.push_str(&format!(" require.e(exports, {tmp});"));
        } else {
            for (imported, exported) in specifier_list(clause) {
                let expr = member(&tmp, imported);
                linker.export(exported, expr);
            }
        }
        out + newlines(&caps[0]).as_str()
    });

    let code = p.import_from.replace_all(&code, |caps: &Captures<'_>| {
        let indent = &caps[1];
        let tmp = linker.temp();
        linker.esm = true;
        let mut out = format!("{indent}var {tmp} = require({});", quote(&caps[3]));
        for binding in import_bindings(caps[2].trim()) {
            match binding {
                Binding::Default(local) => {
                    out.push_str(&format!(" var {local} = require.i({tmp}).default;"));
                }
                Binding::Namespace(local) => out.push_str(&format!(" var {local} = {tmp};")),
                Binding::Named(imported, local) => {
                    out.push_str(&format!(" var {local} = {};", member(&tmp, imported)));
                }
            }
        }
        out + newlines(&caps[0]).as_str()
    });

    let code = p.import_bare.replace_all(&code, |caps: &Captures<'_>| {
        linker.esm = true;
        format!("{}require({});", &caps[1], quote(&caps[2])) + newlines(&caps[0]).as_str()
    });

    let code = p.export_default_decl.replace_all(&code, |caps: &Captures<'_>| {
        let name = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
        linker.export("default", name.to_string());
        format!("{}{}", &caps[1], &caps[2])
    });

    let code = p.export_default.replace_all(&code, |caps: &Captures<'_>| {
        linker.esm = true;
        format!("{}exports.default = ", &caps[1])
    });

    let code = p.export_decl.replace_all(&code, |caps: &Captures<'_>| {
        let name = caps
            .get(3)
            .or_else(|| caps.get(4))
            .or_else(|| caps.get(5))
            .map_or("", |m| m.as_str());
        linker.export(name, name.to_string());
        format!("{}{}", &caps[1], &caps[2])
    });

    let code = p.export_list.replace_all(&code, |caps: &Captures<'_>| {
        for (local, exported) in specifier_list(&caps[2]) {
            linker.export(exported, local.to_string());
        }
        linker.esm = true;
        caps[1].to_string() + newlines(&caps[0]).as_str()
    });

    let code = p.require_call.replace_all(&code, |caps: &Captures<'_>| {
        let target = deps.get(&caps[1]).map_or(&caps[1], String::as_str);
        format!("require({})", quote(target))
    });

    let code = p.dynamic_import.replace_all(&code, |caps: &Captures<'_>| {
        let target = deps.get(&caps[1]).map_or(&caps[1], String::as_str);
        format!("require.load({})", quote(target))
    });

    linker.header() + code.as_ref()
}

enum Binding<'a> {
    Default(&'a str),
    Namespace(&'a str),
    Named(&'a str, &'a str),
}

/// Parse an import clause: `a`, `* as ns`, `{ x, y as z }`, `a, { x }`, `a, * as ns`.
fn import_bindings(clause: &str) -> Vec<Binding<'_>> {
    let mut bindings = Vec::new();
    let mut rest = clause.trim();

    if !rest.starts_with('{') && !rest.starts_with('*') {
        let end = rest.find(',').unwrap_or(rest.len());
        bindings.push(Binding::Default(rest[..end].trim()));
        rest = rest[end..].trim_start_matches(',').trim();
    }

    if let Some(ns) = rest.strip_prefix('*') {
        let local = ns.trim().trim_start_matches("as").trim();
        bindings.push(Binding::Namespace(local));
    } else if rest.starts_with('{') {
        for (imported, local) in specifier_list(rest) {
            if imported == "default" {
                bindings.push(Binding::Default(local));
            } else {
                bindings.push(Binding::Named(imported, local));
            }
        }
    }
    bindings
}

/// Parse `{ a, b as c }` into `(a, a)`, `(b, c)`.
fn specifier_list(list: &str) -> Vec<(&str, &str)> {
    list.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.split_once(" as ") {
            Some((from, to)) => (from.trim(), to.trim()),
            None => (s, s),
        })
        .collect()
}

fn member(object: &str, name: &str) -> String {
    if name == "default" {
        format!("require.i({object}).default")
    } else {
        format!("{object}.{name}")
    }
}

fn newlines(matched: &str) -> String {
    "\n".repeat(matched.matches('\n').count())
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
