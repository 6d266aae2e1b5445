//! Import specifier scanner.
//!
//! Runs over transformed module code, so type-only imports have already been
//! erased and the JSX runtime import added by the compiler is visible.

use serde::Serialize;
use std::collections::HashMap;

/// How a specifier was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import ... from "x"` or `import "x"`.
    Static,
    /// `import("x")`. Starts an async chunk.
    Dynamic,
    /// `require("x")`.
    Require,
    /// `export ... from "x"`.
    ReExport,
}

impl ImportKind {
    /// Whether the dependency is loaded synchronously with its importer.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        !matches!(self, Self::Dynamic)
    }
}

/// Import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecCore {
    /// Specifier exactly as found.
    pub raw: String,
    pub kind: ImportKind,
    /// Line number (1-indexed, best-effort).
    pub line: Option<u32>,
}

impl ImportSpecCore {
    #[must_use]
    pub fn new(raw: impl Into<String>, kind: ImportKind, line: Option<u32>) -> Self {
        Self {
            raw: raw.into(),
            kind,
            line,
        }
    }
}

/// Scan source code for import/require specifiers.
///
/// Returns discovered imports in first-appearance order, deduplicated by
/// `raw`. A specifier that is both imported dynamically and synchronously is
/// reported with its synchronous kind.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportSpecCore> {
    let mut results: Vec<ImportSpecCore> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut record = |spec: String, kind: ImportKind, line: u32| {
        if spec.is_empty() {
            return;
        }
        if let Some(&idx) = seen.get(&spec) {
            if results[idx].kind == ImportKind::Dynamic && kind.is_sync() {
                results[idx].kind = kind;
            }
            return;
        }
        seen.insert(spec.clone(), results.len());
        results.push(ImportSpecCore::new(spec, kind, Some(line)));
    };

    let mut line_num: u32 = 1;
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c == '\n' {
            line_num += 1;
            i += 1;
            continue;
        }

        if i + 1 < len && c == '/' && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if i + 1 < len && c == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    line_num += 1;
                }
                i += 1;
            }
            i += 2;
            continue;
        }

        // Keywords inside string literals are not imports
        if c == '"' || c == '\'' || c == '`' {
            i = skip_string(&chars, i, &mut line_num);
            continue;
        }

        if matches_keyword(&chars, i, "import") && !is_member_access(&chars, i) {
            let mut scan_line = line_num;
            if let Some((spec, kind, end)) = scan_import_statement(&chars, i + 6, &mut scan_line) {
                record(spec, kind, line_num);
                line_num = scan_line;
                i = end;
                continue;
            }
            i += 6;
            continue;
        }

        if matches_keyword(&chars, i, "export") {
            let mut scan_line = line_num;
            if let Some((spec, end)) = scan_export_from(&chars, i + 6, &mut scan_line) {
                record(spec, ImportKind::ReExport, line_num);
                line_num = scan_line;
                i = end;
                continue;
            }
            i += 6;
            continue;
        }

        if matches_keyword(&chars, i, "require") && !is_member_access(&chars, i) {
            if let Some((spec, end)) = scan_require_call(&chars, i + 7) {
                record(spec, ImportKind::Require, line_num);
                i = end;
                continue;
            }
            i += 7;
            continue;
        }

        i += 1;
    }

    results
}

/// Check if chars at position match a keyword (with word boundary).
fn matches_keyword(chars: &[char], pos: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    let len = kw.len();

    if pos + len > chars.len() {
        return false;
    }
    if pos > 0 && is_ident_char(chars[pos - 1]) {
        return false;
    }
    if chars[pos..pos + len] != kw[..] {
        return false;
    }
    !(pos + len < chars.len() && is_ident_char(chars[pos + len]))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// `foo.require(...)` and `import.meta` style accesses are not module loads.
fn is_member_access(chars: &[char], pos: usize) -> bool {
    pos > 0 && chars[pos - 1] == '.'
}

/// Skip a string or template literal starting at `start`, returning the index after it.
fn skip_string(chars: &[char], start: usize, line_num: &mut u32) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() && chars[i] != quote {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == '\n' {
            if quote != '`' {
                return i;
            }
            *line_num += 1;
        }
        i += 1;
    }
    i + 1
}

fn skip_whitespace(chars: &[char], mut i: usize, line_num: &mut u32) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        if chars[i] == '\n' {
            *line_num += 1;
        }
        i += 1;
    }
    i
}

/// Read a quoted specifier at `i`. Returns (specifier, index after closing quote).
fn read_quoted(chars: &[char], i: usize) -> Option<(String, usize)> {
    let quote = *chars.get(i)?;
    if quote != '"' && quote != '\'' && quote != '`' {
        return None;
    }
    let spec_start = i + 1;
    let mut j = spec_start;
    while j < chars.len() && chars[j] != quote {
        if chars[j] == '\n' {
            return None;
        }
        if chars[j] == '\\' {
            j += 2;
            continue;
        }
        j += 1;
    }
    if j >= chars.len() {
        return None;
    }
    Some((chars[spec_start..j].iter().collect(), j + 1))
}

/// Scan what follows the `import` keyword.
fn scan_import_statement(
    chars: &[char],
    start: usize,
    line_num: &mut u32,
) -> Option<(String, ImportKind, usize)> {
    let len = chars.len();
    let mut i = skip_whitespace(chars, start, line_num);

    if i < len && chars[i] == '(' {
        i = skip_whitespace(chars, i + 1, line_num);
        let (spec, end) = read_quoted(chars, i)?;
        if chars[i] == '`' && spec.contains("${") {
            return None;
        }
        return Some((spec, ImportKind::Dynamic, end));
    }

    // Direct import: import "specifier"
    if let Some((spec, end)) = read_quoted(chars, i) {
        return Some((spec, ImportKind::Static, end));
    }

    // Bindings must start with an identifier, `{` or `*`
    if i >= len || !(is_ident_char(chars[i]) || chars[i] == '{' || chars[i] == '*') {
        return None;
    }

    let limit = (start + 1000).min(len);
    while i < limit {
        if chars[i] == '\n' {
            *line_num += 1;
        }
        if chars[i] == ';' {
            return None;
        }
        if matches_keyword(chars, i, "from") {
            let j = skip_whitespace(chars, i + 4, line_num);
            let (spec, end) = read_quoted(chars, j)?;
            return Some((spec, ImportKind::Static, end));
        }
        i += 1;
    }

    None
}

/// Scan an `export ... from "x"` statement.
fn scan_export_from(chars: &[char], start: usize, line_num: &mut u32) -> Option<(String, usize)> {
    let mut i = skip_whitespace(chars, start, line_num);
    if i >= chars.len() || !(chars[i] == '{' || chars[i] == '*') {
        return None;
    }

    let limit = (start + 500).min(chars.len());
    while i < limit {
        match chars[i] {
            '\n' => *line_num += 1,
            ';' => return None,
            _ => {}
        }
        if matches_keyword(chars, i, "from") {
            let j = skip_whitespace(chars, i + 4, line_num);
            let (spec, end) = read_quoted(chars, j)?;
            return Some((spec, end));
        }
        i += 1;
    }

    None
}

/// Scan a `require("...")` call.
fn scan_require_call(chars: &[char], start: usize) -> Option<(String, usize)> {
    let len = chars.len();
    let mut i = start;

    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }
    if i >= len || chars[i] != '(' {
        return None;
    }
    i += 1;
    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }

    let (spec, mut end) = read_quoted(chars, i)?;
    while end < len && chars[end].is_whitespace() && chars[end] != '\n' {
        end += 1;
    }
    // require("a" + b) is not a static dependency
    if end < len && chars[end] != ')' {
        return None;
    }
    Some((spec, end + 1))
}
