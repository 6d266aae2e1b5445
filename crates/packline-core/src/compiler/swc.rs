//! SWC compiler backend.
//!
//! With the `swc` feature, files are parsed, stripped of types, run through
//! the React JSX transform and re-emitted by SWC. Without it, a regex-based
//! stand-in strips simple type annotations and rewrites trivial JSX so the
//! rest of the pipeline can be exercised in tests.

#![allow(clippy::default_trait_access)]
#![allow(clippy::match_same_arms)]

use super::spec::{JsxRuntime, ParserSyntax, SourceMapKind};
use super::{CompilerBackend, CompilerError, TranspileOutput, TranspileSpec};

#[cfg(feature = "swc")]
use super::spec::EsTarget;

/// SWC-based compiler backend.
///
/// `SwcBackend` is `Send + Sync`; each call to `transpile` is independent.
#[derive(Debug, Clone, Default)]
pub struct SwcBackend {
    _private: (),
}

impl SwcBackend {
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl CompilerBackend for SwcBackend {
    fn name(&self) -> &'static str {
        "swc"
    }

    fn transpile(
        &self,
        spec: &TranspileSpec,
        source: &str,
    ) -> Result<TranspileOutput, CompilerError> {
        if source.is_empty() {
            return Ok(TranspileOutput::new(""));
        }

        #[cfg(not(feature = "swc"))]
        {
            let mut code = source.to_string();

            if spec.syntax == ParserSyntax::Typescript {
                code = strip_simple_types(&code);
            }

            if spec.jsx {
                code = transform_simple_jsx(&code, spec);
            }

            let mut output = TranspileOutput::new(code);
            if matches!(spec.sourcemaps, SourceMapKind::External) {
                output = output.with_source_map(placeholder_sourcemap(&spec.input_path));
            }
            Ok(output)
        }

        #[cfg(feature = "swc")]
        {
            compile_with_swc(spec, source)
        }
    }
}

/// Strip simple TypeScript annotations.
///
/// Handles interfaces, type aliases, `import type`, annotated parameters and
/// variables, return types, generic parameter lists and `as` casts.
#[cfg(not(feature = "swc"))]
fn strip_simple_types(source: &str) -> String {
    const REWRITES: &[(&str, &str)] = &[
        (r"(?m)^import\s+type\s+[^;]+;\s*", ""),
        (r"(?m)^(export\s+)?interface\s+\w+\s*\{[^}]*\}\s*", ""),
        (r"(?m)^(export\s+)?type\s+\w+\s*=\s*[^;]+;\s*", ""),
        (r"\)\s*:\s*\w+(\s*\[\s*\])?\s*\{", ") {"),
        (r"\)\s*:\s*\w+(\s*\[\s*\])?\s*=>", ") =>"),
        (r"(\w+)\??\s*:\s*\w+(\s*\[\s*\])?\s*,", "$1,"),
        (r"(\w+)\??\s*:\s*\w+(\s*\[\s*\])?\s*\)", "$1)"),
        (r"(const|let|var)\s+(\w+)\s*:\s*\w+(\s*\[\s*\])?\s*=", "$1 $2 ="),
        (r"<[A-Z]\w*(\s*,\s*[A-Z]\w*)*>\(", "("),
        (r"\s+as\s+\w+", ""),
    ];

    let mut result = source.to_string();
    for (pattern, replacement) in REWRITES {
        if let Ok(re) = regex_lite::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}

/// Rewrite trivial JSX (`<tag>text</tag>`, `<tag />`).
#[cfg(not(feature = "swc"))]
fn transform_simple_jsx(source: &str, spec: &TranspileSpec) -> String {
    let Ok(element) = regex_lite::Regex::new(r"<(\w+)>([^<]*)</(\w+)>") else {
        return source.to_string();
    };
    let Ok(self_closing) = regex_lite::Regex::new(r"<(\w+)\s*/>") else {
        return source.to_string();
    };

    if !element.is_match(source) && !self_closing.is_match(source) {
        return source.to_string();
    }

    let tag_expr = |tag: &str| {
        if tag.starts_with(|c: char| c.is_ascii_uppercase()) {
            tag.to_string()
        } else {
            format!("\"{tag}\"")
        }
    };

    let mut result = match spec.jsx_runtime {
        JsxRuntime::Automatic => {
            let replaced = element.replace_all(source, |caps: &regex_lite::Captures| {
                format!("_jsx({}, {{ children: \"{}\" }})", tag_expr(&caps[1]), &caps[2])
            });
            self_closing
                .replace_all(&replaced, |caps: &regex_lite::Captures| {
                    format!("_jsx({}, {{}})", tag_expr(&caps[1]))
                })
                .to_string()
        }
        JsxRuntime::Classic => {
            let pragma = spec.jsx_pragma.as_str();
            let replaced = element.replace_all(source, |caps: &regex_lite::Captures| {
                format!("{pragma}({}, null, \"{}\")", tag_expr(&caps[1]), &caps[2])
            });
            self_closing
                .replace_all(&replaced, |caps: &regex_lite::Captures| {
                    format!("{pragma}({}, null)", tag_expr(&caps[1]))
                })
                .to_string()
        }
    };

    if spec.jsx_runtime == JsxRuntime::Automatic {
        result = format!(
            "import {{ jsx as _jsx }} from \"{}/jsx-runtime\";\n{result}",
            spec.jsx_import_source
        );
    }
    result
}

#[cfg(not(feature = "swc"))]
fn placeholder_sourcemap(input_path: &std::path::Path) -> String {
    let filename = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    serde_json::json!({
        "version": 3,
        "sources": [filename],
        "names": [],
        "mappings": "AAAA",
    })
    .to_string()
}

// ============================================================
// Full SWC Implementation (requires `swc` feature)
// ============================================================

#[cfg(feature = "swc")]
fn compile_with_swc(spec: &TranspileSpec, source: &str) -> Result<TranspileOutput, CompilerError> {
    use swc_common::{
        comments::SingleThreadedComments, errors::Handler, sync::Lrc, FileName, Globals, Mark,
        SourceMap, GLOBALS,
    };
    use swc_ecma_ast::{EsVersion, Program};
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
    use swc_ecma_transforms_base::{fixer::fixer, hygiene::hygiene, resolver};
    use swc_ecma_transforms_react::{react, Options as ReactOptions, Runtime};
    use swc_ecma_transforms_typescript::strip;
    use swc_ecma_visit::FoldWith;

    let is_ts = spec.syntax == ParserSyntax::Typescript;

    let cm: Lrc<SourceMap> = Default::default();
    // Errors are surfaced through the Result, not the handler
    let handler = Handler::with_emitter_writer(Box::new(std::io::sink()), Some(cm.clone()));

    let filename = spec
        .input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.js");
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let syntax = if is_ts {
        Syntax::Typescript(TsSyntax {
            tsx: spec.is_tsx(),
            decorators: spec.decorators,
            ..Default::default()
        })
    } else {
        Syntax::Es(EsSyntax {
            jsx: spec.jsx,
            decorators: spec.decorators,
            ..Default::default()
        })
    };

    let target = match spec.target {
        EsTarget::ES5 => EsVersion::Es5,
        EsTarget::ES2015 => EsVersion::Es2015,
        EsTarget::ES2016 => EsVersion::Es2016,
        EsTarget::ES2017 => EsVersion::Es2017,
        EsTarget::ES2018 => EsVersion::Es2018,
        EsTarget::ES2019 => EsVersion::Es2019,
        EsTarget::ES2020 => EsVersion::Es2020,
        EsTarget::ES2021 => EsVersion::Es2021,
        EsTarget::ES2022 => EsVersion::Es2022,
        EsTarget::ESNext => EsVersion::EsNext,
    };

    let comments = SingleThreadedComments::default();

    // The parser always accepts the latest syntax; `target` only shapes codegen
    let lexer = Lexer::new(
        syntax,
        EsVersion::EsNext,
        StringInput::from(&*fm),
        Some(&comments),
    );

    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let kind = format!("{:?}", e.kind());
        e.into_diagnostic(&handler).emit();
        CompilerError::parse_error(format!("Failed to parse {filename}: {kind}"))
    })?;

    let errors: Vec<String> = parser
        .take_errors()
        .into_iter()
        .map(|e| format!("{:?}", e.kind()))
        .collect();
    if !errors.is_empty() {
        return Err(CompilerError::parse_error(format!(
            "Failed to parse {filename}: {}",
            errors.join(", ")
        )));
    }

    let output = GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        let mut program = Program::Module(module);

        program = program.fold_with(&mut resolver(unresolved_mark, top_level_mark, is_ts));

        if is_ts {
            program = program.fold_with(&mut strip(unresolved_mark, top_level_mark));
        }

        let mut module = match program {
            Program::Module(m) => m,
            Program::Script(s) => swc_ecma_ast::Module {
                span: s.span,
                body: s
                    .body
                    .into_iter()
                    .map(swc_ecma_ast::ModuleItem::Stmt)
                    .collect(),
                shebang: s.shebang,
            },
        };

        if spec.jsx {
            let runtime = match spec.jsx_runtime {
                JsxRuntime::Automatic => Runtime::Automatic,
                JsxRuntime::Classic => Runtime::Classic,
            };

            // SWC's built-in pragma defaults are React.createElement/React.Fragment
            let react_options = ReactOptions {
                runtime: Some(runtime),
                import_source: Some(spec.jsx_import_source.clone()),
                ..Default::default()
            };

            module = module.fold_with(&mut react(
                cm.clone(),
                Some(&comments),
                react_options,
                top_level_mark,
                unresolved_mark,
            ));
        }

        module = module.fold_with(&mut hygiene());
        module = module.fold_with(&mut fixer(Some(&comments)));

        module
    });

    let mut buf = Vec::new();
    let mut src_map_buf = Vec::new();

    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, Some(&mut src_map_buf));

        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default()
                .with_minify(spec.minify)
                .with_target(target),
            cm: cm.clone(),
            comments: if spec.minify { None } else { Some(&comments) },
            wr: writer,
        };

        emitter
            .emit_module(&output)
            .map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    let code = String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))?;

    let source_map = match spec.sourcemaps {
        SourceMapKind::None => None,
        SourceMapKind::External => {
            let srcmap = cm.build_source_map(&src_map_buf);
            let mut map_buf = Vec::new();
            srcmap.to_writer(&mut map_buf).map_err(|e| {
                CompilerError::transform_error(format!("Failed to write source map: {e}"))
            })?;
            Some(String::from_utf8(map_buf).unwrap_or_default())
        }
    };

    let mut output = TranspileOutput::new(code);
    if let Some(map) = source_map {
        output = output.with_source_map(map);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transpile(path: &str, source: &str) -> String {
        SwcBackend::new()
            .transpile(&TranspileSpec::new(path), source)
            .unwrap()
            .code
    }

    #[test]
    fn test_swc_backend_name() {
        assert_eq!(SwcBackend::new().name(), "swc");
    }

    #[test]
    fn test_transpile_empty_source() {
        assert_eq!(transpile("src/app.ts", ""), "");
    }

    #[test]
    fn test_transpile_simple_js() {
        assert!(transpile("src/app.js", "const x = 1;").contains("const x = 1;"));
    }

    #[test]
    fn test_ts_and_js_equivalent_modulo_types() {
        let ts = transpile(
            "src/math.ts",
            "export const add = (a: number, b: number) => a + b;\n",
        );
        let js = transpile("src/math.js", "export const add = (a, b) => a + b;\n");
        assert_eq!(ts, js);
        assert!(!ts.contains("number"));
    }

    #[test]
    fn test_interfaces_removed() {
        let out = transpile(
            "src/types.ts",
            "interface Props {\n  title: string;\n}\nexport const title = 'x';\n",
        );
        assert!(!out.contains("interface"));
        assert!(out.contains("title"));
    }

    #[test]
    fn test_unminified_output_keeps_identifiers() {
        let spec = TranspileSpec::new("src/counter.js").with_minify(false);
        let source = "export function incrementCounter(currentValue) {\n  const nextValue = currentValue + 1;\n  return nextValue;\n}\n";
        let out = SwcBackend::new().transpile(&spec, source).unwrap().code;
        assert!(out.contains("incrementCounter"));
        assert!(out.contains("currentValue"));
        assert!(out.contains("nextValue"));
        assert!(out.contains('\n'));
    }

    #[test]
    fn test_jsx_automatic_runtime_imports_jsx_runtime() {
        let spec = TranspileSpec::new("src/App.jsx").with_jsx_runtime(JsxRuntime::Automatic);
        let out = SwcBackend::new()
            .transpile(&spec, "export const el = <div>hello</div>;\n")
            .unwrap()
            .code;
        assert!(out.contains("react/jsx-runtime"), "got: {out}");
        assert!(!out.contains("<div>"));
    }

    #[test]
    fn test_external_sourcemap_emitted() {
        let spec = TranspileSpec::new("src/app.ts").with_sourcemaps(SourceMapKind::External);
        let out = SwcBackend::new().transpile(&spec, "const x = 1;\n").unwrap();
        let map: serde_json::Value =
            serde_json::from_str(out.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
    }
}
