//! `packline build` command implementation.

use super::{fail, print_json, ErrorJson, OUTPUT_SCHEMA_VERSION};
use miette::Result;
use packline_core::build::FileKind;
use packline_core::{BuildReport, Config, ResolvedConfig};
use serde::Serialize;
use std::path::Path;

/// Build result for JSON output.
#[derive(Serialize)]
struct BuildResultJson<'a> {
    schema_version: u32,
    ok: bool,
    report: &'a BuildReport,
    notes: Vec<String>,
}

/// Run the build command.
pub fn run(config: &Config, json: bool) -> Result<()> {
    let resolved = match ResolvedConfig::load(config) {
        Ok(resolved) => resolved,
        Err(e) => return fail(ErrorJson::from(&e), Vec::new(), json),
    };

    let report = match packline_core::build(&resolved) {
        Ok(report) => report,
        Err(e) => {
            let notes = vec!["the previous output directory was left untouched".to_string()];
            return fail(ErrorJson::from(&e), notes, json);
        }
    };

    if json {
        return print_json(&BuildResultJson {
            schema_version: OUTPUT_SCHEMA_VERSION,
            ok: true,
            report: &report,
            notes: Vec::new(),
        });
    }

    print_summary(&report, &resolved.root);
    Ok(())
}

fn print_summary(report: &BuildReport, root: &Path) {
    let out = report
        .output_dir
        .strip_prefix(root)
        .unwrap_or(&report.output_dir);

    println!();
    println!(
        "  Compiled {} modules into {} chunks ({}) in {}ms",
        report.modules,
        report.chunks.len(),
        report.mode,
        report.duration_ms
    );
    println!();

    let listed: Vec<_> = report
        .files
        .iter()
        .filter(|f| matches!(f.kind, FileKind::Script | FileKind::Stylesheet | FileKind::Asset))
        .collect();
    let width = listed.iter().map(|f| f.path.len()).max().unwrap_or(0);
    for file in listed {
        println!(
            "  {}/{:<width$}  {}",
            out.display(),
            file.path,
            format_size(file.size),
            width = width
        );
    }
    println!();
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        #[allow(clippy::cast_precision_loss)]
        let kb = bytes as f64 / 1024.0;
        format!("{kb:.2} kB")
    }
}
