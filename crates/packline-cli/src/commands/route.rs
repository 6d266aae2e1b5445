//! `packline route <FILE>`: which rule and loader pipeline apply to a path.

use super::{fail, print_json, ErrorJson, OUTPUT_SCHEMA_VERSION};
use miette::Result;
use packline_core::resolver::module_id;
use packline_core::rules::UnmatchedPolicy;
use packline_core::{Config, ResolvedConfig, RouteMatch};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct RouteJson<'a> {
    schema_version: u32,
    ok: bool,
    path: String,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<&'a str>,
    /// Loader names in declared order; they run last to first.
    pipeline: Vec<&'static str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    module_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unmatched: Option<UnmatchedPolicy>,
}

pub fn run(config: &Config, file: &Path, json: bool) -> Result<()> {
    let resolved = match ResolvedConfig::load(config) {
        Ok(resolved) => resolved,
        Err(e) => return fail(ErrorJson::from(&e), Vec::new(), json),
    };

    let absolute = if file.is_absolute() {
        file.to_path_buf()
    } else {
        resolved.root.join(file)
    };
    let absolute = dunce::canonicalize(&absolute).unwrap_or(absolute);
    let id = module_id(&resolved.root, &absolute);

    let route = resolved.router.route(Path::new(&id));
    let out = describe(id, route, resolved.router.unmatched());

    if json {
        return print_json(&out);
    }

    match out.rule {
        Some(rule) => println!(
            "{} -> {rule} [{}] ({})",
            out.path,
            out.pipeline.join(" <- "),
            out.module_type.unwrap_or_default()
        ),
        None => println!(
            "{} -> no rule matches (unmatched: {})",
            out.path,
            out.unmatched.map(UnmatchedPolicy::as_str).unwrap_or_default()
        ),
    }
    Ok(())
}

fn describe<'a>(path: String, route: Option<RouteMatch<'a>>, unmatched: UnmatchedPolicy) -> RouteJson<'a> {
    match route {
        Some(m) => RouteJson {
            schema_version: OUTPUT_SCHEMA_VERSION,
            ok: true,
            path,
            matched: true,
            rule: Some(m.rule),
            pipeline: m.pipeline(),
            module_type: Some(m.module_type.as_str()),
            unmatched: None,
        },
        None => RouteJson {
            schema_version: OUTPUT_SCHEMA_VERSION,
            ok: true,
            path,
            matched: false,
            rule: None,
            pipeline: Vec::new(),
            module_type: None,
            unmatched: Some(unmatched),
        },
    }
}
