//! `packline inspect`: print the resolved configuration.

use super::{fail, ErrorJson, OUTPUT_SCHEMA_VERSION};
use miette::{IntoDiagnostic, Result};
use packline_core::{Config, ResolvedConfig};
use serde::Serialize;

#[derive(Serialize)]
struct InspectJson<'a> {
    schema_version: u32,
    ok: bool,
    config: &'a ResolvedConfig,
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let resolved = match ResolvedConfig::load(config) {
        Ok(resolved) => resolved,
        Err(e) => return fail(ErrorJson::from(&e), Vec::new(), json),
    };

    let out = InspectJson {
        schema_version: OUTPUT_SCHEMA_VERSION,
        ok: true,
        config: &resolved,
    };
    let text = if json {
        serde_json::to_string(&out)
    } else {
        serde_json::to_string_pretty(&out)
    }
    .into_diagnostic()?;
    println!("{text}");
    Ok(())
}
