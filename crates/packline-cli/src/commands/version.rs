use miette::Result;
use packline_core::version::{version_string, MANIFEST_SCHEMA_VERSION};
use packline_core::VERSION;
use serde_json::json;

pub fn run(json: bool) -> Result<()> {
    if json {
        return super::print_json(&json!({
            "schema_version": super::OUTPUT_SCHEMA_VERSION,
            "ok": true,
            "version": VERSION,
            "manifest_schema_version": MANIFEST_SCHEMA_VERSION,
        }));
    }
    println!("{}", version_string());
    Ok(())
}
