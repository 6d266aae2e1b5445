pub mod build;
pub mod dev;
pub mod inspect;
pub mod route;
pub mod version;

use packline_core::{BuildError, Error};
use miette::IntoDiagnostic;
use serde::Serialize;

/// Version of the JSON objects the commands print.
pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct ErrorJson {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&Error> for ErrorJson {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<&BuildError> for ErrorJson {
    fn from(err: &BuildError) -> Self {
        Self {
            code: err.code.to_string(),
            message: err.message.clone(),
            path: err.path.as_ref().map(|p| p.display().to_string()),
        }
    }
}

/// `{ "schema_version", "ok": false, "error", "notes" }`, printed on failure.
#[derive(Debug, Serialize)]
pub struct ErrorResult {
    pub schema_version: u32,
    pub ok: bool,
    pub error: ErrorJson,
    pub notes: Vec<String>,
}

/// Print `value` as one line of JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let line = serde_json::to_string(value).into_diagnostic()?;
    println!("{line}");
    Ok(())
}

/// Report `error` and exit non-zero.
///
/// In JSON mode the error object goes to stdout; otherwise a diagnostic is
/// returned for miette to render.
pub fn fail(error: ErrorJson, notes: Vec<String>, json: bool) -> miette::Result<()> {
    if json {
        print_json(&ErrorResult {
            schema_version: OUTPUT_SCHEMA_VERSION,
            ok: false,
            error,
            notes,
        })?;
        std::process::exit(1);
    }
    let mut report = format!("{}: {}", error.code, error.message);
    if let Some(path) = &error.path {
        report.push_str(&format!("\n  at {path}"));
    }
    for note in notes {
        report.push_str(&format!("\n  {note}"));
    }
    Err(miette::miette!("{report}"))
}
