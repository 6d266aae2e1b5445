//! Integration tests for `packline build --json` output.
//!
//! These tests verify:
//! - JSON output is always valid JSON with `schema_version` and `ok`
//! - a successful build reports its files and writes them to the output root
//! - failures exit non-zero with a SCREAMING_SNAKE_CASE error code

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "packline-cli", "--bin", "packline", "--"]);
    cmd.env_remove("NODE_ENV").env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn app(root: &Path) {
    write(
        root,
        "src/index.tsx",
        "import { pad } from 'left-pad';\nimport './index.css';\nconst n: number = 1;\nconsole.log(pad(String(n)));\n",
    );
    write(root, "src/index.css", "body { margin: 0; }\n");
    write(
        root,
        "node_modules/left-pad/index.js",
        "exports.pad = function (s) { return ' ' + s; };\n",
    );
}

fn build_json(dir: &Path, mode: &str) -> (std::process::Output, serde_json::Value) {
    let output = cargo_bin()
        .args(["build", "--json", "--mode", mode, "--cwd"])
        .arg(dir)
        .output()
        .expect("Failed to run build command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("Output should be valid JSON");
    (output, json)
}

#[test]
fn test_build_json_development_writes_output() {
    let dir = tempdir().unwrap();
    app(dir.path());

    let (output, json) = build_json(dir.path(), "development");

    assert!(output.status.success());
    assert_eq!(json["ok"], true);
    assert_eq!(json["schema_version"], 1);
    assert!(json["notes"].is_array());
    assert_eq!(json["report"]["mode"], "development");
    assert_eq!(json["report"]["modules"], 3);

    let files: Vec<&str> = json["report"]["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert!(files.contains(&"static/js/main.js"));
    assert!(files.contains(&"index.html"));
    assert!(files.contains(&"manifest.json"));

    let build = dir.path().join("build");
    assert!(build.join("static/js/main.js").is_file());
    let html = fs::read_to_string(build.join("index.html")).unwrap();
    assert!(html.contains("<script defer src=\"/static/js/main.js\"></script>"));
}

#[test]
fn test_build_json_production_hashes_filenames() {
    let dir = tempdir().unwrap();
    app(dir.path());

    let (output, json) = build_json(dir.path(), "production");

    assert!(output.status.success());
    assert_eq!(json["report"]["mode"], "production");
    for file in json["report"]["files"].as_array().unwrap() {
        if file["kind"] == "script" {
            let path = file["path"].as_str().unwrap();
            let stem = path.trim_end_matches(".js").trim_end_matches(".chunk");
            let hash = stem.rsplit('.').next().unwrap();
            assert!(
                hash.len() >= 8 && hash.chars().all(|c| c.is_ascii_hexdigit()),
                "expected a hash in {path}"
            );
        }
    }
}

#[test]
fn test_build_json_unresolvable_import_fails() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/index.tsx", "import missing from './missing';\n");

    let (output, json) = build_json(dir.path(), "development");

    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "BUILD_RESOLVE_FAILED");
    assert!(json["error"]["message"].as_str().unwrap().contains("./missing"));
    assert!(!dir.path().join("build").exists());
}

#[test]
fn test_build_json_config_error_code_is_screaming_snake_case() {
    let dir = tempdir().unwrap();
    app(dir.path());
    write(
        dir.path(),
        "packline.config.json",
        r#"{ "module": { "rules": [{ "test": "\\.less$", "use": "less-loader" }] } }"#,
    );

    let (output, json) = build_json(dir.path(), "development");

    assert!(!output.status.success());
    let code = json["error"]["code"].as_str().unwrap();
    assert_eq!(code, "CONFIG_UNKNOWN_LOADER");
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
}
