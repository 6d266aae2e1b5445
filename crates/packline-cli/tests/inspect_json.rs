//! Integration tests for `packline inspect` and `packline route`.

use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "packline-cli", "--bin", "packline", "--"]);
    cmd.env_remove("NODE_ENV").env_remove("RUST_LOG");
    cmd
}

fn run_json(args: &[&str], cwd: &std::path::Path) -> serde_json::Value {
    let output = cargo_bin()
        .args(args)
        .args(["--json", "--cwd"])
        .arg(cwd)
        .output()
        .expect("Failed to run command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("Output should be valid JSON")
}

fn project() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/index.tsx"), "export {};\n").unwrap();
    dir
}

#[test]
fn test_inspect_defaults() {
    let dir = project();
    let json = run_json(&["inspect"], dir.path());

    assert_eq!(json["ok"], true);
    let config = &json["config"];
    assert_eq!(config["mode"], "production");
    assert_eq!(config["publicPath"], "/");
    assert_eq!(config["devServer"]["port"], 26386);
    assert_eq!(config["devServer"]["fallback"], "index.html");
    assert!(config["entries"].is_array());
}

#[test]
fn test_inspect_development_mode_from_flag() {
    let dir = project();
    let json = run_json(&["inspect", "--mode", "development"], dir.path());
    assert_eq!(json["config"]["mode"], "development");
}

#[test]
fn test_route_typescript_file() {
    let dir = project();
    let json = run_json(&["route", "src/App.tsx"], dir.path());

    assert_eq!(json["ok"], true);
    assert_eq!(json["path"], "./src/App.tsx");
    assert_eq!(json["matched"], true);
    assert_eq!(json["rule"], "typescript");
    assert_eq!(json["pipeline"][0], "builtin:swc-loader");
    assert_eq!(json["type"], "javascript/auto");
}

#[test]
fn test_route_excluded_dependency_skips_transpilation() {
    let dir = project();
    let json = run_json(&["route", "node_modules/lodash/index.js"], dir.path());

    assert_eq!(json["matched"], true);
    assert_eq!(json["rule"], "module-resolution");
    assert_eq!(json["pipeline"].as_array().unwrap().len(), 0);
}

#[test]
fn test_route_unmatched_file() {
    let dir = project();
    let json = run_json(&["route", "README.md"], dir.path());

    assert_eq!(json["matched"], false);
    assert_eq!(json["unmatched"], "passthrough");
    assert!(json.get("rule").is_none());
}

#[test]
fn test_route_allow_listed_dependency() {
    let dir = project();
    let json = run_json(&["route", "node_modules/@pdd/monitor/index.js"], dir.path());

    assert_eq!(json["matched"], true);
    assert_eq!(json["rule"], "javascript");
}

#[test]
fn test_node_env_selects_mode() {
    let dir = project();
    let output = cargo_bin()
        .env("NODE_ENV", "development")
        .args(["inspect", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run inspect command");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["config"]["mode"], "development");
}
