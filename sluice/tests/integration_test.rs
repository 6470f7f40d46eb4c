use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn sluice(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sluice"))
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("Failed to execute sluice")
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const CONFIG: &str = r#"
[tasks]
default = ["build"]
build = ["styles"]

[tasks."clean:dist"]
clean = ["dist"]

[tasks.styles]
description = "Bundle stylesheets"
depends_on = ["clean:dist"]
pipeline = { src = ["css/*.css"], dest = "dist", steps = ["minify-css"], concat = "site.css" }
"#;

#[test]
fn test_default_task_runs_prerequisites() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "sluice.toml", CONFIG);
    write(temp.path(), "css/a.css", "a { color: red; }\n");
    write(temp.path(), "css/b.css", "b { margin: 0px; }\n");
    write(temp.path(), "dist/stale.txt", "old");

    let output = sluice(temp.path(), &[]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(!temp.path().join("dist/stale.txt").exists());
    let css = fs::read_to_string(temp.path().join("dist/site.css")).unwrap();
    assert!(css.contains("a{color:red}"));
    assert!(css.contains("b{margin:0}"));
}

#[test]
fn test_task_name_as_subcommand() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "sluice.toml", CONFIG);
    write(temp.path(), "dist/stale.txt", "old");

    let output = sluice(temp.path(), &["clean:dist"]);
    assert!(output.status.success());
    assert!(!temp.path().join("dist").exists());
}

#[test]
fn test_unknown_task_fails() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "sluice.toml", CONFIG);

    let output = sluice(temp.path(), &["run", "deploy"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown task: deploy"));
}

#[test]
fn test_list_json() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "sluice.toml", CONFIG);

    let output = sluice(temp.path(), &["list", "--json"]);
    assert!(output.status.success());
    let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["default", "build", "clean:dist", "styles"]);
    assert_eq!(tasks[3]["kind"], "pipeline");
}

#[test]
fn test_check_reports_cycles() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "sluice.toml", "[tasks]\na = [\"b\"]\nb = [\"a\"]\n");

    let output = sluice(temp.path(), &["check"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Circular dependency"));
}

#[test]
fn test_init_writes_starter_config_once() {
    let temp = TempDir::new().unwrap();

    let output = sluice(temp.path(), &["init"]);
    assert!(output.status.success());
    assert!(temp.path().join("sluice.toml").exists());

    let check = sluice(temp.path(), &["check"]);
    assert!(check.status.success());

    let again = sluice(temp.path(), &["init"]);
    assert!(!again.status.success());
    assert!(sluice(temp.path(), &["init", "--force"]).status.success());
}

#[test]
fn test_missing_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let output = sluice(temp.path(), &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sluice init"));
}
