//! Integration tests for the tern CLI

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;
use tern::ast::Module;
use tern::builder::*;

/// Helper to get the path to the compiled binary
fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tern"))
}

/// Helper to write a program into the temp dir as JSON or YAML
fn write_program(dir: &TempDir, file_name: &str, program: &Module) -> PathBuf {
    let path = dir.path().join(file_name);
    let content = if file_name.ends_with(".json") {
        serde_json::to_string_pretty(program).unwrap()
    } else {
        serde_yaml::to_string(program).unwrap()
    };
    fs::write(&path, content).expect("Failed to write program file");
    path
}

fn tern(args: &[&str], path: &Path) -> Output {
    Command::new(get_binary_path())
        .args(args)
        .arg(path)
        .env("NO_COLOR", "1")
        .env_remove("TERN_ENTRY")
        .env_remove("TERN_MAX_DEPTH")
        .env_remove("TERN_GC_THRESHOLD")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute tern")
}

fn hello_program() -> Module {
    module(vec![
        print(vec![text("loading")]),
        def(
            "main",
            &[],
            vec![print(vec![text("hello"), int(42)]), return_(int(3))],
        ),
        def("start", &[], vec![print(vec![text("started")])]),
    ])
}

#[test]
fn test_run_exits_with_entry_status() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "hello.json", &hello_program());

    let output = tern(&["run"], &path);

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "loading\nhello 42\n");
}

#[test]
fn test_run_yaml_program() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "hello.yaml", &hello_program());

    let output = tern(&["run"], &path);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stdout).contains("hello 42"));
}

#[test]
fn test_run_custom_entry() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "hello.json", &hello_program());

    let output = tern(&["run", "--entry", "start"], &path);

    assert!(output.status.success(), "start returns None");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "loading\nstarted\n");
}

#[test]
fn test_run_without_entry() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "hello.json", &hello_program());

    let output = tern(&["run", "--no-entry"], &path);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "loading\n");
}

#[test]
fn test_run_missing_entry_reports_error() {
    let dir = TempDir::new().unwrap();
    let program = module(vec![print(vec![text("top")])]);
    let path = write_program(&dir, "no_main.json", &program);

    let output = tern(&["run"], &path);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "top\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("NameError: name 'main' is not defined"),
        "stderr was: {}",
        stderr
    );
}

#[test]
fn test_run_runtime_error_names_function() {
    let dir = TempDir::new().unwrap();
    let program = module(vec![
        def("divide", &["a"], vec![return_(div(name("a"), int(0)))]),
        def("main", &[], vec![return_(call(name("divide"), vec![int(1)]))]),
    ]);
    let path = write_program(&dir, "divide.json", &program);

    let output = tern(&["run"], &path);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ZeroDivisionError"), "stderr was: {}", stderr);
    assert!(stderr.contains("divide"), "stderr was: {}", stderr);
}

#[test]
fn test_run_config_file_limits_depth() {
    let dir = TempDir::new().unwrap();
    let program = module(vec![
        def(
            "down",
            &["n"],
            vec![return_(call(name("down"), vec![add(name("n"), int(1))]))],
        ),
        def("main", &[], vec![return_(call(name("down"), vec![int(0)]))]),
    ]);
    let path = write_program(&dir, "deep.json", &program);
    let config = dir.path().join("tern.toml");
    fs::write(&config, "max_call_depth = 20\n").unwrap();

    let output = tern(&["run", "--config", config.to_str().unwrap()], &path);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("RecursionError"), "stderr was: {}", stderr);
}

#[test]
fn test_check_counts_statements() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "hello.json", &hello_program());

    let output = tern(&["check"], &path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 top-level statement(s)"), "stdout was: {}", stdout);
}

#[test]
fn test_check_rejects_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("program.py");
    fs::write(&path, "print('hi')\n").unwrap();

    let output = tern(&["check"], &path);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported program format"), "stderr was: {}", stderr);
}

#[test]
fn test_dump_yaml_parses_back() {
    let dir = TempDir::new().unwrap();
    let program = hello_program();
    let path = write_program(&dir, "hello.json", &program);

    let output = tern(&["dump", "--format", "yaml"], &path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let back = tern::parse_program(&stdout, tern::ProgramFormat::Yaml).unwrap();
    assert_eq!(back, program);
}
