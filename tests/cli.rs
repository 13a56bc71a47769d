use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use mktemp::Temp;
use predicates::prelude::*;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn generates_main_and_runtime() {
    let dir = Temp::new_dir().unwrap();

    cargo_bin_cmd!("hybridc")
        .arg(fixture("hello.json"))
        .arg(dir.as_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("main.rs"));

    let mut names: Vec<String> = fs::read_dir(dir.as_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["go_runtime.rs", "main.rs"]);

    let main_rs = fs::read_to_string(dir.join("main.rs")).unwrap();
    assert!(main_rs.contains("mod go_runtime;"));
    assert!(main_rs.contains("pub struct main_Point {"));
    assert!(main_rs.contains("pub fn main_add(a: isize, b: isize) -> isize {"));
    assert!(main_rs.contains("main_add(1isize, 2isize)"));
    assert!(main_rs.contains("fn main() {"));

    let runtime = fs::read_to_string(dir.join("go_runtime.rs")).unwrap();
    assert!(runtime.contains("pub use prelude::*;"));
}

#[test]
fn runtime_name_is_configurable() {
    let dir = Temp::new_dir().unwrap();

    cargo_bin_cmd!("hybridc")
        .arg(fixture("hello.json"))
        .arg(dir.as_path())
        .args(["--runtime-name", "gort", "--control-flow", "linear"])
        .assert()
        .success();

    assert!(dir.join("gort.rs").is_file());
    let main_rs = fs::read_to_string(dir.join("main.rs")).unwrap();
    assert!(main_rs.contains("mod gort;\nuse gort::*;"));
}

#[test]
fn malformed_input_writes_nothing() {
    let dir = Temp::new_dir().unwrap();
    let out = dir.join("out");

    cargo_bin_cmd!("hybridc")
        .arg(fixture("malformed.json"))
        .arg(&out)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing field `main_package`"));

    assert!(!out.exists());
}

#[test]
fn warnings_are_reported_and_output_still_written() {
    let dir = Temp::new_dir().unwrap();

    cargo_bin_cmd!("hybridc")
        .arg(fixture("missing_field_type.json"))
        .arg(dir.as_path())
        .assert()
        .success()
        .stderr(predicate::str::contains("main.Opaque"));

    let main_rs = fs::read_to_string(dir.join("main.rs")).unwrap();
    assert!(main_rs.contains("pub handle: GoAny,"));
}

#[test]
fn deny_warnings_fails_without_writing() {
    let dir = Temp::new_dir().unwrap();
    let out = dir.join("out");

    cargo_bin_cmd!("hybridc")
        .arg(fixture("missing_field_type.json"))
        .arg(&out)
        .arg("--deny-warnings")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 warning(s) treated as errors"));

    assert!(!out.exists());
}

#[test]
fn dump_ir_prints_the_program() {
    let dir = Temp::new_dir().unwrap();
    let out = dir.join("out");

    cargo_bin_cmd!("hybridc")
        .arg(fixture("hello.json"))
        .arg(&out)
        .arg("--dump-ir")
        .assert()
        .success()
        .stdout(predicate::str::contains("package main \"main\" (main)"));

    assert!(!out.exists());
}

#[test]
fn missing_input_is_a_usage_error() {
    cargo_bin_cmd!("hybridc")
        .arg(fixture("absent.json"))
        .arg("out")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
