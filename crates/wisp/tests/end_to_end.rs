//! Drives the built `wisp` binary end-to-end: file mode, exit codes, and the
//! scenario table from spec.md's end-to-end scenarios.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file
}

#[test]
fn arithmetic_prints_result() {
    let file = script("print 1 + 2;");
    Command::cargo_bin("wisp")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[test]
fn interned_strings_compare_equal() {
    let file = script(r#"var a = "hi"; var b = "hi"; print a == b;"#);
    Command::cargo_bin("wisp")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));
}

#[test]
fn closures_capture_shared_upvalues() {
    let file = script(
        "fun make() { var x = 0; fun inc() { x = x + 1; return x; } return inc; } \
         var f = make(); print f(); print f();",
    );
    Command::cargo_bin("wisp")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1\n2\n"));
}

#[test]
fn inherited_methods_are_visible_on_subclass() {
    let file = script(r#"class A { greet() { print "hi"; } } class B < A {} B().greet();"#);
    Command::cargo_bin("wisp")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("hi"));
}

#[test]
fn init_sets_instance_fields() {
    let file = script("class P { init(n) { this.n = n; } } print P(7).n;");
    Command::cargo_bin("wisp")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn while_loop_prints_each_iteration() {
    let file = script("var i = 0; while (i < 3) { print i; i = i + 1; }");
    Command::cargo_bin("wisp")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0\n1\n2\n"));
}

#[test]
fn compile_error_exits_65() {
    let file = script("var = 1;");
    Command::cargo_bin("wisp").unwrap().arg(file.path()).assert().code(65);
}

#[test]
fn runtime_error_exits_70() {
    let file = script("1 + \"a\";");
    Command::cargo_bin("wisp").unwrap().arg(file.path()).assert().code(70);
}

#[test]
fn missing_file_reports_internal_error() {
    Command::cargo_bin("wisp")
        .unwrap()
        .arg("/nonexistent/path/to/script.wisp")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn stress_gc_flag_does_not_change_observable_output() {
    let file = script("print 1 + 2;");
    Command::cargo_bin("wisp")
        .unwrap()
        .arg("--stress-gc")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[test]
fn disassemble_flag_prints_chunk_header_before_output() {
    let file = script("print 1;");
    Command::cargo_bin("wisp")
        .unwrap()
        .arg("--disassemble")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("=="));
}
