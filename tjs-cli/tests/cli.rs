use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn tjs_cli_binary() -> &'static str {
    env!("CARGO_BIN_EXE_tjs-cli")
}

fn run(args: &[&str], dir: &Path) -> Output {
    Command::new(tjs_cli_binary())
        .args(args)
        .arg(dir)
        .output()
        .expect("run tjs")
}

#[test]
fn check_succeeds_on_a_clean_workspace() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("lib.js"), "export let add = (a, b) => a + b\n").expect("write lib");
    fs::write(
        tmp.path().join("main.js"),
        "import { add } from './lib.js'\nlet three = add(1, 2)\n",
    )
    .expect("write main");

    let output = run(&["check"], tmp.path());
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("checked 2 module(s)"), "stdout: {stdout}");
}

#[test]
fn undefined_names_are_reported_with_span_and_suggestion() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("main.js"), "let count = 1\nlet next = cuont + 1\n")
        .expect("write main");

    let output = run(&["check"], tmp.path());
    assert!(!output.status.success(), "expected non-zero exit");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error: `cuont` is not defined"),
        "expected message, got: {stderr}"
    );
    assert!(stderr.contains("--> main.js:2:12"), "expected span, got: {stderr}");
    assert!(
        stderr.contains("let next = cuont + 1"),
        "expected source line, got: {stderr}"
    );
    assert!(stderr.contains("^^^^^"), "expected caret line, got: {stderr}");
    assert!(
        stderr.contains("did you mean `count`?"),
        "expected suggestion, got: {stderr}"
    );
}

#[test]
fn missing_modules_fail_by_default() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("main.js"), "import { x } from './gone.js'\n").expect("write main");

    let output = run(&["check"], tmp.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cannot find module './gone.js'"),
        "expected missing module message, got: {stderr}"
    );

    let output = run(&["check", "--allow-missing-imports"], tmp.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("`x`"),
        "expected missing export message, got: {stderr}"
    );
}

#[test]
fn json_output_carries_the_structured_error() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("main.js"), "let add = (a, b) => a + b\nlet x = add(1)\n")
        .expect("write main");

    let output = run(&["check", "--format", "json"], tmp.path());
    assert!(!output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be json");
    assert_eq!(value["phase"], "type_check");
    assert_eq!(value["error"]["kind"], "type");
    assert_eq!(value["error"]["detail"]["type"], "arity_mismatch");
    assert_eq!(
        value["message"],
        "`add` expects 2 arguments, but 1 was given"
    );
}

#[test]
fn types_prints_declarations_and_exports() {
    let tmp = tempdir().expect("tempdir");
    fs::write(
        tmp.path().join("main.js"),
        "let id = x => x\nexport let n = id(1)\nexport default id\n",
    )
    .expect("write main");

    let output = run(&["types"], tmp.path());
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("main.js"), "stdout: {stdout}");
    assert!(stdout.contains("  let id: forall 'a. ('a) -> 'a"), "stdout: {stdout}");
    assert!(stdout.contains("  let n: number"), "stdout: {stdout}");
    assert!(stdout.contains("  export n: number"), "stdout: {stdout}");
    assert!(
        stdout.contains("  export default: forall 'a. ('a) -> 'a"),
        "stdout: {stdout}"
    );
}

#[test]
fn cycles_report_the_chain() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("a.js"), "import { b } from './b.js'\nexport let a = 1\n")
        .expect("write a");
    fs::write(tmp.path().join("b.js"), "import { a } from './a.js'\nexport let b = 1\n")
        .expect("write b");

    let output = run(&["check"], tmp.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("import cycle: a.js -> b.js -> a.js"),
        "expected cycle chain, got: {stderr}"
    );
}
