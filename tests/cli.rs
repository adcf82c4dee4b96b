use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::{tempdir, TempDir};

const DOG: &str = "
class Main {
    public static void main(String[] args) {
        System.out.println(new Dog().eat());
    }
}

class Animal {
    int legs;
    public int speak() { return 1; }
    public int eat() { return 2; }
}

class Dog extends Animal {
    public int eat() { return 3; }
}
";

fn mjavac() -> Command {
    let mut cmd = Command::cargo_bin("mjavac").expect("mjavac binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_source(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write source");
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn emits_llvm_to_stdout() {
    let dir = tempdir().expect("tempdir");
    let source = write_source(&dir, "Dog.java", DOG);

    mjavac()
        .arg(arg(&source))
        .assert()
        .success()
        .stdout(contains("define i32 @main() {"))
        .stdout(contains("@Dog.eat to i8*"))
        .stdout(contains("declare i8* @calloc(i32, i32)"));
}

#[test]
fn writes_output_file() {
    let dir = tempdir().expect("tempdir");
    let source = write_source(&dir, "Dog.java", DOG);
    let output = dir.path().join("Dog.ll");

    mjavac()
        .args([arg(&source), "-o", arg(&output)])
        .assert()
        .success()
        .stderr(contains("Wrote"));

    let ir = fs::read_to_string(&output).expect("read output");
    assert!(ir.contains("@.Dog_vtable = global [2 x i8*]"));
}

#[test]
fn check_reports_verdicts() {
    let dir = tempdir().expect("tempdir");
    let good = write_source(&dir, "Good.java", DOG);
    let bad = write_source(&dir, "Bad.java", &DOG.replace("return 3;", "return false;"));

    mjavac()
        .args([arg(&good), "-f", "check"])
        .assert()
        .success()
        .stdout("OK\n");

    mjavac()
        .args([arg(&bad), "-f", "check"])
        .assert()
        .success()
        .stdout("ERROR\n");
}

#[test]
fn semantic_errors_fail_compilation() {
    let dir = tempdir().expect("tempdir");
    let source = write_source(&dir, "Bad.java", &DOG.replace("return 1;", "return nothing;"));

    mjavac()
        .arg(arg(&source))
        .assert()
        .failure()
        .stderr(contains("Error: Semantic error"));
}

#[test]
fn hierarchy_errors_fail_compilation() {
    let dir = tempdir().expect("tempdir");
    let source = write_source(&dir, "Bad.java", &DOG.replace("extends Animal", "extends Dog"));

    mjavac()
        .arg(arg(&source))
        .assert()
        .failure()
        .stderr(contains("Hierarchy error"));
}

#[test]
fn parse_errors_are_fatal_even_for_check() {
    let dir = tempdir().expect("tempdir");
    let source = write_source(&dir, "Broken.java", "class Main {");

    mjavac()
        .args([arg(&source), "-f", "check"])
        .assert()
        .failure()
        .stderr(contains("Parse error").or(contains("Lexer error")));
}

#[test]
fn prints_source_and_hierarchy() {
    let dir = tempdir().expect("tempdir");
    let source = write_source(&dir, "Dog.java", DOG);

    mjavac()
        .args([arg(&source), "-f", "source"])
        .assert()
        .success()
        .stdout(contains("class Dog extends Animal {"));

    mjavac()
        .args([arg(&source), "-f", "hierarchy"])
        .assert()
        .success()
        .stdout(contains("Animal (size 12)"))
        .stdout(contains("  Dog extends Animal (size 12)"))
        .stdout(contains("slot    1  eat -> Dog.eat"));
}

#[test]
fn block_comments_are_accepted() {
    let dir = tempdir().expect("tempdir");
    let text = format!("/** Zoo\n * with stars */\n{}/* a*b */\n", DOG);
    let source = write_source(&dir, "Commented.java", &text);

    mjavac()
        .arg(arg(&source))
        .assert()
        .success()
        .stdout(contains("define i32 @Dog.eat(i8* %this) {"));
}

#[test]
fn missing_input_fails() {
    mjavac()
        .arg("does/not/exist.java")
        .assert()
        .failure()
        .stderr(contains("Error:"));
}
