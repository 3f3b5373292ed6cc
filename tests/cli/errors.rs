//! Error reporting and exit codes.

use predicates::prelude::*;

use crate::support::*;

#[test]
fn test_missing_config() {
    let t = Test::new();

    t.cmd()
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fleet config not found"))
        .stderr(predicate::str::contains("pass --config PATH"));
}

#[test]
fn test_config_from_env() {
    let t = Test::new();
    let path = t.dir.path().join("elsewhere.toml");
    std::fs::write(&path, SINGLE_MACHINE).unwrap();

    t.cmd()
        .env("FLEETVARS_CONFIG", &path)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("my_secret"));
}

#[test]
fn test_dependency_cycle_names_path() {
    let t = Test::with_operator(
        r#"
[fleet]
version = "0.1"

[machines.m1.generators.a]
script = "true"
dependencies = ["b"]
[machines.m1.generators.b]
script = "true"
dependencies = ["a"]
"#,
    );

    let output = t.generate(&[]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "dependency cycle: a -> b -> a");
}

#[test]
fn test_unknown_machine_suggests() {
    let t = Test::with_config(SINGLE_MACHINE);

    t.cmd()
        .args(["generate", "--no-input", "m2"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("did you mean: m1?"));
}

#[test]
fn test_secret_store_cannot_be_plaintext() {
    let t = Test::with_config(&SINGLE_MACHINE.replace(
        "version = \"0.1\"",
        "version = \"0.1\"\nsecret_store = \"in-repo\"",
    ));

    t.cmd().arg("list").assert().code(2);
}

#[test]
fn test_decrypt_without_key_is_denied() {
    let t = Test::with_operator(WITH_PROMPT);
    assert_success(&t.generate(&["--prompt", "db.password=hunter2"]));

    // Replace the operator key: the stored answer can no longer be read.
    std::fs::remove_file(t.key_file()).unwrap();
    t.keygen_default();

    let output = t.generate(&["--regenerate"]);
    assert_exit_code(&output, 1);
    assert_stderr_contains(&output, "access denied");
    assert_stderr_contains(&output, "ask an authorized user to grant you access");
}

#[test]
fn test_completions() {
    let t = Test::new();

    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetvars"));
}
