//! Tests for `fleetvars delete`.

use crate::support::*;

#[test]
fn test_delete_removes_secret_and_grants() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));
    assert!(t.secret_unit(MY_SECRET).exists());

    let output = t.run(&["delete", MY_SECRET, "--yes"]);
    assert_success(&output);
    assert_stdout_contains(&output, "deleted");

    assert!(!t.secret_unit(MY_SECRET).exists());
    let access = std::fs::read_to_string(t.dir.path().join("vars/access.toml")).unwrap();
    assert!(!access.contains(MY_SECRET));

    // A declared var comes back with fresh default grants.
    let output = t.generate(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "generated 1 file(s)");
    assert_eq!(t.decrypt_with(MY_SECRET, &t.key_file()).unwrap(), "hello\n");
}

#[test]
fn test_delete_public_var() {
    let t = Test::with_operator(WITH_PROMPT);
    assert_success(&t.generate(&["--prompt", "db.password=hunter2"]));
    let hash = "per-machine/m1/db/hash";
    assert!(t.public_value(hash).exists());

    assert_success(&t.run(&["delete", hash, "--yes"]));
    assert!(!t.public_value(hash).exists());
    assert!(t.secret_unit("per-machine/m1/db/password").exists());
}

#[test]
fn test_delete_requires_confirmation() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));

    let output = t.run(&["delete", MY_SECRET]);
    assert_exit_code(&output, 1);
    assert_stderr_contains(&output, "pass --yes");
    assert!(t.secret_unit(MY_SECRET).exists());
}

#[test]
fn test_delete_missing_var() {
    let t = Test::with_operator(SINGLE_MACHINE);

    let output = t.run(&["delete", MY_SECRET, "--yes"]);
    assert_exit_code(&output, 1);
    assert_stderr_contains(&output, "var not found");
}
