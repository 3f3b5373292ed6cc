//! Tests for `fleetvars generate`.

use std::fs;

use crate::support::*;

#[test]
fn test_generate_encrypts_for_machine_and_operator() {
    let t = Test::with_operator(SINGLE_MACHINE);
    let machine_key = t.home.path().join("m1.txt");
    let machine_public = t.keygen(&machine_key);
    assert_success(&t.run(&["machines", "add", "m1", &machine_public]));

    let output = t.generate(&["m1"]);
    assert_success(&output);
    assert_stdout_contains(&output, "generated 1 file(s)");

    let unit = fs::read_to_string(t.secret_unit(MY_SECRET)).unwrap();
    assert!(!unit.contains("hello"));
    assert!(t.recipients(MY_SECRET).contains(&machine_public));
    assert_eq!(t.decrypt_with(MY_SECRET, &machine_key).unwrap(), "hello\n");
    assert_eq!(t.decrypt_with(MY_SECRET, &t.key_file()).unwrap(), "hello\n");
}

#[test]
fn test_second_run_changes_nothing() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));

    let path = t.secret_unit(MY_SECRET);
    let before = fs::read_to_string(&path).unwrap();
    let mtime = fs::metadata(&path).unwrap().modified().unwrap();

    let output = t.generate(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "up to date");
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);
}

#[test]
fn test_regenerate_runs_script_but_keeps_identical_value() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));
    let before = t.ciphertext(MY_SECRET);

    let output = t.generate(&["--regenerate"]);
    assert_success(&output);
    assert_stdout_contains(&output, "generated 1 file(s)");
    assert_eq!(t.ciphertext(MY_SECRET), before);
}

#[test]
fn test_regenerate_replaces_changed_value() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));

    t.write_config(&SINGLE_MACHINE.replace("echo hello", "echo goodbye"));
    assert_success(&t.generate(&["--regenerate", "--generator", "m1_generator"]));
    assert_eq!(t.decrypt_with(MY_SECRET, &t.key_file()).unwrap(), "goodbye\n");
}

#[test]
fn test_generate_without_grants_fails() {
    let t = Test::with_config(SINGLE_MACHINE);
    t.keygen_default();

    let output = t.generate(&[]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "no recipients");
    assert_stderr_contains(&output, "grant access before generating");
    assert!(!t.secret_unit(MY_SECRET).exists());
}

#[test]
fn test_prompt_value_and_public_output() {
    let t = Test::with_operator(WITH_PROMPT);

    let output = t.generate(&["--prompt", "db.password=hunter2"]);
    assert_success(&output);

    let password = "per-machine/m1/db/password";
    assert_eq!(t.decrypt_with(password, &t.key_file()).unwrap(), "hunter2");
    let hash = fs::read_to_string(t.public_value("per-machine/m1/db/hash")).unwrap();
    assert_eq!(hash.trim().len(), 16);
    assert!(!t.secret_unit("per-machine/m1/db/hash").exists());
}

#[test]
fn test_missing_prompt_fails_without_input() {
    let t = Test::with_operator(WITH_PROMPT);

    let output = t.generate(&[]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "no value for prompt 'password'");
}

#[test]
fn test_regenerate_reuses_previous_prompt_value() {
    let t = Test::with_operator(WITH_PROMPT);
    assert_success(&t.generate(&["--prompt", "db.password=hunter2"]));

    assert_success(&t.generate(&["--regenerate"]));
    let password = "per-machine/m1/db/password";
    assert_eq!(t.decrypt_with(password, &t.key_file()).unwrap(), "hunter2");
}

#[test]
fn test_shared_generator_runs_once_in_parallel() {
    let t = Test::new();
    let counter = t.dir.path().join("runs");
    t.write_config(&shared_fleet(&counter));
    let public_key = t.keygen_default();
    assert_success(&t.run(&["users", "add", "alice", &public_key]));
    assert_success(&t.run(&["defaults", "user:alice"]));

    assert_success(&t.generate(&["--jobs", "3"]));
    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);

    assert_success(&t.generate(&["--jobs", "3", "--regenerate", "--generator", "ca"]));
    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 2);
}

#[test]
fn test_failed_script_writes_nothing() {
    let t = Test::with_operator(
        &SINGLE_MACHINE.replace("echo hello > $out/my_secret", "echo oops >&2; exit 3"),
    );

    let output = t.generate(&[]);
    assert_exit_code(&output, 1);
    assert_stderr_contains(&output, "oops");
    assert!(!t.secret_unit(MY_SECRET).exists());
}
