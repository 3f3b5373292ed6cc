//! Tests for `users`, `machines`, `groups`, `grant` and `revoke`.

use crate::support::*;

/// Operator setup plus a generated secret and a second user `bob`.
fn with_bob() -> (Test, std::path::PathBuf, String) {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));

    let bob_key = t.home.path().join("bob.txt");
    let bob_public = t.keygen(&bob_key);
    assert_success(&t.run(&["users", "add", "bob", &bob_public]));
    (t, bob_key, bob_public)
}

#[test]
fn test_grant_reencrypts_for_new_user() {
    let (t, bob_key, bob_public) = with_bob();
    assert!(t.decrypt_with(MY_SECRET, &bob_key).is_err());

    assert_success(&t.run(&["grant", MY_SECRET, "user:bob"]));
    assert!(t.recipients(MY_SECRET).contains(&bob_public));
    assert_eq!(t.decrypt_with(MY_SECRET, &bob_key).unwrap(), "hello\n");
}

#[test]
fn test_revoke_excludes_key_from_new_ciphertext() {
    let (t, bob_key, bob_public) = with_bob();
    assert_success(&t.run(&["grant", MY_SECRET, "user:bob"]));
    let granted = t.ciphertext(MY_SECRET);

    assert_success(&t.run(&["revoke", MY_SECRET, "user:bob"]));
    assert!(!t.recipients(MY_SECRET).contains(&bob_public));
    assert_ne!(t.ciphertext(MY_SECRET), granted);
    assert!(t.decrypt_with(MY_SECRET, &bob_key).is_err());
    assert_eq!(t.decrypt_with(MY_SECRET, &t.key_file()).unwrap(), "hello\n");
}

#[test]
fn test_group_membership_controls_access() {
    let (t, bob_key, bob_public) = with_bob();
    assert_success(&t.run(&["groups", "add-member", "ops", "user:bob"]));
    assert_success(&t.run(&["groups", "add-member", "ops", "user:alice"]));
    assert_success(&t.run(&["grant", MY_SECRET, "group:ops"]));
    assert_eq!(t.decrypt_with(MY_SECRET, &bob_key).unwrap(), "hello\n");

    assert_success(&t.run(&["groups", "rm-member", "ops", "user:bob"]));
    assert!(!t.recipients(MY_SECRET).contains(&bob_public));
    assert!(t.decrypt_with(MY_SECRET, &bob_key).is_err());
}

#[test]
fn test_revoke_last_grant_fails() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));
    let before = t.ciphertext(MY_SECRET);

    let output = t.run(&["revoke", MY_SECRET, "user:alice"]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "would have no recipients left");
    assert_eq!(t.ciphertext(MY_SECRET), before);
}

#[test]
fn test_grant_unknown_principal_suggests() {
    let t = Test::with_operator(SINGLE_MACHINE);

    let output = t.run(&["grant", MY_SECRET, "user:alcie"]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "did you mean: alice?");
}

#[test]
fn test_users_add_rejects_invalid_key() {
    let t = Test::with_config(SINGLE_MACHINE);

    let output = t.run(&["users", "add", "bob", INVALID_PUBLIC_KEY]);
    assert_exit_code(&output, 2);
}

#[test]
fn test_users_add_same_key_is_noop_and_new_key_needs_force() {
    let (t, _, bob_public) = with_bob();

    let output = t.run(&["users", "add", "bob", &bob_public]);
    assert_success(&output);
    assert_stdout_contains(&output, "already registered");

    let other = t.keygen(&t.home.path().join("bob2.txt"));
    let output = t.run(&["users", "add", "bob", &other]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "--force");

    assert_success(&t.run(&["users", "add", "bob", &other, "--force"]));
}

#[test]
fn test_users_list_json() {
    let t = Test::with_operator(SINGLE_MACHINE);

    let output = t.run(&["users", "list", "--json"]);
    assert_success(&output);
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    assert_eq!(parsed[0]["name"], "alice");
    assert!(parsed[0]["public_key"].as_str().unwrap().starts_with("age1"));
}

#[test]
fn test_revoked_machine_is_not_granted_again() {
    let t = Test::with_operator(SINGLE_MACHINE);
    let machine_key = t.home.path().join("m1.txt");
    let machine_public = t.keygen(&machine_key);
    assert_success(&t.run(&["machines", "add", "m1", &machine_public]));
    assert_success(&t.generate(&[]));
    assert!(t.recipients(MY_SECRET).contains(&machine_public));

    assert_success(&t.run(&["revoke", MY_SECRET, "machine:m1"]));
    let output = t.generate(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "up to date");

    assert!(!t.recipients(MY_SECRET).contains(&machine_public));
    assert!(t.decrypt_with(MY_SECRET, &machine_key).is_err());
}

#[test]
fn test_grant_undeclared_secret_fails() {
    let t = Test::with_operator(SINGLE_MACHINE);

    let output = t.run(&["grant", "per-machine/m1/m1_generator/my_secert", "user:alice"]);
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "unknown secret 'per-machine/m1/m1_generator/my_secert'");
    let access = std::fs::read_to_string(t.dir.path().join("vars/access.toml")).unwrap();
    assert!(!access.contains("my_secert"));
}
