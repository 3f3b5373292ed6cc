//! Tests for `fleetvars list`.

use fleetvars::core::access::{Principal, Registry};

use crate::support::*;

#[test]
fn test_list_before_and_after_generate() {
    let t = Test::with_operator(SINGLE_MACHINE);

    let output = t.run(&["list"]);
    assert_success(&output);
    assert_stdout_contains(&output, "m1_generator/my_secret");
    assert_stdout_contains(&output, "missing");

    assert_success(&t.generate(&[]));
    let output = t.run(&["list", "m1"]);
    assert_success(&output);
    assert_stdout_contains(&output, "ok (secret)");
}

#[test]
fn test_list_json_reports_stale_recipients() {
    let t = Test::with_operator(SINGLE_MACHINE);
    assert_success(&t.generate(&[]));

    // Editing the registry by hand leaves the stored recipients behind.
    let bob = t.keygen(&t.home.path().join("bob.txt"));
    let access = t.dir.path().join("vars/access.toml");
    let mut registry: Registry =
        toml::from_str(&std::fs::read_to_string(&access).unwrap()).unwrap();
    registry.users.insert("bob".into(), bob);
    registry
        .grants
        .get_mut(MY_SECRET)
        .unwrap()
        .insert(Principal::User("bob".into()));
    std::fs::write(&access, toml::to_string(&registry).unwrap()).unwrap();

    let output = t.run(&["list", "--json"]);
    assert_success(&output);
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    let entry = &parsed[0];
    assert_eq!(entry["machine"], "m1");
    assert_eq!(entry["present"], true);
    assert_eq!(entry["stale"], true);

    let output = t.generate(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "re-encrypted 1 file(s)");
}
