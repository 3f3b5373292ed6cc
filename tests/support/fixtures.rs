//! Test fixtures and constants.

/// One machine with one secret generator.
pub const SINGLE_MACHINE: &str = r#"
[fleet]
version = "0.1"

[machines.m1]
target_host = "root@m1.example"

[machines.m1.generators.m1_generator]
script = "echo hello > $out/my_secret"
[machines.m1.generators.m1_generator.files.my_secret]
"#;

/// Secret reference of the var produced by [`SINGLE_MACHINE`].
pub const MY_SECRET: &str = "per-machine/m1/m1_generator/my_secret";

/// A generator with a public output and a prompt stored as a file.
pub const WITH_PROMPT: &str = r#"
[fleet]
version = "0.1"

[machines.m1.generators.db]
script = "cat $prompts/password | sha256sum | cut -c1-16 > $out/hash"
[machines.m1.generators.db.files.password]
[machines.m1.generators.db.files.hash]
secret = false
[[machines.m1.generators.db.prompts]]
name = "password"
kind = "hidden"
create_file = true
"#;

/// Three machines sharing a generator; `{counter}` is replaced by a file
/// that receives one line per script run.
pub fn shared_fleet(counter: &std::path::Path) -> String {
    let mut config = String::from("[fleet]\nversion = \"0.1\"\n");
    for machine in ["m1", "m2", "m3"] {
        config.push_str(&format!(
            r#"
[machines.{m}.generators.ca]
script = "echo run >> {counter}; head -c 16 /dev/urandom | od -An -tx1 | tr -d ' \n' > $out/ca_key"
share = true
[machines.{m}.generators.ca.files.ca_key]
"#,
            m = machine,
            counter = counter.display()
        ));
    }
    config
}

/// An invalid public key for negative tests.
pub const INVALID_PUBLIC_KEY: &str = "not-a-valid-age-key";
