use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use tempfile::{TempDir, tempdir};

fn stratus(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stratus"));
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("STRATUS_HOST")
        .env_remove("STRATUS_API_URL")
        .env_remove("STRATUS_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_command_groups() {
    let home = tempdir().expect("tempdir");
    stratus(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apps"))
        .stdout(predicate::str::contains("logs"))
        .stdout(predicate::str::contains("--app"));
}

#[test]
fn app_flag_without_value_is_a_usage_error() {
    let home = tempdir().expect("tempdir");
    stratus(&home)
        .args(["ps", "list", "--app"])
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with("error:"));
}

#[test]
fn config_set_requires_assignments() {
    let home = tempdir().expect("tempdir");
    stratus(&home)
        .args(["config", "set", "--app", "demo"])
        .assert()
        .failure();
}

#[test]
fn missing_app_outside_a_repository() {
    let home = tempdir().expect("tempdir");
    stratus(&home)
        .args(["ps", "list"])
        .env("STRATUS_API_KEY", "k")
        .assert()
        .code(2);
}

#[test]
fn config_list_against_api() {
    let server = MockServer::start();
    let vars = server.mock(|when, then| {
        when.method(GET).path("/apps/demo/config_vars");
        then.status(200).json_body(json!({"RACK_ENV": "production"}));
    });

    let home = tempdir().expect("tempdir");
    stratus(&home)
        .args(["config", "list", "-a", "demo"])
        .env("STRATUS_API_URL", server.base_url())
        .env("STRATUS_API_KEY", "k")
        .assert()
        .success()
        .stdout(predicate::str::contains("=== demo Config Vars"))
        .stdout(predicate::str::contains("RACK_ENV: production"));
    vars.assert();
}

#[test]
fn json_format_for_scripting() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/apps/demo/config_vars");
        then.status(200).json_body(json!({"A": "1"}));
    });

    let home = tempdir().expect("tempdir");
    let output = stratus(&home)
        .args(["--format", "json", "config", "list", "--app=demo"])
        .env("STRATUS_API_URL", server.base_url())
        .env("STRATUS_API_KEY", "k")
        .output()
        .expect("run");

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(parsed["A"], "1");
}

#[test]
fn rejected_api_key_fails_without_prompting() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/apps/demo/ps");
        then.status(401).body("{}");
    });

    let home = tempdir().expect("tempdir");
    stratus(&home)
        .args(["ps", "list", "-a", "demo"])
        .env("STRATUS_API_URL", server.base_url())
        .env("STRATUS_API_KEY", "bad")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn run_keeps_the_remote_command_flags() {
    let cases = [
        (&["run", "-a", "demo", "ls", "-al"][..], "ls -al"),
        (&["run", "--app=demo", "rm", "-rf", "tmp"][..], "rm -rf tmp"),
    ];
    for (argv, command) in cases {
        let server = MockServer::start();
        let started = server.mock(|when, then| {
            when.method(POST)
                .path("/apps/demo/ps")
                .body_includes(format!("\"command\":\"{command}\""));
            then.status(200)
                .json_body(json!({"process": "run.1", "rendezvous_url": ""}));
        });

        let home = tempdir().expect("tempdir");
        stratus(&home)
            .args(argv)
            .env("STRATUS_API_URL", server.base_url())
            .env("STRATUS_API_KEY", "k")
            .assert()
            .code(1)
            .stdout(predicate::str::contains(format!("Running `{command}`")));
        started.assert();
    }
}
