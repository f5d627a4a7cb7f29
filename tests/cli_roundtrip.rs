//! End-to-end CLI exercise: checkout, checkin, and the dashboards, run
//! against a local bare remote.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use support::{mcam_bytes, TestEnv};

fn pdm(env: &TestEnv, user: &str) -> Command {
    let mut cmd = Command::cargo_bin("pdm").unwrap();
    cmd.current_dir(env.root());
    cmd.env("PDM_CONFIG", env.root().join("pdm.toml"));
    cmd.env("PDM_USER", user);
    cmd.env("RUST_LOG", "");
    cmd
}

fn write_cli_config(env: &TestEnv) {
    let config = env.config("wc-cli");
    config.save(&env.root().join("pdm.toml")).unwrap();
}

#[test]
fn files_and_locks_roundtrip() {
    let env = TestEnv::new().unwrap();
    write_cli_config(&env);

    pdm(&env, "alice")
        .args(["files", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1234567.mcam"))
        .stdout(predicate::str::contains("\"revision\": \"2.3\""));

    pdm(&env, "alice")
        .arg("locks")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active checkouts."));
}

#[test]
fn checkout_checkin_cycle() {
    let env = TestEnv::new().unwrap();
    write_cli_config(&env);

    pdm(&env, "alice")
        .args(["checkout", "1234567.mcam", "--message", "updating dimensions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("checked out by alice"));

    // The lock is visible on the dashboard and binding for others.
    pdm(&env, "alice")
        .arg("locks")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"));

    pdm(&env, "bob")
        .args(["checkout", "1234567.mcam"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("already checked out by alice"));

    // Check in new content; revision starts at 0.1.
    let new_content = env.root().join("new.mcam");
    std::fs::write(&new_content, mcam_bytes("cli update")).unwrap();

    pdm(&env, "alice")
        .args([
            "checkin",
            "1234567.mcam",
            "--message",
            "cli update",
            "--file",
        ])
        .arg(&new_content)
        .assert()
        .success()
        .stdout(predicate::str::contains("revision 0.1"));

    // Lock is gone; bob can now take it.
    pdm(&env, "bob")
        .args(["checkout", "1234567.mcam"])
        .assert()
        .success();

    // A non-holder cannot check in.
    pdm(&env, "mallory")
        .args(["checkin", "1234567.mcam", "--message", "hijack"])
        .assert()
        .failure()
        .code(3);

    // Admin override frees the path for everyone.
    pdm(&env, "admin")
        .args(["admin", "unlock", "1234567.mcam"])
        .assert()
        .success();

    pdm(&env, "admin")
        .arg("locks")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active checkouts."));
}

#[test]
fn cancel_reverts_local_changes() {
    let env = TestEnv::new().unwrap();
    write_cli_config(&env);

    pdm(&env, "alice")
        .args(["checkout", "1234567.mcam"])
        .assert()
        .success();

    // Scribble over the working copy file, then cancel.
    let config = env.config("wc-cli");
    let work_dir = config.store.resolved_work_dir().unwrap();
    std::fs::write(work_dir.join("1234567.mcam"), mcam_bytes("scratch")).unwrap();

    pdm(&env, "alice")
        .args(["cancel", "1234567.mcam"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));

    assert_eq!(
        std::fs::read(work_dir.join("1234567.mcam")).unwrap(),
        mcam_bytes("seed")
    );

    // Cancelling again is a policy error: nothing is held.
    pdm(&env, "alice")
        .args(["cancel", "1234567.mcam"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn history_reports_revisions() {
    let env = TestEnv::new().unwrap();
    write_cli_config(&env);

    pdm(&env, "alice")
        .args(["checkout", "7654321_AB123.vnc"])
        .assert()
        .success();

    let new_content = env.root().join("new.vnc");
    std::fs::write(&new_content, b"updated vnc").unwrap();
    pdm(&env, "alice")
        .args(["checkin", "7654321_AB123.vnc", "--message", "bump", "--file"])
        .arg(&new_content)
        .assert()
        .success()
        .stdout(predicate::str::contains("revision 2.4"));

    pdm(&env, "alice")
        .args(["history", "7654321_AB123.vnc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.4"))
        .stdout(predicate::str::contains("REV 2.4: bump"));
}
