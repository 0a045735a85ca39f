use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sbf"))
}

#[test]
fn init_add_check_info() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("store");
    let dir = dir.to_str().unwrap();

    cli_cmd()
        .args(["init", "--dir", dir, "--capacity", "100", "--prob", "0.01", "--scale", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init:"));

    cli_cmd()
        .args(["init", "--dir", dir])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    cli_cmd()
        .args(["add", "--dir", dir, "alice", "bob", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice: added"))
        .stdout(predicate::str::contains("bob: added"))
        .stdout(predicate::str::contains("alice: present"));

    cli_cmd()
        .args(["check", "--dir", dir, "alice", "bob", "carol"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice: yes"))
        .stdout(predicate::str::contains("bob: yes"))
        .stdout(predicate::str::contains("carol: no"));

    cli_cmd()
        .args(["info", "--dir", dir])
        .assert()
        .success()
        .stdout(predicate::str::contains("filters: 1"))
        .stdout(predicate::str::contains("filter-0000.bmp"))
        .stdout(predicate::str::contains("capacity=100"));
}

#[test]
fn load_grows_the_chain() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("store");
    let dir = dir.to_str().unwrap();
    let keys = tmp.path().join("keys.txt");
    let body: String = (0..300).map(|i| format!("key-{i}\n")).collect();
    std::fs::write(&keys, body).unwrap();

    cli_cmd()
        .args(["init", "--dir", dir, "--capacity", "100", "--prob", "0.01"])
        .args(["--scale", "2", "--reduction", "0.5"])
        .assert()
        .success();

    cli_cmd()
        .args(["load", "--dir", dir, "--file", keys.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("load: read=300"));

    cli_cmd()
        .args(["check", "--dir", dir, "key-0", "key-150", "key-299"])
        .assert()
        .success()
        .stdout(predicate::str::contains("key-0: yes"))
        .stdout(predicate::str::contains("key-150: yes"))
        .stdout(predicate::str::contains("key-299: yes"));

    cli_cmd()
        .args(["info", "--dir", dir])
        .assert()
        .success()
        .stdout(predicate::str::contains("filter-0001.bmp"))
        .stdout(predicate::str::contains("capacity=200"));
}

#[test]
fn load_takes_raw_byte_lines() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("store");
    let dir = dir.to_str().unwrap();
    let keys = tmp.path().join("keys.bin");
    std::fs::write(&keys, b"a\nb\r\n\xff\xfe\n\nc\n").unwrap();

    cli_cmd().args(["init", "--dir", dir, "--capacity", "100"]).assert().success();

    cli_cmd()
        .args(["load", "--dir", dir, "--file", keys.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("load: read=4"));

    cli_cmd()
        .args(["check", "--dir", dir, "a", "b", "c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a: yes"))
        .stdout(predicate::str::contains("b: yes"))
        .stdout(predicate::str::contains("c: yes"));
}

#[test]
fn failed_load_still_closes_store() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("store");
    let dir = dir.to_str().unwrap();
    let missing = tmp.path().join("absent.txt");

    cli_cmd().args(["init", "--dir", dir, "--capacity", "100"]).assert().success();
    cli_cmd().args(["add", "--dir", dir, "before"]).assert().success();

    cli_cmd()
        .args(["load", "--dir", dir, "--file", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.txt"));

    cli_cmd()
        .args(["check", "--dir", dir, "before"])
        .assert()
        .success()
        .stdout(predicate::str::contains("before: yes"));
}

#[test]
fn missing_store_fails() {
    let tmp = tempdir().expect("tempdir");
    cli_cmd()
        .args(["check", "--dir", tmp.path().to_str().unwrap(), "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("open store"));
}
