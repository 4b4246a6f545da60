use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn sshmount(hosts_file: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sshmount").unwrap();
    cmd.env("SSHMOUNT_HOSTS", hosts_file);
    cmd
}

fn add_host(hosts_file: &Path, name: &str, local_path: &Path) {
    sshmount(hosts_file)
        .args([
            "add",
            "--name",
            name,
            "--user",
            "deploy",
            "--host",
            "build.example.net",
            "--port",
            "2222",
            "--remote-path",
            "/srv/artifacts",
            "--local-path",
            local_path.to_str().unwrap(),
            "--auth",
            "password",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Saved {name}.")));
}

#[test]
fn help_describes_the_tool() {
    Command::cargo_bin("sshmount")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mount remote filesystems over SSH"));
}

#[test]
fn add_then_list_shows_the_host() {
    let temp_dir = TempDir::new().unwrap();
    let hosts_file = temp_dir.path().join("hosts.json");

    add_host(&hosts_file, "build", &temp_dir.path().join("mnt"));

    sshmount(&hosts_file)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("deploy@build.example.net:2222"))
        .stdout(predicate::str::contains("(password)"));

    // The file is the same JSON document the store reads back.
    let json = fs::read_to_string(&hosts_file).unwrap();
    assert!(json.contains("\"remotePath\""), "{json}");
    assert!(json.contains("/srv/artifacts"), "{json}");
}

#[test]
fn duplicate_names_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let hosts_file = temp_dir.path().join("hosts.json");
    add_host(&hosts_file, "build", &temp_dir.path().join("mnt"));

    sshmount(&hosts_file)
        .args([
            "add",
            "--name",
            "build",
            "--user",
            "other",
            "--host",
            "other.example.net",
            "--remote-path",
            "/srv",
            "--local-path",
            "/mnt/other",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn empty_store_lists_nothing() {
    let temp_dir = TempDir::new().unwrap();

    sshmount(&temp_dir.path().join("hosts.json"))
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No hosts saved."));
}

#[test]
fn remove_deletes_the_host() {
    let temp_dir = TempDir::new().unwrap();
    let hosts_file = temp_dir.path().join("hosts.json");
    add_host(&hosts_file, "build", &temp_dir.path().join("mnt"));

    sshmount(&hosts_file)
        .args(["remove", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed build."));

    sshmount(&hosts_file)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No hosts saved."));
}

#[test]
fn remove_unknown_host_fails() {
    let temp_dir = TempDir::new().unwrap();

    sshmount(&temp_dir.path().join("hosts.json"))
        .args(["remove", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No host named missing"));
}

#[test]
fn mount_unknown_host_fails() {
    let temp_dir = TempDir::new().unwrap();

    sshmount(&temp_dir.path().join("hosts.json"))
        .args(["mount", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No host named missing"));
}

#[test]
fn unmount_unknown_host_fails() {
    let temp_dir = TempDir::new().unwrap();

    sshmount(&temp_dir.path().join("hosts.json"))
        .args(["unmount", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No host named missing"));
}

#[test]
fn status_reports_preflight_and_mounts() {
    let temp_dir = TempDir::new().unwrap();
    let hosts_file = temp_dir.path().join("hosts.json");

    sshmount(&hosts_file)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("sshfs:"))
        .stdout(predicate::str::contains("No hosts saved."));

    add_host(&hosts_file, "build", &temp_dir.path().join("mnt"));

    sshmount(&hosts_file)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[not mounted]"))
        .stdout(predicate::str::contains("build"));
}

#[test]
fn corrupt_hosts_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let hosts_file = temp_dir.path().join("hosts.json");
    fs::write(&hosts_file, "not json").unwrap();

    sshmount(&hosts_file)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[test]
fn hosts_file_flag_overrides_env() {
    let temp_dir = TempDir::new().unwrap();
    let env_file = temp_dir.path().join("env.json");
    let flag_file = temp_dir.path().join("flag.json");
    add_host(&env_file, "from-env", &temp_dir.path().join("mnt"));

    sshmount(&env_file)
        .args(["--hosts-file", flag_file.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No hosts saved."));
}
