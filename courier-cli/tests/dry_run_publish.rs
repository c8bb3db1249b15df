#![cfg(unix)]

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use tempfile::TempDir;

use courier_core::config;
use courier_core::types::{
    AddressFamily, ArtifactName, ArtifactSpec, Asn, CommitterIdentity, ProducerSpec,
    PublisherConfig, Schedule,
};

fn git(repo: &Path, args: &[&str]) {
    let output = StdCommand::new("git").args(args).current_dir(repo).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn commit_count(repo: &Path) -> usize {
    let output = StdCommand::new("git")
        .args(["rev-list", "--count", "HEAD"])
        .current_dir(repo)
        .output()
        .unwrap();
    if !output.status.success() {
        return 0;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().unwrap()
}

/// Temp HOME + repo + bare remote, with a shell producer registered.
fn fixture(producer_script: &str) -> (TempDir, TempDir, TempDir) {
    let home = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();

    git(remote.path(), &["init", "--bare", "--initial-branch=main"]);
    git(repo.path(), &["init", "--initial-branch=main"]);
    git(repo.path(), &["config", "user.name", "fixture"]);
    git(repo.path(), &["config", "user.email", "fixture@example.net"]);
    git(
        repo.path(),
        &["remote", "add", "origin", remote.path().to_str().unwrap()],
    );

    let now = Utc::now();
    let config = PublisherConfig {
        version: 1,
        repository: repo.path().to_path_buf(),
        remote: "origin".to_string(),
        branch: "main".to_string(),
        committer: CommitterIdentity {
            name: "courier".to_string(),
            email: "courier@example.net".to_string(),
        },
        schedule: Schedule {
            hour_utc: 3,
            minute_utc: 0,
        },
        producer: ProducerSpec::Command {
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                producer_script.to_string(),
            ],
        },
        artifacts: vec![ArtifactSpec {
            name: ArtifactName::from("cn_asn_ipv4.txt"),
            family: AddressFamily::Ipv4,
            asns: vec![Asn(4134), Asn(56040)],
        }],
        created_at: now,
        updated_at: now,
    };
    config::save_at(home.path(), &config).expect("save config");

    (home, repo, remote)
}

fn courier(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("courier").unwrap();
    cmd.env("HOME", home.path()).env("USERPROFILE", home.path());
    cmd
}

#[test]
fn dry_run_reports_and_writes_no_publication() {
    let (home, repo, _remote) = fixture("printf '1.2.3.0/24\\n' > cn_asn_ipv4.txt");

    courier(&home)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"))
        .stdout(predicate::str::contains("would publish"));

    assert_eq!(commit_count(repo.path()), 0, "dry-run must not commit");
}

#[test]
fn run_publishes_then_becomes_a_no_op() {
    let (home, repo, _remote) = fixture("printf '1.2.3.0/24\\n' > cn_asn_ipv4.txt");

    courier(&home)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "published 'Automated update of CN ASN IP lists",
        ));
    assert_eq!(commit_count(repo.path()), 1);

    courier(&home)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to publish"));
    assert_eq!(commit_count(repo.path()), 1, "no-change run must not commit");
}

#[test]
fn failing_producer_exits_nonzero() {
    let (home, repo, _remote) = fixture("echo feed unavailable >&2; exit 1");

    courier(&home)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("production failed"));

    assert_eq!(commit_count(repo.path()), 0);
}

#[test]
fn run_without_config_exits_nonzero() {
    let home = TempDir::new().unwrap();

    courier(&home)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("courier init"));
}
