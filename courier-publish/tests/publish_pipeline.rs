//! End-to-end pipeline runs against throwaway git repositories.

#![cfg(unix)]

use std::path::Path;
use std::process::Command;

use chrono::Utc;
use tempfile::TempDir;

use courier_core::types::{
    AddressFamily, ArtifactName, ArtifactSpec, Asn, CommitterIdentity, ProducerSpec,
    PublisherConfig, Schedule,
};
use courier_publish::{
    commit_label, lease::lease_path_at, lease::PublishLease, pipeline, PublishError, RunOptions,
    RunOutcome,
};

fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git").args(args).current_dir(repo).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

struct Fixture {
    home: TempDir,
    repo: TempDir,
    _remote: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

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

        Self {
            home,
            repo,
            _remote: remote,
        }
    }

    /// Config whose producer runs `script` through `sh -c` in the repo.
    fn config(&self, script: &str) -> PublisherConfig {
        let now = Utc::now();
        PublisherConfig {
            version: 1,
            repository: self.repo.path().to_path_buf(),
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
                argv: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            },
            artifacts: vec![
                ArtifactSpec {
                    name: ArtifactName::from("cn_asn_ipv4.txt"),
                    family: AddressFamily::Ipv4,
                    asns: vec![Asn(4134), Asn(56040)],
                },
                ArtifactSpec {
                    name: ArtifactName::from("cn_asn_ipv6.txt"),
                    family: AddressFamily::Ipv6,
                    asns: vec![Asn(4134), Asn(56040)],
                },
            ],
            created_at: now,
            updated_at: now,
        }
    }

    fn commit_count(&self) -> usize {
        let output = Command::new("git")
            .args(["rev-list", "--count", "HEAD"])
            .current_dir(self.repo.path())
            .output()
            .unwrap();
        if !output.status.success() {
            return 0; // no commits yet
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap()
    }
}

const WRITE_A: &str = "printf '1.2.3.0/24\\n' > cn_asn_ipv4.txt";
const WRITE_A_AND_B: &str =
    "printf '1.2.3.0/24\\n' > cn_asn_ipv4.txt; printf '240e::/20\\n' > cn_asn_ipv6.txt";

#[test]
fn partial_artifacts_publish_across_runs() {
    let fx = Fixture::new();

    // Run 1: only the IPv4 artifact materializes. One publication, A only.
    let report = pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default())
        .expect("run 1");
    let RunOutcome::Published { record } = &report.outcome else {
        panic!("run 1 should publish, got {:?}", report.outcome);
    };
    assert_eq!(record.artifacts, vec![ArtifactName::from("cn_asn_ipv4.txt")]);
    assert_eq!(fx.commit_count(), 1);

    // Run 2: identical output, same day re-trigger. Successful no-op.
    let report = pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default())
        .expect("run 2");
    assert_eq!(report.outcome, RunOutcome::NoChange);
    assert_eq!(fx.commit_count(), 1, "no-change run must not commit");

    // Run 3: the IPv6 artifact appears. One new publication carrying both.
    let report = pipeline::run(
        fx.home.path(),
        &fx.config(WRITE_A_AND_B),
        RunOptions::default(),
    )
    .expect("run 3");
    let RunOutcome::Published { record } = &report.outcome else {
        panic!("run 3 should publish, got {:?}", report.outcome);
    };
    assert_eq!(
        record.artifacts,
        vec![
            ArtifactName::from("cn_asn_ipv4.txt"),
            ArtifactName::from("cn_asn_ipv6.txt"),
        ]
    );
    assert_eq!(fx.commit_count(), 2);
    assert_eq!(
        report.changes.changed(),
        vec![ArtifactName::from("cn_asn_ipv6.txt")],
        "only the new artifact counts as changed"
    );
}

#[test]
fn publication_label_carries_the_run_date() {
    let fx = Fixture::new();
    pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default()).expect("run");

    let subject = git(fx.repo.path(), &["log", "-1", "--format=%s"]);
    assert_eq!(subject, commit_label(Utc::now().date_naive()));
}

#[test]
fn publication_reaches_the_remote() {
    let fx = Fixture::new();
    let report = pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default())
        .expect("run");
    let RunOutcome::Published { record } = report.outcome else {
        panic!("expected a publication");
    };

    let remote_sha = git(fx._remote.path(), &["rev-parse", "main"]);
    assert_eq!(remote_sha, record.commit);
}

#[test]
fn failing_producer_aborts_before_staging() {
    let fx = Fixture::new();
    let err = pipeline::run(
        fx.home.path(),
        &fx.config("echo no table >&2; exit 1"),
        RunOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, PublishError::Production(_)));
    assert_eq!(fx.commit_count(), 0, "failed production must not publish");
}

#[test]
fn dry_run_detects_but_never_commits() {
    let fx = Fixture::new();
    let report = pipeline::run(
        fx.home.path(),
        &fx.config(WRITE_A),
        RunOptions { dry_run: true },
    )
    .expect("dry run");

    assert!(matches!(report.outcome, RunOutcome::WouldPublish { .. }));
    assert_eq!(fx.commit_count(), 0, "dry-run must not commit");
}

#[test]
fn held_lease_blocks_publication() {
    let fx = Fixture::new();
    let lease = PublishLease::acquire(&lease_path_at(fx.home.path())).expect("hold lease");

    let err = pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, PublishError::LeaseHeld { .. }));
    assert_eq!(fx.commit_count(), 0);

    lease.release();
    pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default())
        .expect("run proceeds once the lease is free");
}

#[test]
fn rejected_push_fails_the_run() {
    let fx = Fixture::new();
    // Point origin somewhere that cannot accept a push.
    git(
        fx.repo.path(),
        &["remote", "set-url", "origin", "/nonexistent/remote.git"],
    );

    let err = pipeline::run(fx.home.path(), &fx.config(WRITE_A), RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, PublishError::PushRejected { .. }));

    // The lease must not be left behind after the failure.
    assert!(!lease_path_at(fx.home.path()).exists());
}

#[test]
fn non_repository_is_rejected_up_front() {
    let fx = Fixture::new();
    let mut config = fx.config(WRITE_A);
    let plain = TempDir::new().unwrap();
    config.repository = plain.path().to_path_buf();

    let err = pipeline::run(fx.home.path(), &config, RunOptions::default()).unwrap_err();
    assert!(matches!(err, PublishError::NotARepository { .. }));
}
