//! Git plumbing for the publication store.
//!
//! Courier shells out to the system `git`; the repository's own atomicity
//! (commit-then-push) is what makes a publication all-or-nothing. Reads of
//! the last published state go through `git show HEAD:<name>` so the working
//! tree can be freely overwritten by producers without losing the comparison
//! baseline.

use std::path::Path;
use std::process::{Command, Output};

use chrono::{DateTime, Utc};

use courier_core::types::{ArtifactName, ArtifactSpec, CommitterIdentity};

use crate::error::PublishError;

fn run_git(repo: &Path, args: &[&str]) -> Result<Output, PublishError> {
    Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .map_err(|e| PublishError::Io {
            path: repo.join(".git"),
            source: e,
        })
}

fn expect_success(
    context: &'static str,
    output: Output,
) -> Result<Output, PublishError> {
    if output.status.success() {
        return Ok(output);
    }
    Err(PublishError::Git {
        context,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Check whether `dir` is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    run_git(dir, &["rev-parse", "--is-inside-work-tree"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// The current HEAD commit SHA, or `None` before the first commit.
pub fn head_commit(repo: &Path) -> Result<Option<String>, PublishError> {
    let output = run_git(repo, &["rev-parse", "--verify", "--quiet", "HEAD"])?;
    if !output.status.success() {
        return Ok(None);
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!sha.is_empty()).then_some(sha))
}

/// Content of one artifact in the last publication, or `None` if no
/// publication carries it (including the no-commits-yet case).
pub fn published_content(
    repo: &Path,
    name: &ArtifactName,
) -> Result<Option<String>, PublishError> {
    let spec = format!("HEAD:{}", name.0);
    let output = run_git(repo, &["show", &spec])?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Snapshot of every artifact's last published content, keyed by name.
pub fn published_snapshot(
    repo: &Path,
    artifacts: &[ArtifactSpec],
) -> Result<std::collections::BTreeMap<ArtifactName, Option<String>>, PublishError> {
    let mut snapshot = std::collections::BTreeMap::new();
    for spec in artifacts {
        snapshot.insert(spec.name.clone(), published_content(repo, &spec.name)?);
    }
    Ok(snapshot)
}

/// When the last publication touching `name` was committed.
pub fn published_at(
    repo: &Path,
    name: &ArtifactName,
) -> Result<Option<DateTime<Utc>>, PublishError> {
    let output = run_git(repo, &["log", "-1", "--format=%cI", "--", &name.0])?;
    if !output.status.success() {
        return Ok(None);
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc)))
}

/// `git add` each named path.
pub fn add_paths(repo: &Path, names: &[ArtifactName]) -> Result<(), PublishError> {
    for name in names {
        let output = run_git(repo, &["add", "--", &name.0])?;
        expect_success("add", output)?;
    }
    Ok(())
}

/// Commit the index under the fixed publisher identity; returns the new SHA.
pub fn commit(
    repo: &Path,
    label: &str,
    identity: &CommitterIdentity,
) -> Result<String, PublishError> {
    let name_cfg = format!("user.name={}", identity.name);
    let email_cfg = format!("user.email={}", identity.email);
    let output = run_git(
        repo,
        &["-c", &name_cfg, "-c", &email_cfg, "commit", "-m", label],
    )?;
    expect_success("commit", output)?;

    head_commit(repo)?.ok_or(PublishError::Git {
        context: "commit",
        status: "0".to_string(),
        stderr: "HEAD missing after commit".to_string(),
    })
}

/// Push HEAD to the configured remote branch.
///
/// Any rejection — auth, conflict from a concurrent update, unreachable
/// remote — fails the run; the next scheduled run self-heals.
pub fn push(repo: &Path, remote: &str, branch: &str) -> Result<(), PublishError> {
    let refspec = format!("HEAD:{branch}");
    let output = run_git(repo, &["push", remote, &refspec])?;
    if output.status.success() {
        return Ok(());
    }
    Err(PublishError::PushRejected {
        remote: remote.to_string(),
        branch: branch.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
