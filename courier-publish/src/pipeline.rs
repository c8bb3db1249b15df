//! Shared run pipeline entrypoint used by CLI and daemon.
//!
//! One run walks produce → stage → detect → publish. Production failure
//! aborts before staging; a run with no content changes is a successful
//! no-op; a publish failure (commit or push) fails the run.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use courier_core::types::{ArtifactName, PublisherConfig};
use courier_source::{producer_from_spec, ProduceReport};

use crate::detect::{detect_changes, ChangeReport};
use crate::error::PublishError;
use crate::lease::{lease_path_at, PublishLease};
use crate::repo;
use crate::stage::stage_artifacts;

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Detect and report, but never commit or push.
    pub dry_run: bool,
}

/// One publication: a commit carrying the staged artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationRecord {
    pub commit: String,
    pub label: String,
    pub published_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactName>,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing differed from the last publication.
    NoChange,
    /// `--dry-run`: a publication *would* have been created.
    WouldPublish { changed: Vec<ArtifactName> },
    /// A publication was committed and pushed.
    Published { record: PublicationRecord },
}

/// Full account of one run.
#[derive(Debug)]
pub struct RunReport {
    pub produced: ProduceReport,
    pub changes: ChangeReport,
    pub outcome: RunOutcome,
}

/// The publication label for a run on `date` (UTC date of the run itself).
pub fn commit_label(date: NaiveDate) -> String {
    format!(
        "Automated update of CN ASN IP lists ({})",
        date.format("%Y-%m-%d")
    )
}

/// Execute one run against `config`.
pub fn run(
    home: &Path,
    config: &PublisherConfig,
    options: RunOptions,
) -> Result<RunReport, PublishError> {
    if !repo::is_git_repo(&config.repository) {
        return Err(PublishError::NotARepository {
            path: config.repository.clone(),
        });
    }

    // Produce.
    let producer = producer_from_spec(&config.producer)?;
    let produced = producer.produce(&config.repository, &config.artifacts)?;

    // Stage + detect.
    let staged = stage_artifacts(&config.repository, &config.artifacts)?;
    let previous = repo::published_snapshot(&config.repository, &config.artifacts)?;
    let changes = detect_changes(&staged, &previous);

    if !changes.any_change() {
        tracing::info!("no content changes; nothing to publish");
        return Ok(RunReport {
            produced,
            changes,
            outcome: RunOutcome::NoChange,
        });
    }

    let changed = changes.changed();
    if options.dry_run {
        tracing::info!("[dry-run] would publish {} artifact(s)", changed.len());
        return Ok(RunReport {
            produced,
            changes,
            outcome: RunOutcome::WouldPublish { changed },
        });
    }

    // Publish, under the lease. A failed push drops the lease via Drop.
    let lease = PublishLease::acquire(&lease_path_at(home))?;

    let present: Vec<ArtifactName> = staged
        .iter()
        .filter(|(_, entry)| entry.is_present())
        .map(|(name, _)| name.clone())
        .collect();

    repo::add_paths(&config.repository, &present)?;
    let label = commit_label(Utc::now().date_naive());
    let commit = repo::commit(&config.repository, &label, &config.committer)?;
    repo::push(&config.repository, &config.remote, &config.branch)?;

    lease.release();

    tracing::info!("published {} as {}", label, &commit[..12.min(commit.len())]);
    Ok(RunReport {
        produced,
        changes,
        outcome: RunOutcome::Published {
            record: PublicationRecord {
                commit,
                label,
                published_at: Utc::now(),
                artifacts: present,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_carries_the_run_date() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(
            commit_label(date),
            "Automated update of CN ASN IP lists (2026-08-06)"
        );
    }

    #[test]
    fn label_zero_pads_month_and_day() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert_eq!(
            commit_label(date),
            "Automated update of CN ASN IP lists (2025-01-03)"
        );
    }
}
