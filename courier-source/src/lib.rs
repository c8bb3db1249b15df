//! # courier-source
//!
//! Artifact production seam. A [`Producer`] takes the repository working tree
//! and the configured artifact specs, (over)writes zero or more artifact
//! files, and reports what it wrote. Two implementations:
//!
//! - [`CommandProducer`] — spawn an external program that writes the files
//!   itself (the program is opaque; only its exit status matters).
//! - [`BgpTableProducer`] — fetch the route table natively, filter per
//!   artifact, and write the files directly.
//!
//! A producer failing as a whole aborts the run. A single artifact failing to
//! materialize is tolerated and recorded as a skip.

pub mod bgp;
pub mod command;
pub mod error;

use std::path::Path;

use courier_core::types::{ArtifactName, ArtifactSpec, ProducerSpec};

pub use bgp::BgpTableProducer;
pub use command::CommandProducer;
pub use error::SourceError;

/// One artifact the producer could not materialize this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub name: ArtifactName,
    pub reason: String,
}

/// Outcome of a successful production step.
#[derive(Debug, Clone, Default)]
pub struct ProduceReport {
    /// Artifacts present in the working tree after the step.
    pub written: Vec<ArtifactName>,
    /// Artifacts missing after the step, with the reason when known.
    pub skipped: Vec<SkippedArtifact>,
}

/// Production seam shared by the run pipeline.
pub trait Producer {
    /// (Over)write artifact files under `repo`. Whole-step failure returns
    /// `Err`; per-artifact failure lands in [`ProduceReport::skipped`].
    fn produce(&self, repo: &Path, artifacts: &[ArtifactSpec])
        -> Result<ProduceReport, SourceError>;
}

/// Build the configured producer.
pub fn producer_from_spec(spec: &ProducerSpec) -> Result<Box<dyn Producer>, SourceError> {
    match spec {
        ProducerSpec::Command { argv } => Ok(Box::new(CommandProducer::new(argv.clone())?)),
        ProducerSpec::Builtin { url, user_agent } => Ok(Box::new(BgpTableProducer::new(
            url.clone(),
            user_agent.clone(),
        ))),
    }
}

/// Report presence of each expected artifact after a production step.
pub(crate) fn report_from_worktree(repo: &Path, artifacts: &[ArtifactSpec]) -> ProduceReport {
    let mut report = ProduceReport::default();
    for spec in artifacts {
        if repo.join(&spec.name.0).exists() {
            report.written.push(spec.name.clone());
        } else {
            report.skipped.push(SkippedArtifact {
                name: spec.name.clone(),
                reason: "not produced".to_string(),
            });
        }
    }
    report
}
