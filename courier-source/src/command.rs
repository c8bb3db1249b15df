//! External-program producer.
//!
//! The program is an opaque collaborator: it gets the repository as its
//! working directory, no arguments are injected, and the only things courier
//! observes are its exit status and which artifact files exist afterwards.

use std::path::Path;
use std::process::Command;

use courier_core::types::ArtifactSpec;

use crate::error::SourceError;
use crate::{report_from_worktree, ProduceReport, Producer};

/// Runs a configured argv in the repository working tree.
#[derive(Debug, Clone)]
pub struct CommandProducer {
    argv: Vec<String>,
}

impl CommandProducer {
    pub fn new(argv: Vec<String>) -> Result<Self, SourceError> {
        if argv.is_empty() {
            return Err(SourceError::EmptyCommand);
        }
        Ok(Self { argv })
    }
}

impl Producer for CommandProducer {
    fn produce(
        &self,
        repo: &Path,
        artifacts: &[ArtifactSpec],
    ) -> Result<ProduceReport, SourceError> {
        let program = &self.argv[0];
        tracing::info!("running producer: {}", self.argv.join(" "));

        let output = Command::new(program)
            .args(&self.argv[1..])
            .current_dir(repo)
            .output()
            .map_err(|e| SourceError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SourceError::ProducerFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let report = report_from_worktree(repo, artifacts);
        for skip in &report.skipped {
            tracing::warn!("producer did not write {}: {}", skip.name, skip.reason);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{AddressFamily, ArtifactName, Asn};
    use tempfile::TempDir;

    fn spec(name: &str) -> ArtifactSpec {
        ArtifactSpec {
            name: ArtifactName::from(name),
            family: AddressFamily::Ipv4,
            asns: vec![Asn(4134)],
        }
    }

    #[test]
    fn empty_argv_is_rejected() {
        let err = CommandProducer::new(vec![]).unwrap_err();
        assert!(matches!(err, SourceError::EmptyCommand));
    }

    #[cfg(unix)]
    #[test]
    fn successful_command_reports_written_artifacts() {
        let repo = TempDir::new().unwrap();
        let producer = CommandProducer::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf '1.2.3.0/24\\n' > a.txt".to_string(),
        ])
        .unwrap();

        let report = producer
            .produce(repo.path(), &[spec("a.txt"), spec("b.txt")])
            .expect("produce");

        assert_eq!(report.written, vec![ArtifactName::from("a.txt")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name.0, "b.txt");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_surfaces_status_and_stderr() {
        let repo = TempDir::new().unwrap();
        let producer = CommandProducer::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 3".to_string(),
        ])
        .unwrap();

        let err = producer.produce(repo.path(), &[spec("a.txt")]).unwrap_err();
        match err {
            SourceError::ProducerFailed { status, stderr } => {
                assert!(status.contains('3'), "status was: {status}");
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected ProducerFailed, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let repo = TempDir::new().unwrap();
        let producer =
            CommandProducer::new(vec!["courier-no-such-program".to_string()]).unwrap();
        let err = producer.produce(repo.path(), &[spec("a.txt")]).unwrap_err();
        assert!(matches!(err, SourceError::Spawn { .. }));
    }
}
