//! Sparse staging of produced artifacts.
//!
//! Staging never fails on a missing file: each expected artifact maps to
//! `Present` (content + SHA-256 digest) or `Absent`, and downstream change
//! detection and publishing operate over whatever is present.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use courier_core::types::{ArtifactName, ArtifactSpec};

use crate::error::{io_err, PublishError};

/// One expected artifact as found in the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedArtifact {
    Present { content: String, digest: String },
    Absent,
}

impl StagedArtifact {
    pub fn is_present(&self) -> bool {
        matches!(self, StagedArtifact::Present { .. })
    }
}

/// Staged snapshot keyed by artifact name, in stable order.
pub type StagedSet = BTreeMap<ArtifactName, StagedArtifact>;

/// SHA-256 hex digest of `content` with line endings normalised to LF, so a
/// CRLF rewrite of identical data never registers as a change.
pub fn content_digest(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Read every expected artifact from `repo` into a [`StagedSet`].
///
/// A missing file stages as `Absent`; any other read failure is an error.
pub fn stage_artifacts(
    repo: &Path,
    artifacts: &[ArtifactSpec],
) -> Result<StagedSet, PublishError> {
    let mut staged = StagedSet::new();
    for spec in artifacts {
        let path = repo.join(&spec.name.0);
        let entry = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let digest = content_digest(&content);
                StagedArtifact::Present { content, digest }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("absent: {}", spec.name);
                StagedArtifact::Absent
            }
            Err(err) => return Err(io_err(&path, err)),
        };
        staged.insert(spec.name.clone(), entry);
    }
    Ok(staged)
}
