//! Unified diff preview for `courier diff`.

use std::path::Path;

use similar::TextDiff;

use courier_core::types::{ArtifactName, ArtifactSpec};

use crate::error::PublishError;
use crate::repo;
use crate::stage::{stage_artifacts, StagedArtifact};

/// A single artifact diff against the last publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub name: ArtifactName,
    pub unified_diff: String,
}

/// Render what a publish would record and compare it to the last publication.
///
/// No files are written; absent artifacts produce no diff.
pub fn preview(repo: &Path, artifacts: &[ArtifactSpec]) -> Result<Vec<FileDiff>, PublishError> {
    let staged = stage_artifacts(repo, artifacts)?;
    let previous = repo::published_snapshot(repo, artifacts)?;

    let mut diffs = Vec::new();
    for (name, entry) in &staged {
        let StagedArtifact::Present { content, .. } = entry else {
            continue;
        };
        let staged_content = normalize_line_endings(content);
        let published = previous
            .get(name)
            .and_then(|p| p.as_deref())
            .map(normalize_line_endings)
            .unwrap_or_default();
        if published == staged_content {
            continue;
        }

        let old_header = format!("a/{name}");
        let new_header = format!("b/{name}");
        let unified = TextDiff::from_lines(&published, &staged_content)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        diffs.push(FileDiff {
            name: name.clone(),
            unified_diff: unified,
        });
    }

    Ok(diffs)
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
