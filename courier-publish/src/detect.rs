//! Change detection against the last publication.
//!
//! Signal per artifact:
//! 1. `Missing` (not in the working tree this run)
//! 2. `NeverPublished` (present, no prior publication carries it)
//! 3. `Changed` (present, content differs from the last publication)
//! 4. `Current`
//!
//! A publication happens iff at least one artifact is `Changed` or
//! `NeverPublished`. `Missing` never blocks the others.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use courier_core::types::ArtifactName;

use crate::stage::{content_digest, StagedArtifact, StagedSet};

/// Classification of one artifact against the last publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    NeverPublished,
    Current,
    Changed,
    Missing,
}

impl ArtifactState {
    /// Whether this state, on its own, warrants a new publication.
    pub fn warrants_publish(self) -> bool {
        matches!(self, ArtifactState::Changed | ArtifactState::NeverPublished)
    }
}

/// Per-artifact states for one run, in stable name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub states: BTreeMap<ArtifactName, ArtifactState>,
}

impl ChangeReport {
    pub fn any_change(&self) -> bool {
        self.states.values().any(|s| s.warrants_publish())
    }

    pub fn changed(&self) -> Vec<ArtifactName> {
        self.names_in(|s| s.warrants_publish())
    }

    pub fn current(&self) -> Vec<ArtifactName> {
        self.names_in(|s| matches!(s, ArtifactState::Current))
    }

    pub fn missing(&self) -> Vec<ArtifactName> {
        self.names_in(|s| matches!(s, ArtifactState::Missing))
    }

    fn names_in(&self, pred: impl Fn(&ArtifactState) -> bool) -> Vec<ArtifactName> {
        self.states
            .iter()
            .filter(|(_, state)| pred(state))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Compare the staged snapshot against the last published content.
///
/// `previous` maps each artifact name to its content in the last publication,
/// or `None` if no publication carries it.
pub fn detect_changes(
    staged: &StagedSet,
    previous: &BTreeMap<ArtifactName, Option<String>>,
) -> ChangeReport {
    let mut states = BTreeMap::new();
    for (name, entry) in staged {
        let state = match entry {
            StagedArtifact::Absent => ArtifactState::Missing,
            StagedArtifact::Present { digest, .. } => {
                match previous.get(name).and_then(|p| p.as_deref()) {
                    None => ArtifactState::NeverPublished,
                    Some(published) if &content_digest(published) == digest => {
                        ArtifactState::Current
                    }
                    Some(_) => ArtifactState::Changed,
                }
            }
        };
        states.insert(name.clone(), state);
    }
    ChangeReport { states }
}

/// Human-readable age of a publication timestamp.
pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let secs = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
