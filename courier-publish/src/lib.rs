//! # courier-publish
//!
//! Stage, detect-change, and conditionally publish artifact files into a git
//! repository. Call [`pipeline::run`] for one full run: produce → stage →
//! detect → publish. A run with no content changes performs no publish and
//! succeeds; a run that publishes creates exactly one dated commit and pushes
//! it.

pub mod detect;
pub mod diff;
pub mod error;
pub mod lease;
pub mod pipeline;
pub mod repo;
pub mod stage;

pub use detect::{ArtifactState, ChangeReport};
pub use error::PublishError;
pub use pipeline::{commit_label, run, PublicationRecord, RunOptions, RunOutcome, RunReport};
pub use stage::{StagedArtifact, StagedSet};
