//! Error types for courier-publish.

use std::path::PathBuf;

use thiserror::Error;

use courier_core::error::ConfigError;
use courier_source::SourceError;

/// All errors that can arise from staging and publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The production step failed as a whole; staging never ran.
    #[error("production failed: {0}")]
    Production(#[from] SourceError),

    /// An error from the config layer.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (lease payload).
    #[error("lease JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured repository path is not a git working tree.
    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    /// A git command failed (anything but push).
    #[error("git {context} failed ({status}): {stderr}")]
    Git {
        context: &'static str,
        status: String,
        stderr: String,
    },

    /// The push to the durable store was rejected; the run fails and the next
    /// scheduled run retries from scratch.
    #[error("push to {remote}/{branch} rejected: {stderr}")]
    PushRejected {
        remote: String,
        branch: String,
        stderr: String,
    },

    /// Another run holds the publish lease.
    #[error("publish lease held by another run (pid {holder_pid}, {held_for_secs}s old): {path}")]
    LeaseHeld {
        path: PathBuf,
        holder_pid: u32,
        held_for_secs: u64,
    },
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}
