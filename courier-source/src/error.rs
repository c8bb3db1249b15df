//! Error types for courier-source.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from artifact production.
#[derive(Debug, Error)]
pub enum SourceError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Producer argv was empty.
    #[error("producer command is empty; configure `argv` with at least a program name")]
    EmptyCommand,

    /// The external producer program could not be spawned.
    #[error("failed to spawn producer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external producer ran but exited with a failure status.
    #[error("producer exited with {status}: {stderr}")]
    ProducerFailed { status: String, stderr: String },

    /// HTTP fetch of the route table failed.
    #[error("route table fetch failed: {0}")]
    Fetch(#[from] Box<ureq::Error>),

    /// The route table stream ended with a read error mid-body.
    #[error("route table stream error: {0}")]
    Stream(#[source] std::io::Error),

    /// The configured User-Agent still carries the placeholder contact.
    #[error("refusing to fetch: replace the placeholder contact address in the configured user_agent")]
    PlaceholderUserAgent,
}

/// Convenience constructor for [`SourceError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
