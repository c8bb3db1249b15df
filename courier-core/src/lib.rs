//! Courier core library — domain types, publisher config persistence, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and config structs
//! - [`error`] — [`ConfigError`]
//! - [`config`] — load / save / init

pub mod config;
pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{
    AddressFamily, ArtifactName, ArtifactSpec, Asn, CommitterIdentity, ProducerSpec,
    PublisherConfig, Schedule,
};
