//! Domain types for the courier publisher config.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for an artifact file published into the repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactName(pub String);

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ArtifactName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed Autonomous System Number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asn(pub u32);

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for Asn {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The IP address family an artifact covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// How artifact content gets produced on each run.
///
/// `command` runs an external program in the repository working tree and
/// expects it to (over)write the artifact files itself. `builtin` fetches the
/// route table natively and writes the artifacts directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProducerSpec {
    Command {
        /// Program and arguments, e.g. `["python3", "scripts/filter_ips.py"]`.
        argv: Vec<String>,
    },
    Builtin {
        /// Route table endpoint serving one JSON object per line.
        #[serde(default = "default_table_url")]
        url: String,
        /// Descriptive User-Agent the endpoint requires. The producer refuses
        /// to run until the placeholder contact address is replaced.
        user_agent: String,
    },
}

pub(crate) fn default_table_url() -> String {
    "https://bgp.tools/table.jsonl".to_string()
}

/// Marker substring in the default User-Agent that must be edited away before
/// the builtin producer will fetch anything.
pub const PLACEHOLDER_CONTACT: &str = "set-a-contact@example.com";

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A single artifact file tracked by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// File name relative to the repository root.
    pub name: ArtifactName,
    pub family: AddressFamily,
    /// ASNs whose announced prefixes this artifact collects.
    pub asns: Vec<Asn>,
}

/// Fixed author identity applied to every publication commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
}

/// Daily fire time, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub hour_utc: u32,
    #[serde(default)]
    pub minute_utc: u32,
}

/// Root of the courier YAML config at `~/.courier/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub version: u32,
    /// Absolute path to the git working tree artifacts are published into.
    pub repository: PathBuf,
    pub remote: String,
    pub branch: String,
    pub committer: CommitterIdentity,
    pub schedule: Schedule,
    pub producer: ProducerSpec,
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
