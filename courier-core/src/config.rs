//! Publisher config persistence.
//!
//! # Storage layout
//!
//! ```text
//! ~/.courier/
//!   config.yaml   (mode 0600, created on first init)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ConfigError;
use crate::types::{
    default_table_url, AddressFamily, ArtifactName, ArtifactSpec, Asn, CommitterIdentity,
    ProducerSpec, PublisherConfig, Schedule, PLACEHOLDER_CONTACT,
};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.courier/` — pure, no I/O.
pub fn courier_root_at(home: &Path) -> PathBuf {
    home.join(".courier")
}

/// `<home>/.courier/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    courier_root_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the publisher config from `<home>/.courier/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<PublisherConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<PublisherConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the publisher config to `<home>/.courier/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
pub fn save_at(home: &Path, config: &PublisherConfig) -> Result<(), ConfigError> {
    let root = courier_root_at(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }

    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &PublisherConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Register `repository` as the publish target and write the default config.
///
/// Idempotent: if a config already exists, loads and returns it unchanged.
pub fn init_at(repository: PathBuf, home: &Path) -> Result<PublisherConfig, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }

    let config = default_config(repository);
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init(repository: PathBuf) -> Result<PublisherConfig, ConfigError> {
    init_at(repository, &home()?)
}

/// The out-of-the-box config: two artifacts (IPv4 + IPv6) collecting the
/// announced prefixes of AS4134 (Chinanet) and AS56040 (China Mobile), built-in
/// producer, daily fire at 03:00 UTC.
pub fn default_config(repository: PathBuf) -> PublisherConfig {
    let now = Utc::now();
    let asns = vec![Asn(4134), Asn(56040)];
    PublisherConfig {
        version: 1,
        repository,
        remote: "origin".to_string(),
        branch: "main".to_string(),
        committer: CommitterIdentity {
            name: "courier".to_string(),
            email: "courier@localhost".to_string(),
        },
        schedule: Schedule {
            hour_utc: 3,
            minute_utc: 0,
        },
        producer: ProducerSpec::Builtin {
            url: default_table_url(),
            user_agent: format!("courier/{} ({PLACEHOLDER_CONTACT})", env!("CARGO_PKG_VERSION")),
        },
        artifacts: vec![
            ArtifactSpec {
                name: ArtifactName::from("cn_asn_ipv4.txt"),
                family: AddressFamily::Ipv4,
                asns: asns.clone(),
            },
            ArtifactSpec {
                name: ArtifactName::from("cn_asn_ipv6.txt"),
                family: AddressFamily::Ipv6,
                asns,
            },
        ],
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
