//! `courier init <repository> [--committer-name …] [--committer-email …] [--hour-utc …]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use courier_core::config;

/// Register the publish target repository.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Absolute or relative path to the git working tree to publish into.
    pub repository: PathBuf,

    /// Display name used as the author of publication commits.
    #[arg(long)]
    pub committer_name: Option<String>,

    /// Email used as the author of publication commits.
    #[arg(long)]
    pub committer_email: Option<String>,

    /// Daily fire hour (UTC).
    #[arg(long)]
    pub hour_utc: Option<u32>,

    /// Daily fire minute (UTC).
    #[arg(long)]
    pub minute_utc: Option<u32>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let repository = self
            .repository
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.repository.display()))?;

        let mut config = config::init(repository.clone())
            .with_context(|| format!("failed to init for '{}'", repository.display()))?;

        let mut edited = false;
        if let Some(name) = self.committer_name {
            config.committer.name = name;
            edited = true;
        }
        if let Some(email) = self.committer_email {
            config.committer.email = email;
            edited = true;
        }
        if let Some(hour) = self.hour_utc {
            config.schedule.hour_utc = hour;
            edited = true;
        }
        if let Some(minute) = self.minute_utc {
            config.schedule.minute_utc = minute;
            edited = true;
        }
        if edited {
            config.updated_at = Utc::now();
            config::save(&config).context("failed to save config")?;
        }

        println!("✓ Registered '{}'", config.repository.display());
        println!(
            "  {} artifact(s), daily at {:02}:{:02} UTC",
            config.artifacts.len(),
            config.schedule.hour_utc,
            config.schedule.minute_utc
        );
        println!("  Saved to: ~/.courier/config.yaml");
        Ok(())
    }
}
