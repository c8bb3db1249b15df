//! `courier diff` — unified diffs of what a publish would record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use courier_core::config;
use courier_publish::diff::preview;

/// Arguments for `courier diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config")?;

        let diffs = preview(&config.repository, &config.artifacts).context("diff failed")?;

        if diffs.is_empty() {
            println!("No differences against the last publication.");
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
