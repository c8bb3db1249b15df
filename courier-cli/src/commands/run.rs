//! `courier run` — one produce → stage → detect → publish cycle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use courier_core::config;
use courier_publish::{pipeline, RunOptions, RunOutcome, RunReport};

/// Arguments for `courier run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Detect and report what would be published without committing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config")?;

        let report = pipeline::run(
            &home,
            &config,
            RunOptions {
                dry_run: self.dry_run,
            },
        )
        .context("run failed")?;

        print_report(&report, self.dry_run);
        Ok(())
    }
}

fn print_report(report: &RunReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };

    match &report.outcome {
        RunOutcome::NoChange => {
            println!("{prefix}✓ nothing to publish — all artifacts match the last publication");
        }
        RunOutcome::WouldPublish { changed } => {
            println!("{prefix}✓ would publish {} artifact(s)", changed.len());
        }
        RunOutcome::Published { record } => {
            println!(
                "{prefix}✓ published '{}' ({})",
                record.label,
                &record.commit[..12.min(record.commit.len())]
            );
        }
    }

    for (name, state) in &report.changes.states {
        use courier_publish::ArtifactState::*;
        match state {
            Changed | NeverPublished => println!("  ✎  {name}"),
            Current => println!("  ·  {name}"),
            Missing => println!("  ∅  {name} (not produced)"),
        }
    }

    for skip in &report.produced.skipped {
        println!("  !  {} skipped: {}", skip.name, skip.reason);
    }
}
