//! `courier status` — per-artifact publication state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use courier_core::config;
use courier_core::types::PublisherConfig;
use courier_publish::detect::{detect_changes, format_age};
use courier_publish::{repo, stage, ArtifactState, StagedArtifact};

/// Arguments for `courier status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config")?;

        let report = build_report(&config)?;
        if self.json {
            print_json(report)?;
            return Ok(());
        }

        print_table(&config, report);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ArtifactStatus {
    name: String,
    state: ArtifactState,
    detail: String,
    prefixes: Option<usize>,
    last_published_age: String,
    last_published_at: Option<String>,
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummaryJson,
    artifacts: Vec<ArtifactStatusJson>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    artifacts: usize,
    pending: usize,
}

#[derive(Serialize)]
struct ArtifactStatusJson {
    name: String,
    state: String,
    detail: String,
    prefixes: Option<usize>,
    last_published_age: String,
    last_published_at: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "artifact")]
    artifact: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "prefixes")]
    prefixes: String,
    #[tabled(rename = "last published")]
    last_published: String,
}

fn build_report(config: &PublisherConfig) -> Result<Vec<ArtifactStatus>> {
    let repo_path = &config.repository;
    let staged = stage::stage_artifacts(repo_path, &config.artifacts)
        .context("failed to read artifacts from the working tree")?;
    let previous = repo::published_snapshot(repo_path, &config.artifacts)
        .context("failed to read the last publication")?;
    let changes = detect_changes(&staged, &previous);

    let mut rows = Vec::new();
    for spec in &config.artifacts {
        let state = changes.states[&spec.name];
        let prefixes = match &staged[&spec.name] {
            StagedArtifact::Present { content, .. } => Some(count_prefixes(content)),
            StagedArtifact::Absent => None,
        };
        let (last_published_at, last_published_age) =
            match repo::published_at(repo_path, &spec.name)
                .with_context(|| format!("failed to read publish history for '{}'", spec.name))?
            {
                Some(at) => (Some(at.to_rfc3339()), format_age(at)),
                None => (None, "never".to_string()),
            };

        rows.push(ArtifactStatus {
            name: spec.name.0.clone(),
            detail: state_detail(state),
            state,
            prefixes,
            last_published_age,
            last_published_at,
        });
    }
    Ok(rows)
}

fn count_prefixes(content: &str) -> usize {
    content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count()
}

fn print_json(rows: Vec<ArtifactStatus>) -> Result<()> {
    let pending = rows
        .iter()
        .filter(|r| r.state.warrants_publish())
        .count();
    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            artifacts: rows.len(),
            pending,
        },
        artifacts: rows
            .into_iter()
            .map(|row| ArtifactStatusJson {
                name: row.name,
                state: state_key(row.state).to_string(),
                detail: row.detail,
                prefixes: row.prefixes,
                last_published_age: row.last_published_age,
                last_published_at: row.last_published_at,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(config: &PublisherConfig, rows: Vec<ArtifactStatus>) {
    let pending = rows
        .iter()
        .filter(|r| r.state.warrants_publish())
        .count();

    println!(
        "courier v{} | {} | {} artifacts | {} pending",
        env!("CARGO_PKG_VERSION"),
        config.repository.display(),
        rows.len(),
        pending,
    );

    if rows.is_empty() {
        println!("No artifacts configured.");
        return;
    }

    let separator = "■".repeat(67).bright_black().to_string();
    println!("{separator}");
    println!(
        "Indicators: {} CURRENT  {} CHANGED  {} NEVER PUBLISHED  {} MISSING",
        state_indicator(ArtifactState::Current),
        state_indicator(ArtifactState::Changed),
        state_indicator(ArtifactState::NeverPublished),
        state_indicator(ArtifactState::Missing),
    );
    println!("{separator}");

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            artifact: row.name,
            state: state_label(row.state).to_string(),
            detail: row.detail,
            prefixes: row
                .prefixes
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            last_published: row.last_published_age,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if pending > 0 {
        println!("Run 'courier run' to publish pending changes.");
    }
}

fn state_key(state: ArtifactState) -> &'static str {
    match state {
        ArtifactState::NeverPublished => "never_published",
        ArtifactState::Current => "current",
        ArtifactState::Changed => "changed",
        ArtifactState::Missing => "missing",
    }
}

fn state_label(state: ArtifactState) -> &'static str {
    match state {
        ArtifactState::NeverPublished => "NEVER PUBLISHED",
        ArtifactState::Current => "CURRENT",
        ArtifactState::Changed => "CHANGED",
        ArtifactState::Missing => "MISSING",
    }
}

fn state_indicator(state: ArtifactState) -> String {
    match state {
        ArtifactState::NeverPublished => "■".bright_black().bold().to_string(),
        ArtifactState::Current => "■".green().bold().to_string(),
        ArtifactState::Changed => "■".yellow().bold().to_string(),
        ArtifactState::Missing => "■".magenta().bold().to_string(),
    }
}

fn state_detail(state: ArtifactState) -> String {
    match state {
        ArtifactState::NeverPublished => "not yet published".to_string(),
        ArtifactState::Current => "up to date".to_string(),
        ArtifactState::Changed => "differs from last publication".to_string(),
        ArtifactState::Missing => "not in working tree".to_string(),
    }
}
