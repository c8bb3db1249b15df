//! Built-in route table producer.
//!
//! Streams the bgp.tools JSONL table (one `{"CIDR": …, "ASN": …}` object per
//! line), collects the prefixes announced by each artifact's ASN set into a
//! sorted, deduplicated set, and writes each artifact atomically.
//!
//! Output is byte-stable for identical table data: headers carry only the ASN
//! set and source URL, never a timestamp, so an unchanged table produces an
//! unchanged file.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use courier_core::types::{AddressFamily, ArtifactSpec, PLACEHOLDER_CONTACT};

use crate::error::{io_err, SourceError};
use crate::{ProduceReport, Producer, SkippedArtifact};

/// Host-level timeout for the table download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// One route table row. Rows missing either field fail to parse and are
/// skipped; the table carries other fields courier does not read.
#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(rename = "CIDR")]
    cidr: String,
    #[serde(rename = "ASN")]
    asn: u32,
}

/// Fetches and filters the route table natively.
#[derive(Debug, Clone)]
pub struct BgpTableProducer {
    url: String,
    user_agent: String,
}

impl BgpTableProducer {
    pub fn new(url: String, user_agent: String) -> Self {
        Self { url, user_agent }
    }
}

impl Producer for BgpTableProducer {
    fn produce(
        &self,
        repo: &Path,
        artifacts: &[ArtifactSpec],
    ) -> Result<ProduceReport, SourceError> {
        if self.user_agent.contains(PLACEHOLDER_CONTACT) {
            return Err(SourceError::PlaceholderUserAgent);
        }

        tracing::info!("fetching route table from {}", self.url);
        let agent = ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build();
        let response = agent
            .get(&self.url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| SourceError::Fetch(Box::new(e)))?;

        let reader = BufReader::new(response.into_reader());
        let routes = collect_routes(reader, artifacts)?;

        let mut report = ProduceReport::default();
        for (spec, cidrs) in artifacts.iter().zip(routes) {
            if cidrs.is_empty() {
                tracing::warn!("no routes matched for {}", spec.name);
                report.skipped.push(SkippedArtifact {
                    name: spec.name.clone(),
                    reason: "no routes matched".to_string(),
                });
                continue;
            }

            let content = render_artifact(spec, &self.url, &cidrs);
            match write_artifact(&repo.join(&spec.name.0), &content) {
                Ok(()) => {
                    tracing::info!("wrote {} ({} prefixes)", spec.name, cidrs.len());
                    report.written.push(spec.name.clone());
                }
                Err(err) => {
                    tracing::warn!("failed to write {}: {err}", spec.name);
                    report.skipped.push(SkippedArtifact {
                        name: spec.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

/// Stream the table once and bucket matching prefixes per artifact.
///
/// Malformed lines are counted and skipped, matching upstream's tolerance for
/// the occasional bad row in a multi-million-line feed.
fn collect_routes<R: BufRead>(
    reader: R,
    artifacts: &[ArtifactSpec],
) -> Result<Vec<BTreeSet<String>>, SourceError> {
    let mut buckets: Vec<BTreeSet<String>> = vec![BTreeSet::new(); artifacts.len()];
    let mut malformed = 0usize;
    let mut processed = 0usize;

    for line in reader.lines() {
        let line = line.map_err(SourceError::Stream)?;
        if line.is_empty() {
            continue;
        }
        processed += 1;

        let row: TableRow = match serde_json::from_str(&line) {
            Ok(row) => row,
            Err(_) => {
                malformed += 1;
                continue;
            }
        };

        for (spec, bucket) in artifacts.iter().zip(buckets.iter_mut()) {
            if family_matches(spec.family, &row.cidr)
                && spec.asns.iter().any(|asn| asn.0 == row.asn)
            {
                bucket.insert(row.cidr.clone());
            }
        }
    }

    if malformed > 0 {
        tracing::warn!("skipped {malformed} malformed table rows out of {processed}");
    }
    Ok(buckets)
}

/// The table serves prefixes as opaque strings; dotted notation means IPv4.
fn family_matches(family: AddressFamily, cidr: &str) -> bool {
    match family {
        AddressFamily::Ipv4 => cidr.contains('.'),
        AddressFamily::Ipv6 => !cidr.contains('.'),
    }
}

/// Render an artifact body: static header block, then one prefix per line.
fn render_artifact(spec: &ArtifactSpec, url: &str, cidrs: &BTreeSet<String>) -> String {
    let asns = spec
        .asns
        .iter()
        .map(|asn| format!("AS{asn}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str(&format!("# {} prefixes announced by {}\n", spec.family, asns));
    out.push_str(&format!("# Data sourced from {url}\n"));
    out.push_str("# ASN registration does not guarantee geographic precision.\n");
    out.push_str("#-----------------------------------------------------------\n");
    for cidr in cidrs {
        out.push_str(cidr);
        out.push('\n');
    }
    out
}

/// Write `content` to `path` via a `.courier.tmp` sibling and atomic rename.
fn write_artifact(path: &Path, content: &str) -> Result<(), SourceError> {
    let tmp = PathBuf::from(format!("{}.courier.tmp", path.display()));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
