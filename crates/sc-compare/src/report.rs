//! Comparison reporting. Runs the alignment over every client record and
//! renders the outcome for the console, a plain-text report file and JSON.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::align::{MatchPath, ServerIndex};
use crate::diff::{DiffList, FieldDiff, compare_records};
use crate::record::{Record, Timestamp, time_label};
use crate::tolerance::ToleranceTable;

/// Report file written next to where the tool runs.
pub const DEFAULT_REPORT_PATH: &str = "scoring_compare_report.txt";

/// What happened to one client record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Diff { diffs: Vec<FieldDiff> },
    Missing,
}

impl Outcome {
    pub fn is_mismatch(&self) -> bool {
        !matches!(self, Outcome::Ok)
    }
}

/// Outcome for a single client record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub time: Option<Timestamp>,
    /// Position of the matched server record.
    pub server_index: Option<usize>,
    pub matched_by: Option<MatchPath>,
    pub outcome: Outcome,
}

impl core::fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let time = time_label(self.time.as_ref());
        match &self.outcome {
            Outcome::Ok => write!(f, "OK time={}", time),
            Outcome::Diff { diffs } => write!(f, "DIFF time={} diffs={}", time, DiffList(diffs)),
            Outcome::Missing => write!(f, "No matching server entry for client time={}", time),
        }
    }
}

/// The first client record that did not match cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstMismatch {
    pub client: Record,
    /// `None` when no server record matched.
    pub server: Option<Record>,
    pub diffs: Vec<FieldDiff>,
}

/// Result of comparing a client dump against a server dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Client records compared.
    pub total: usize,
    /// Client records with diffs or without a server match.
    pub mismatches: usize,
    /// Server records that lost their index slot to a later record.
    pub index_collisions: usize,
    pub tolerances: ToleranceTable,
    pub first_mismatch: Option<FirstMismatch>,
    pub entries: Vec<ReportEntry>,
}

impl ComparisonReport {
    /// Align every client record against the server dump and compare.
    pub fn compare(client: &[Record], server: &[Record], tolerances: &ToleranceTable) -> Self {
        let index = ServerIndex::build(server);
        let mut report = Self {
            total: 0,
            mismatches: 0,
            index_collisions: index.collisions(),
            tolerances: tolerances.clone(),
            first_mismatch: None,
            entries: Vec::with_capacity(client.len()),
        };

        for c in client {
            report.total += 1;

            let Some(found) = index.find(c) else {
                tracing::debug!(time = %c.time_label(), "no server match");
                report.record_mismatch(c, None, Vec::new());
                report.entries.push(ReportEntry {
                    time: c.time.clone(),
                    server_index: None,
                    matched_by: None,
                    outcome: Outcome::Missing,
                });
                continue;
            };

            tracing::debug!(
                time = %c.time_label(),
                server_index = found.index,
                path = %found.path,
                "matched server record"
            );

            let diffs = compare_records(c, found.record, tolerances);
            let outcome = if diffs.is_empty() {
                Outcome::Ok
            } else {
                report.record_mismatch(c, Some(found.record), diffs.clone());
                Outcome::Diff { diffs }
            };
            report.entries.push(ReportEntry {
                time: c.time.clone(),
                server_index: Some(found.index),
                matched_by: Some(found.path),
                outcome,
            });
        }

        tracing::info!(
            total = report.total,
            mismatches = report.mismatches,
            server_records = server.len(),
            "comparison finished"
        );
        report
    }

    fn record_mismatch(&mut self, client: &Record, server: Option<&Record>, diffs: Vec<FieldDiff>) {
        self.mismatches += 1;
        if self.first_mismatch.is_none() {
            self.first_mismatch = Some(FirstMismatch {
                client: client.clone(),
                server: server.cloned(),
                diffs,
            });
        }
    }

    /// True if every client record matched within tolerance.
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Compared {} entries. Mismatches: {}.",
            self.total, self.mismatches
        )
    }

    /// Summary and first-mismatch detail for the terminal.
    pub fn render_console(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.summary_line());

        if let Some(first) = &self.first_mismatch {
            let _ = writeln!(out, "\nFirst mismatch:");
            match &first.server {
                None => {
                    let _ = writeln!(
                        out,
                        "Client entry missing match on server: {}",
                        compact_json(&first.client)
                    );
                }
                Some(server) => {
                    let _ = writeln!(out, "Client: {}", pretty_json(&first.client));
                    let _ = writeln!(out, "Server: {}", pretty_json(server));
                    let _ = writeln!(out, "Diffs: {}", DiffList(&first.diffs));
                }
            }
        }
        out
    }

    /// Print the console rendering to stdout.
    pub fn print_summary(&self) {
        print!("{}", self.render_console());
    }

    /// Summary line, a blank line, then one line per client record.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.summary_line());
        for entry in &self.entries {
            let _ = writeln!(out, "{}", entry);
        }
        out
    }

    pub fn write_text(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, self.render_text())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, self.to_json())
    }
}

fn pretty_json(record: &Record) -> String {
    serde_json::to_string_pretty(record).unwrap_or_else(|e| format!("<unprintable record: {}>", e))
}

fn compact_json(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_else(|e| format!("<unprintable record: {}>", e))
}
