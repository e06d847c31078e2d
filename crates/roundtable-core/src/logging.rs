//! Append-only JSONL log of completed runs, with secret redaction.

use std::collections::HashSet;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::warn;

use crate::workflow::ResearchRecord;

const LOG_DIR_ENV: &str = "ROUNDTABLE_LOG_DIR";
const DEFAULT_LOG_DIR: &str = "data/logs";
const LOG_FILE: &str = "runs.jsonl";

static REDACTION_PATTERNS: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key".to_string(),
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "secret".to_string(),
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer".to_string(),
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token".to_string(),
            Regex::new(r"(sk-[A-Za-z0-9]{16,})").expect("invalid sk_token regex"),
        ),
    ]
});

#[derive(Serialize)]
struct RunLogRecord {
    timestamp: String,
    topic: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    redactions: Vec<String>,
}

fn log_path() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
        .join(LOG_FILE)
}

fn sanitize_text(input: &str, redactions: &mut HashSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(name.clone());
        }
    }
    output
}

/// Append a sanitized single-line summary of the run outcome.
pub fn log_run_completion(record: &ResearchRecord) -> Result<()> {
    let mut redactions = HashSet::new();

    let entry = match record {
        ResearchRecord::Completed(record) => RunLogRecord {
            timestamp: Utc::now().to_rfc3339(),
            topic: sanitize_text(&record.topic, &mut redactions),
            status: "completed",
            duration_seconds: Some(record.duration_seconds),
            messages: Some(record.messages.len()),
            sources: Some(record.results.sources.len()),
            error: None,
            redactions: Vec::new(),
        },
        ResearchRecord::Failed(record) => RunLogRecord {
            timestamp: Utc::now().to_rfc3339(),
            topic: sanitize_text(&record.topic, &mut redactions),
            status: "failed",
            duration_seconds: None,
            messages: None,
            sources: None,
            error: Some(sanitize_text(&record.error, &mut redactions)),
            redactions: Vec::new(),
        },
    };

    let entry = RunLogRecord {
        redactions: redactions.iter().cloned().collect(),
        ..entry
    };

    if !entry.redactions.is_empty() {
        warn!(fields = ?entry.redactions, "redacted potential secrets from run log");
    }

    let path = log_path();
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(&entry)?;
    writeln!(writer, "{line}")
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
