use std::collections::HashSet;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::warn;

const LOG_DIR_ENV: &str = "CREWFLOW_LOG_DIR";
const DEFAULT_LOG_DIR: &str = "data/logs";

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

/// Completed-session fields worth keeping on disk.
#[derive(Debug, Clone)]
pub struct SessionLogInput {
    pub session_id: String,
    pub question: Option<String>,
    pub report: String,
    pub sources: Vec<String>,
    pub trace_path: Option<String>,
}

#[derive(Serialize)]
struct SessionLogRecord {
    timestamp: String,
    session_id: String,
    question: Option<String>,
    report: String,
    sources: Vec<String>,
    trace_path: Option<String>,
    redactions: Vec<String>,
}

fn log_base_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{line}")
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn sanitize_text(input: &str, redactions: &mut HashSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                // Two-group patterns keep their context prefix; a
                // single-group match is the secret itself and is
                // replaced wholesale.
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

/// Append a sanitized completion record under `$CREWFLOW_LOG_DIR` (default
/// `data/logs`), partitioned as `YYYY/MM/session.jsonl`.
pub fn log_session_completion(input: SessionLogInput) -> Result<()> {
    log_session_completion_to(&log_base_dir(), input)
}

pub fn log_session_completion_to(base_dir: &Path, input: SessionLogInput) -> Result<()> {
    let timestamp = Utc::now();
    let mut redactions = HashSet::new();

    let question = input
        .question
        .as_deref()
        .map(|value| sanitize_text(value, &mut redactions));
    let report = sanitize_text(&input.report, &mut redactions);
    let sources: Vec<String> = input
        .sources
        .into_iter()
        .map(|source| sanitize_text(&source, &mut redactions))
        .collect();

    let record = SessionLogRecord {
        timestamp: timestamp.to_rfc3339(),
        session_id: input.session_id.clone(),
        question,
        report,
        sources,
        trace_path: input.trace_path,
        redactions: redactions.iter().cloned().collect(),
    };

    let month_dir = base_dir
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()));
    let session_log_path = month_dir.join("session.jsonl");
    append_json_line(&session_log_path, &record)?;

    if !record.redactions.is_empty() {
        warn!(
            session_id = %input.session_id,
            fields = ?record.redactions,
            "redacted potential secrets from session log"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn session_logging_sanitizes_and_persists() -> Result<()> {
        let temp = TempDir::new().expect("temp dir");

        let input = SessionLogInput {
            session_id: "test-session".to_string(),
            question: Some("Find api_key=abcd1234".to_string()),
            report: "Report mentioning secret=topsecret".to_string(),
            sources: vec!["sk-abcdef1234567890".to_string()],
            trace_path: Some("data/traces/test.json".to_string()),
        };

        log_session_completion_to(temp.path(), input)?;

        let year_dir = temp.path().read_dir()?.next().unwrap()?.path();
        let month_dir = year_dir.read_dir()?.next().unwrap()?.path();
        let session_log = month_dir.join("session.jsonl");
        assert!(session_log.exists());

        let line = std::fs::read_to_string(&session_log)?;
        let record: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(record["session_id"], "test-session");
        assert!(record["report"].as_str().unwrap().contains("[REDACTED]"));
        assert!(record["question"].as_str().unwrap().contains("[REDACTED]"));
        assert_eq!(record["sources"][0], "[REDACTED]");
        assert!(!line.contains("sk-abcdef1234567890"));
        assert!(!record["redactions"].as_array().unwrap().is_empty());

        Ok(())
    }

    #[test]
    fn sk_tokens_are_replaced_wholesale() {
        let mut redactions = HashSet::new();
        let sanitized = sanitize_text(
            "report quoting sk-abcdefghijklmnop123456 verbatim",
            &mut redactions,
        );
        assert_eq!(sanitized, "report quoting [REDACTED] verbatim");
        assert!(!sanitized.contains("sk-"));
        assert!(redactions.contains("sk_token"));
    }

    #[test]
    fn bearer_tokens_keep_their_prefix() {
        let mut redactions = HashSet::new();
        let sanitized = sanitize_text("Authorization: Bearer abc123DEF", &mut redactions);
        assert_eq!(sanitized, "Authorization: Bearer [REDACTED]");
        assert!(redactions.contains("bearer"));
    }
}
