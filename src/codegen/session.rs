//! Batch write-back with an outcome report
//!
//! A [`WriteBackSession`] drives many requests through one [`Validator`] and
//! keeps a [`BatchReport`] so tooling can say how many files were really
//! written. Errors still propagate from `submit`; they are recorded as well so
//! a driver that chooses to continue can report them.

use super::checkout::{AsyncCheckout, Checkout};
use super::compare::Outcome;
use super::writeback::{Validator, WriteRequest};
use crate::error::WriteBackResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Per-file status in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Changed,
    Unchanged,
    Failed,
}

impl From<Outcome> for EntryStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Changed => EntryStatus::Changed,
            Outcome::Unchanged => EntryStatus::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub path: PathBuf,
    pub status: EntryStatus,
    /// SHA-256 of the generated text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            dry_run,
            entries: Vec::new(),
        }
    }

    fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Files written (or, for a dry run, that would be written)
    pub fn written(&self) -> usize {
        self.count(EntryStatus::Changed)
    }

    pub fn unchanged(&self) -> usize {
        self.count(EntryStatus::Unchanged)
    }

    pub fn failed(&self) -> usize {
        self.count(EntryStatus::Failed)
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn changed_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Changed)
            .map(|e| e.path.as_path())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let written = self.written();
        let noun = if written == 1 { "file" } else { "files" };
        let verb = if self.dry_run { "would be written" } else { "written" };
        write!(
            f,
            "{written} {noun} {verb}, {} unchanged, {} failed",
            self.unchanged(),
            self.failed()
        )
    }
}

/// Runs requests through a validator and records every outcome
#[derive(Debug)]
pub struct WriteBackSession<C> {
    validator: Validator<C>,
    report: BatchReport,
    dry_run: bool,
}

impl<C> WriteBackSession<C> {
    pub fn new(validator: Validator<C>) -> Self {
        Self {
            validator,
            report: BatchReport::new(false),
            dry_run: false,
        }
    }

    /// Compare only: requests are never checked out or written.
    pub fn dry_run(validator: Validator<C>) -> Self {
        Self {
            validator,
            report: BatchReport::new(true),
            dry_run: true,
        }
    }

    pub fn validator(&self) -> &Validator<C> {
        &self.validator
    }

    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    pub fn finish(self) -> BatchReport {
        self.report
    }

    /// Record a file that never became a request (e.g. unreadable input).
    pub fn record_failure(&mut self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.report.entries.push(ReportEntry {
            path: path.into(),
            status: EntryStatus::Failed,
            sha256: None,
            bytes: 0,
            error: Some(message.into()),
        });
    }

    fn record(&mut self, request: &WriteRequest, result: &WriteBackResult<Outcome>) {
        let (status, error) = match result {
            Ok(outcome) => (EntryStatus::from(*outcome), None),
            Err(err) => (EntryStatus::Failed, Some(error_chain(err))),
        };
        self.report.entries.push(ReportEntry {
            path: request.destination().to_path_buf(),
            status,
            sha256: Some(compute_string_hash(request.text())),
            bytes: request.text().len(),
            error,
        });
    }
}

impl<C: Checkout> WriteBackSession<C> {
    pub fn submit(&mut self, request: &WriteRequest) -> WriteBackResult<Outcome> {
        let result = if self.dry_run {
            self.validator.compare(request)
        } else {
            self.validator.validate(request)
        };
        self.record(request, &result);
        result
    }
}

impl<C: AsyncCheckout> WriteBackSession<C> {
    pub async fn submit_async(&mut self, request: &WriteRequest) -> WriteBackResult<Outcome> {
        let result = if self.dry_run {
            self.validator.compare_async(request).await
        } else {
            self.validator.validate_async(request).await
        };
        self.record(request, &result);
        result
    }
}

/// Compute SHA-256 hash of string
pub fn compute_string_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, status: EntryStatus) -> ReportEntry {
        ReportEntry {
            path: PathBuf::from(path),
            status,
            sha256: None,
            bytes: 0,
            error: None,
        }
    }

    #[test]
    fn summary_counts_each_status() {
        let mut report = BatchReport::new(false);
        report.entries.push(entry("a.rs", EntryStatus::Changed));
        report.entries.push(entry("b.rs", EntryStatus::Unchanged));
        report.entries.push(entry("c.rs", EntryStatus::Unchanged));
        report.entries.push(entry("d.rs", EntryStatus::Failed));

        assert_eq!(report.total(), 4);
        assert_eq!(report.to_string(), "1 file written, 2 unchanged, 1 failed");
        assert_eq!(report.changed_paths().collect::<Vec<_>>(), vec![Path::new("a.rs")]);
    }

    #[test]
    fn dry_run_summary_says_would_be_written() {
        let mut report = BatchReport::new(true);
        report.entries.push(entry("a.rs", EntryStatus::Changed));
        report.entries.push(entry("b.rs", EntryStatus::Changed));

        assert_eq!(report.to_string(), "2 files would be written, 0 unchanged, 0 failed");
    }

    #[test]
    fn compute_string_hash_is_stable() {
        let hash1 = compute_string_hash("test content");
        let hash2 = compute_string_hash("test content");
        let hash3 = compute_string_hash("different content");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn report_json_omits_empty_fields() {
        let mut report = BatchReport::new(false);
        report.entries.push(entry("a.rs", EntryStatus::Unchanged));

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"unchanged\""));
        assert!(!json.contains("\"error\""));

        let parsed: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
