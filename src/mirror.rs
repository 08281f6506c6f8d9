//! Mirror a staged tree of generated files into a destination tree
//!
//! Generators write into a scratch directory; the mirror pushes each file
//! through the validator so untouched destination files keep their bytes,
//! timestamps and version-control state.

use crate::codegen::{
    BatchReport, CheckoutStrategy, NoCheckout, Validator, WriteBackSession, WriteRequest,
};
use crate::config::MirrorConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file found under the source directory
#[derive(Debug)]
pub enum StagedFile {
    Ready {
        relative: PathBuf,
        request: WriteRequest,
    },
    /// Present but not readable as UTF-8 text
    Unreadable { source: PathBuf, reason: String },
}

/// Walk `source_dir` and build requests for every included file.
///
/// Entries are sorted by path so reports are stable between runs.
pub fn collect_staged(config: &MirrorConfig) -> Result<Vec<StagedFile>> {
    let include = config.include_set()?;
    let mut staged = Vec::new();

    for entry in WalkDir::new(&config.source_dir).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("failed to walk source directory {:?}", config.source_dir))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&config.source_dir)
            .with_context(|| format!("{:?} is outside the source directory", entry.path()))?
            .to_path_buf();
        if !include.is_match(&relative) {
            continue;
        }

        match std::fs::read_to_string(entry.path()) {
            Ok(text) => {
                let request = WriteRequest::new(text, config.dest_dir.join(&relative));
                staged.push(StagedFile::Ready { relative, request });
            }
            Err(err) => {
                tracing::warn!(
                    path = %entry.path().display(),
                    error = %err,
                    "skipping unreadable staged file"
                );
                staged.push(StagedFile::Unreadable {
                    source: entry.path().to_path_buf(),
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        count = staged.len(),
        source = %config.source_dir.display(),
        "collected staged files"
    );
    Ok(staged)
}

/// Mirror with the blocking validator.
pub fn mirror_tree(config: &MirrorConfig) -> Result<BatchReport> {
    let mut session = new_session(config);

    for staged in collect_staged(config)? {
        match staged {
            StagedFile::Ready { relative, request } => {
                if let Err(error) = session.submit(&request) {
                    tracing::warn!(path = %relative.display(), %error, "write-back failed");
                }
            }
            StagedFile::Unreadable { source, reason } => session.record_failure(source, reason),
        }
    }

    let report = session.finish();
    tracing::info!(summary = %report, "mirror complete");
    Ok(report)
}

/// Mirror with the cooperative validator.
pub async fn mirror_tree_async(config: &MirrorConfig) -> Result<BatchReport> {
    let mut session = new_session(config);

    for staged in collect_staged(config)? {
        match staged {
            StagedFile::Ready { relative, request } => {
                if let Err(error) = session.submit_async(&request).await {
                    tracing::warn!(path = %relative.display(), %error, "write-back failed");
                }
            }
            StagedFile::Unreadable { source, reason } => session.record_failure(source, reason),
        }
    }

    let report = session.finish();
    tracing::info!(summary = %report, "mirror complete");
    Ok(report)
}

/// Persist `report` as pretty JSON at `path` through a plain validator.
pub fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = report.to_json().context("failed to serialize report")?;
    Validator::new(NoCheckout)
        .validate(&WriteRequest::new(json, path))
        .with_context(|| format!("failed to write report {:?}", path))?;
    Ok(())
}

fn new_session(config: &MirrorConfig) -> WriteBackSession<CheckoutStrategy> {
    let validator = Validator::from_config(&config.writeback);
    if config.dry_run {
        WriteBackSession::dry_run(validator)
    } else {
        WriteBackSession::new(validator)
    }
}
