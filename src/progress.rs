//! Progress reporting module for copy and import runs
//!
//! This module provides data structures and utilities for reporting
//! per-file progress to external callers (e.g. a GUI shell) via stderr,
//! one JSON object per line.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::ImportError;
use crate::models::{FileOutcome, ImportResult, SyncResult};

/// Which run a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// Device to staging
    Copy,
    /// Staging to archive
    Import,
}

/// Start message sent when a run begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    pub run: RunKind,
    /// Where files are read from
    pub source: String,
    /// Where files are written to
    pub dest: String,
}

impl StartMessage {
    /// Create a new start message
    pub fn new(seq: u64, ts: u64, run: RunKind, source: String, dest: String) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            run,
            source,
            dest,
        }
    }
}

/// Message sent after each file
#[derive(Debug, Clone, Serialize)]
pub struct FileMessage {
    /// Message type identifier ("f" for file)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// File name
    #[serde(rename = "n")]
    pub name: String,
    /// Outcome, or the skip reason
    #[serde(rename = "o")]
    pub outcome: String,
}

impl FileMessage {
    /// Create a new file message
    pub fn new(seq: u64, ts: u64, name: String, outcome: String) -> Self {
        Self {
            msg_type: "f",
            seq,
            ts,
            name,
            outcome,
        }
    }
}

/// Error message sent when an error occurs during a run
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error type/category
    pub error_type: String,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorProgressMessage {
    /// Create a new error progress message
    pub fn new(
        seq: u64,
        ts: u64,
        error_type: String,
        message: String,
        path: Option<String>,
    ) -> Self {
        Self {
            msg_type: "err",
            seq,
            ts,
            error_type,
            message,
            path,
        }
    }
}

/// Done message sent when a run completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    pub run: RunKind,
    /// Files copied (including overwrites for imports)
    #[serde(rename = "c")]
    pub copied: u64,
    /// Files already present
    #[serde(rename = "s")]
    pub skipped: u64,
    /// Files excluded by policy
    #[serde(rename = "p")]
    pub policy_skipped: u64,
    /// Number of failures
    #[serde(rename = "ec")]
    pub error_count: u64,
    /// Total run duration in milliseconds
    pub ms: u64,
}

impl DoneMessage {
    /// Summary of a device sync
    pub fn for_sync(seq: u64, ts: u64, result: &SyncResult) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            run: RunKind::Copy,
            copied: result.copied,
            skipped: result.skipped,
            policy_skipped: 0,
            error_count: result.error_count,
            ms: result.duration_ms,
        }
    }

    /// Summary of an import
    pub fn for_import(seq: u64, ts: u64, result: &ImportResult) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            run: RunKind::Import,
            copied: result.copied + result.overwritten,
            skipped: result.skipped,
            policy_skipped: result.policy_skipped,
            error_count: result.failed + result.error_count() as u64,
            ms: result.duration_ms,
        }
    }
}

/// Progress reporter for outputting run progress to stderr
///
/// Handles timing, sequence numbers, and formatting of the message types.
/// A disabled reporter is a no-op, so callers never need to branch.
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// A reporter that never writes
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    /// Report the start of a run
    pub fn report_start(&self, run: RunKind, source: &str, dest: &Path) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            run,
            source.to_string(),
            dest.to_string_lossy().to_string(),
        );
        self.output_to_stderr(&msg);
    }

    /// Report a single file with a free-form outcome
    pub fn report_file(&self, name: &str, outcome: &str) {
        if !self.enabled {
            return;
        }
        let msg = FileMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            name.to_string(),
            outcome.to_string(),
        );
        self.output_to_stderr(&msg);
    }

    /// Report an import log entry
    pub fn report_outcome(&self, outcome: &FileOutcome) {
        self.report_file(&outcome.name, &outcome.describe());
    }

    /// Report an error immediately
    pub fn report_error(&self, error: &ImportError) {
        if !self.enabled {
            return;
        }
        let msg = ErrorProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            format!("{:?}", error.kind),
            error.message.clone(),
            error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        );
        self.output_to_stderr(&msg);
    }

    /// Report completion of a device sync
    pub fn report_sync_done(&self, result: &SyncResult) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage::for_sync(self.next_seq(), self.current_timestamp(), result);
        self.output_to_stderr(&msg);
    }

    /// Report completion of an import
    pub fn report_import_done(&self, result: &ImportResult) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage::for_import(self.next_seq(), self.current_timestamp(), result);
        self.output_to_stderr(&msg);
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_kind_serialization() {
        assert_eq!(serde_json::to_string(&RunKind::Copy).unwrap(), "\"copy\"");
        assert_eq!(serde_json::to_string(&RunKind::Import).unwrap(), "\"import\"");
    }

    #[test]
    fn test_start_message_serialization() {
        let msg = StartMessage::new(
            1,
            100,
            RunKind::Import,
            "Staging".to_string(),
            "Photos".to_string(),
        );
        let parsed: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(parsed["_t"], "start");
        assert_eq!(parsed["seq"], 1);
        assert_eq!(parsed["ts"], 100);
        assert_eq!(parsed["run"], "import");
        assert_eq!(parsed["source"], "Staging");
        assert_eq!(parsed["dest"], "Photos");
    }

    #[test]
    fn test_file_message_serialization() {
        let msg = FileMessage::new(2, 200, "PXL_20230101_1.jpg".to_string(), "copied".to_string());
        let parsed: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(parsed["_t"], "f");
        assert_eq!(parsed["n"], "PXL_20230101_1.jpg");
        assert_eq!(parsed["o"], "copied");
    }

    #[test]
    fn test_error_message_without_path() {
        let msg = ErrorProgressMessage::new(
            1,
            100,
            "Timeout".to_string(),
            "File did not appear".to_string(),
            None,
        );
        let json = serde_json::to_string(&msg).unwrap();

        // path should not be present when None
        assert!(!json.contains("\"path\""));
    }

    #[test]
    fn test_done_message_for_import() {
        let result = ImportResult {
            copied: 3,
            overwritten: 1,
            skipped: 5,
            policy_skipped: 2,
            failed: 1,
            duration_ms: 42,
            ..Default::default()
        };
        let msg = DoneMessage::for_import(7, 500, &result);
        let parsed: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(parsed["_t"], "done");
        assert_eq!(parsed["run"], "import");
        assert_eq!(parsed["c"], 4);
        assert_eq!(parsed["s"], 5);
        assert_eq!(parsed["p"], 2);
        assert_eq!(parsed["ec"], 1);
        assert_eq!(parsed["ms"], 42);
    }

    #[test]
    fn test_done_message_for_sync() {
        let result = SyncResult {
            listed: 10,
            copied: 4,
            skipped: 5,
            error_count: 1,
            ..Default::default()
        };
        let parsed: serde_json::Value =
            serde_json::to_value(DoneMessage::for_sync(0, 0, &result)).unwrap();
        assert_eq!(parsed["run"], "copy");
        assert_eq!(parsed["c"], 4);
        assert_eq!(parsed["ec"], 1);
    }

    #[test]
    fn test_progress_reporter_sequence_numbers() {
        let reporter = ProgressReporter::new(true);

        // Sequence numbers should be monotonically increasing
        assert_eq!(reporter.next_seq(), 0);
        assert_eq!(reporter.next_seq(), 1);
        assert_eq!(reporter.next_seq(), 2);
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled();
        assert!(!reporter.is_enabled());

        reporter.report_start(RunKind::Copy, "Pixel 7", Path::new("Staging"));
        reporter.report_file("a.jpg", "copied");
        reporter.report_error(&ImportError::not_connected());
        reporter.report_sync_done(&SyncResult::default());

        // Sequence should not increment when disabled
        assert_eq!(reporter.next_seq(), 0);
    }
}
