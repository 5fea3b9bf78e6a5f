//! Core data models for copy and import runs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::ImportError;
use crate::naming::DateKey;

/// A file listed in the device camera folder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFile {
    /// File name, unique within the folder
    pub name: String,
    /// Size reported by the device, 0 when it could not be read
    pub size: u64,
}

impl DeviceFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Verdict of the size check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationResult {
    pub qualified: bool,
    /// Empty when qualified
    pub reason: String,
}

impl QualificationResult {
    /// A file that passed every check
    pub fn accepted() -> Self {
        Self {
            qualified: true,
            reason: String::new(),
        }
    }

    /// A file excluded by policy
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            qualified: false,
            reason: reason.into(),
        }
    }
}

/// What happened to a single file that reached the copy step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    /// No file of that name existed at the destination
    Copied,
    /// Same name and size already present, nothing done
    Skipped,
    /// Same name with a different size, replaced
    Overwritten,
    /// Copy attempted and failed
    Failed,
}

impl TransferOutcome {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Copied => "copied",
            TransferOutcome::Skipped => "skipped",
            TransferOutcome::Overwritten => "overwritten",
            TransferOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a file was intentionally left out of an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule", content = "detail")]
pub enum SkipReason {
    /// Smaller than the configured threshold
    TooSmall(String),
    /// No date could be read from the name
    UnparseableName,
    /// Not a regular file
    NotAFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooSmall(reason) => write!(f, "{}", reason),
            SkipReason::UnparseableName => write!(f, "Error parsing file name"),
            SkipReason::NotAFile => write!(f, "Not a regular file"),
        }
    }
}

/// Final state of one source entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FileStatus {
    /// Reached the copy step
    Transferred {
        outcome: TransferOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Excluded by a business rule
    PolicySkip { reason: SkipReason },
}

/// One line of the import log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Source file name
    pub name: String,
    /// Archive bucket, when one was determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateKey>,
    /// Destination path, when one was determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    /// Entry for a file excluded by policy
    pub fn policy_skip(name: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            name: name.into(),
            date: None,
            dest: None,
            status: FileStatus::PolicySkip { reason },
        }
    }

    /// Entry for a file that reached the copy step
    pub fn transferred(
        name: impl Into<String>,
        date: DateKey,
        dest: PathBuf,
        outcome: TransferOutcome,
    ) -> Self {
        Self {
            name: name.into(),
            date: Some(date),
            dest: Some(dest),
            status: FileStatus::Transferred {
                outcome,
                error: None,
            },
        }
    }

    /// Entry for a failed file
    pub fn failed(
        name: impl Into<String>,
        date: Option<DateKey>,
        dest: Option<PathBuf>,
        error: &ImportError,
    ) -> Self {
        Self {
            name: name.into(),
            date,
            dest,
            status: FileStatus::Transferred {
                outcome: TransferOutcome::Failed,
                error: Some(error.message.clone()),
            },
        }
    }

    /// Transfer outcome, `None` for policy skips
    pub fn outcome(&self) -> Option<TransferOutcome> {
        match &self.status {
            FileStatus::Transferred { outcome, .. } => Some(*outcome),
            FileStatus::PolicySkip { .. } => None,
        }
    }

    /// Whether the entry is a policy skip
    pub fn is_policy_skip(&self) -> bool {
        matches!(self.status, FileStatus::PolicySkip { .. })
    }

    /// Short description for console output
    pub fn describe(&self) -> String {
        match &self.status {
            FileStatus::Transferred {
                outcome,
                error: Some(error),
            } => format!("{}: {}", outcome, error),
            FileStatus::Transferred { outcome, .. } => match &self.date {
                Some(date) => format!("{} - {}", outcome, date),
                None => outcome.to_string(),
            },
            FileStatus::PolicySkip { reason } => reason.to_string(),
        }
    }
}

/// Result of an import run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    /// Per-file log in enumeration order
    pub files: Vec<FileOutcome>,
    pub copied: u64,
    pub skipped: u64,
    pub overwritten: u64,
    pub failed: u64,
    /// Files excluded by size or name
    pub policy_skipped: u64,
    /// Archive folders created during this run
    pub folders_created: u64,
    /// Bytes written to the archive
    pub bytes_copied: u64,
    /// Errors that prevented the run from starting or listing the source
    #[serde(skip)]
    pub errors: Vec<ImportError>,
    /// Total run duration in milliseconds
    pub duration_ms: u64,
}

impl ImportResult {
    /// Create a new empty import result
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a log entry and update the counters
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome.outcome() {
            Some(TransferOutcome::Copied) => self.copied += 1,
            Some(TransferOutcome::Skipped) => self.skipped += 1,
            Some(TransferOutcome::Overwritten) => self.overwritten += 1,
            Some(TransferOutcome::Failed) => self.failed += 1,
            None => self.policy_skipped += 1,
        }
        self.files.push(outcome);
    }

    /// Look up the log entry for a file name
    pub fn outcome_of(&self, name: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Get the number of run-level errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// No failed file and no run-level error
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors.is_empty()
    }
}

/// Result of a device to staging sync
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// Files listed on the device
    pub listed: u64,
    pub copied: u64,
    /// Already present in staging
    pub skipped: u64,
    /// Copies that failed or timed out
    #[serde(rename = "errors")]
    pub error_count: u64,
    /// Names of files that could not be copied
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<String>,
    /// Run-level and per-file errors
    #[serde(skip)]
    pub errors: Vec<ImportError>,
    /// Total run duration in milliseconds
    pub duration_ms: u64,
}

impl SyncResult {
    /// Create a new empty sync result
    pub fn new() -> Self {
        Self::default()
    }

    /// The run could not start (no device, bad destination)
    pub fn is_aborted(&self) -> bool {
        self.errors.iter().any(|e| e.is_environment_error())
            || (self.listed == 0 && !self.errors.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
