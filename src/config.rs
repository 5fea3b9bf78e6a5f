//! Configuration for the importer

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ImportError;

/// Default minimum file size (100 KiB)
pub const DEFAULT_MIN_FILE_SIZE: u64 = 100 * 1024;

/// Stricter threshold used by earlier import runs (600 KiB)
pub const LEGACY_MIN_FILE_SIZE: u64 = 600 * 1024;

/// Default interval between checks for a device copy to land
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default upper bound on waiting for a device copy
pub const DEFAULT_COPY_TIMEOUT_MS: u64 = 30_000;

/// Marker the phone prefixes soft-deleted files with
pub const DEFAULT_TRASHED_PREFIX: &str = ".trashed";

/// What happens to an archived file that is about to be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Last write wins, the previous file is gone
    #[default]
    Replace,
    /// Rename the previous file to `<stem>.prev.<ext>` first
    KeepPrevious,
}

/// Configuration for the copy and import runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Local directory files are copied to from the device
    pub staging_dir: PathBuf,

    /// Root of the dated archive
    pub archive_dir: PathBuf,

    /// Archive root used instead of `archive_dir` in test mode
    pub test_archive_dir: PathBuf,

    /// Redirect imports to `test_archive_dir`
    pub test_mode: bool,

    /// Files smaller than this many bytes are skipped
    pub min_file_size: u64,

    /// Folder path below the device root, matched case-insensitively
    pub device_path: Vec<String>,

    /// Directory whose subdirectories are treated as connected devices
    pub device_root: PathBuf,

    /// Only connect to a device with this name (case-insensitive)
    pub device_name: Option<String>,

    /// Extensions (lowercase, without dot) listed from the device
    pub media_extensions: HashSet<String>,

    /// Name prefix of soft-deleted files on the device
    pub trashed_prefix: String,

    /// Poll interval while waiting for a device copy
    pub poll_interval_ms: u64,

    /// Give up on a device copy after this long
    pub copy_timeout_ms: u64,

    /// Handling of archived files whose size differs from the incoming one
    pub overwrite_policy: OverwritePolicy,

    /// Compute outcomes without touching the archive
    pub dry_run: bool,

    /// Emit JSON progress lines on stderr
    pub show_progress: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("Staging"),
            archive_dir: PathBuf::from("Photos"),
            test_archive_dir: PathBuf::from("TestDest"),
            test_mode: false,
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            device_path: Self::default_device_path(),
            device_root: Self::default_device_root(),
            device_name: None,
            media_extensions: Self::default_media_extensions(),
            trashed_prefix: DEFAULT_TRASHED_PREFIX.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            copy_timeout_ms: DEFAULT_COPY_TIMEOUT_MS,
            overwrite_policy: OverwritePolicy::Replace,
            dry_run: false,
            show_progress: false,
        }
    }
}

impl ImportConfig {
    /// Create a config builder
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder::new()
    }

    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ImportError::invalid_config(Some(path.to_path_buf()), format!("Cannot read config: {}", e))
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ImportError::from(e).with_path(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.device_path.is_empty() {
            return Err(ImportError::invalid_config(None, "device_path must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ImportError::invalid_config(None, "poll_interval_ms must be positive"));
        }
        if self.copy_timeout_ms < self.poll_interval_ms {
            return Err(ImportError::invalid_config(
                None,
                "copy_timeout_ms must not be shorter than poll_interval_ms",
            ));
        }
        Ok(())
    }

    /// Camera folder on Android phones
    pub fn default_device_path() -> Vec<String> {
        ["Internal shared storage", "DCIM", "Camera"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Where gvfs mounts MTP devices for the current user
    pub fn default_device_root() -> PathBuf {
        match std::env::var_os("XDG_RUNTIME_DIR") {
            Some(dir) => PathBuf::from(dir).join("gvfs"),
            None => PathBuf::from("/run/user/1000/gvfs"),
        }
    }

    /// Extensions listed from the device camera folder
    pub fn default_media_extensions() -> HashSet<String> {
        ["jpg", "jpeg", "png", "mpeg", "mov", "mp4"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Check if a device file name carries one of the media extensions.
    /// A bare extension such as `.jpg` has no stem and is not listed.
    pub fn is_media_name(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.media_extensions.contains(&ext.to_lowercase())
            }
            _ => false,
        }
    }

    /// Check if a device file name is soft-deleted
    pub fn is_trashed_name(&self, name: &str) -> bool {
        !self.trashed_prefix.is_empty()
            && name
                .to_lowercase()
                .starts_with(&self.trashed_prefix.to_lowercase())
    }

    /// Archive root honoring test mode
    pub fn effective_archive_dir(&self) -> &Path {
        if self.test_mode {
            &self.test_archive_dir
        } else {
            &self.archive_dir
        }
    }
}

/// Builder for ImportConfig
#[derive(Debug, Default)]
pub struct ImportConfigBuilder {
    config: ImportConfig,
}

impl ImportConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config
    pub fn from_config(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Set the staging directory
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    /// Set the archive root
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archive_dir = dir.into();
        self
    }

    /// Set the test-mode archive root
    pub fn test_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.test_archive_dir = dir.into();
        self
    }

    /// Enable or disable test mode
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.config.test_mode = enabled;
        self
    }

    /// Set the minimum file size in bytes
    pub fn min_file_size(mut self, bytes: u64) -> Self {
        self.config.min_file_size = bytes;
        self
    }

    /// Set the folder path below the device root
    pub fn device_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.config.device_path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Set the directory searched for devices
    pub fn device_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.device_root = dir.into();
        self
    }

    /// Restrict connection to a named device
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = Some(name.into());
        self
    }

    /// Set the listed media extensions
    pub fn media_extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.media_extensions = extensions;
        self
    }

    /// Set the soft-delete marker
    pub fn trashed_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.trashed_prefix = prefix.into();
        self
    }

    /// Set the device copy poll interval
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the device copy timeout
    pub fn copy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.copy_timeout_ms = ms;
        self
    }

    /// Set the overwrite policy
    pub fn overwrite_policy(mut self, policy: OverwritePolicy) -> Self {
        self.config.overwrite_policy = policy;
        self
    }

    /// Enable or disable dry runs
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.config.dry_run = enabled;
        self
    }

    /// Enable or disable progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Build the config
    pub fn build(self) -> ImportConfig {
        self.config
    }
}
