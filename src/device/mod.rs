//! Transfer from a phone exposed as a tree of named items
//!
//! The phone has no drive letter and no random access. A backend can list a
//! folder, look up an item by name and start a copy, but the copy call
//! returns before the data lands and never reports completion. The adapter
//! therefore polls the destination for the file to appear.
//!
//! Presence of the destination path is the only completion signal. A large
//! file can be reported as copied while its bytes are still being flushed.

pub mod mounted;
pub mod simulated;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ImportConfig;
use crate::error::{ImportError, ImportErrorKind};
use crate::models::DeviceFile;

pub use mounted::MountedDeviceBackend;
pub use simulated::{CopyBehavior, SimulatedDevice};

/// An entry in the device tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceItem {
    /// Display name
    pub name: String,
    /// Backend-specific handle
    pub id: String,
    pub is_folder: bool,
    /// Size in bytes, 0 for folders or when the device did not report one
    pub size: u64,
}

impl DeviceItem {
    pub fn folder(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            is_folder: true,
            size: 0,
        }
    }

    pub fn file(name: impl Into<String>, id: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            is_folder: false,
            size,
        }
    }
}

/// Capabilities a device must expose
pub trait DeviceBackend {
    /// Connected devices, each the root folder of its tree
    fn devices(&self) -> Result<Vec<DeviceItem>, ImportError>;

    /// Items directly inside a folder, in device order
    fn enumerate(&self, folder: &DeviceItem) -> Result<Vec<DeviceItem>, ImportError>;

    /// Look up an item of a folder by exact name
    fn resolve(&self, folder: &DeviceItem, name: &str) -> Result<Option<DeviceItem>, ImportError> {
        Ok(self
            .enumerate(folder)?
            .into_iter()
            .find(|item| item.name == name))
    }

    /// Start copying `item` into `dest_dir`. Returns once the transfer has
    /// been initiated; success is not reported.
    fn copy_async(&self, item: &DeviceItem, dest_dir: &Path) -> Result<(), ImportError>;

    /// Block until copies started by `copy_async` have finished writing
    fn wait_pending(&self) {}
}

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Connection lifecycle of a [`DeviceAdapter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Disconnected,
    /// Looking for a device among the connected ones
    Locating,
    /// Device found, folder not yet resolved
    Connected,
    /// Walking the configured folder path
    Navigating,
    /// Camera folder resolved, ready for listing and copying
    Ready,
    /// No device, or a folder on the path is missing. Terminal.
    Unavailable,
}

/// Owns a device session. Not safe for concurrent use; one caller at a time.
pub struct DeviceAdapter<B: DeviceBackend> {
    backend: B,
    config: ImportConfig,
    state: DeviceState,
    device: Option<DeviceItem>,
    folder: Option<DeviceItem>,
    snapshot: Vec<DeviceFile>,
    cancel: CancelToken,
}

impl<B: DeviceBackend> DeviceAdapter<B> {
    pub fn new(backend: B, config: &ImportConfig) -> Self {
        Self {
            backend,
            config: config.clone(),
            state: DeviceState::Disconnected,
            device: None,
            folder: None,
            snapshot: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Share a cancellation token with the caller
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Ready
    }

    /// Name of the connected device
    pub fn device_name(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.name.as_str())
    }

    /// Human-readable location of the camera folder
    pub fn folder_display(&self) -> String {
        let device = self.device_name().unwrap_or("?");
        format!("{}\\{}", device, self.config.device_path.join("\\"))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Locate the device, walk to the camera folder and take a listing
    /// snapshot. Failure leaves the adapter `Unavailable`.
    pub fn connect(&mut self) -> Result<(), ImportError> {
        if self.state == DeviceState::Ready {
            return Ok(());
        }
        if self.state == DeviceState::Unavailable {
            return Err(ImportError::not_connected());
        }

        self.state = DeviceState::Locating;
        let device = match self.locate() {
            Ok(Some(device)) => device,
            Ok(None) => {
                return Err(self.fail(ImportError::device_unavailable(
                    "Android device not found. Ensure it is in 'File Transfer' mode.",
                )))
            }
            Err(e) => return Err(self.fail(e)),
        };
        log::info!("Connected to {}", device.name);
        self.device = Some(device.clone());
        self.state = DeviceState::Connected;

        self.state = DeviceState::Navigating;
        let mut current = device;
        for segment in self.config.device_path.clone() {
            let children = match self.backend.enumerate(&current) {
                Ok(children) => children,
                Err(e) => return Err(self.fail(e)),
            };
            match children
                .into_iter()
                .find(|c| c.is_folder && c.name.to_lowercase() == segment.to_lowercase())
            {
                Some(next) => current = next,
                None => {
                    return Err(self.fail(ImportError::device_unavailable(format!(
                        "Could not find folder: {}",
                        segment
                    ))))
                }
            }
        }
        self.folder = Some(current);
        self.state = DeviceState::Ready;

        match self.list_files() {
            Ok(files) => self.snapshot = files,
            Err(e) => return Err(self.fail(e)),
        }
        log::info!(
            "Listing {} files in {}",
            self.snapshot.len(),
            self.folder_display()
        );
        Ok(())
    }

    fn locate(&self) -> Result<Option<DeviceItem>, ImportError> {
        let devices = self.backend.devices()?;
        let wanted = self.config.device_name.as_ref().map(|n| n.to_lowercase());
        Ok(devices.into_iter().find(|d| {
            d.is_folder
                && wanted
                    .as_ref()
                    .map_or(true, |name| d.name.to_lowercase() == *name)
        }))
    }

    fn fail(&mut self, err: ImportError) -> ImportError {
        log::error!("{}", err.message);
        self.state = DeviceState::Unavailable;
        self.device = None;
        self.folder = None;
        self.snapshot.clear();
        err
    }

    /// Listing taken at connect time
    pub fn snapshot(&self) -> &[DeviceFile] {
        &self.snapshot
    }

    /// Fresh listing of the camera folder, without trashed and non-media
    /// files
    pub fn list_files(&self) -> Result<Vec<DeviceFile>, ImportError> {
        let folder = self.ready_folder()?;
        let media = &self.config;
        let files = self
            .backend
            .enumerate(folder)?
            .into_iter()
            .filter(|item| !item.is_folder)
            .filter(|item| !media.is_trashed_name(&item.name))
            .filter(|item| media.is_media_name(&item.name))
            .map(|item| DeviceFile::new(item.name, item.size))
            .collect();
        Ok(files)
    }

    fn ready_folder(&self) -> Result<&DeviceItem, ImportError> {
        match (&self.state, &self.folder) {
            (DeviceState::Ready, Some(folder)) => Ok(folder),
            _ => Err(ImportError::not_connected()),
        }
    }

    /// Copy a device file into `dest_dir`, returning the local path once the
    /// file has appeared there
    pub fn try_copy_to_local(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, ImportError> {
        let folder = self.ready_folder()?;
        if !dest_dir.is_dir() {
            return Err(ImportError::resource(
                dest_dir.to_path_buf(),
                format!("Destination directory does not exist: {}", dest_dir.display()),
            ));
        }

        let item = self.backend.resolve(folder, name)?.ok_or_else(|| {
            ImportError::new(
                ImportErrorKind::NotFound,
                None,
                format!("File not found on device: {}", name),
            )
        })?;

        let target = dest_dir.join(&item.name);
        self.backend.copy_async(&item, dest_dir)?;

        let waited = wait_for_file(
            &target,
            Duration::from_millis(self.config.poll_interval_ms),
            Duration::from_millis(self.config.copy_timeout_ms),
            &self.cancel,
        )?;
        log::debug!("{} appeared after {} ms", item.name, waited.as_millis());
        Ok(target)
    }

    /// Let copies the backend is still writing finish
    pub fn wait_pending(&self) {
        self.backend.wait_pending();
    }

    /// Copy a device file into `dest_dir`. Returns false on any failure,
    /// including timeout.
    pub fn copy_to_local(&self, name: &str, dest_dir: &Path) -> bool {
        match self.try_copy_to_local(name, dest_dir) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Copy of {} failed: {}", name, e.message);
                false
            }
        }
    }
}

/// Wait until `path` exists, checking every `interval` for at most
/// `timeout`. The cancel token is checked on every tick.
pub fn wait_for_file(
    path: &Path,
    interval: Duration,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Duration, ImportError> {
    let start = Instant::now();
    loop {
        if path.exists() {
            return Ok(start.elapsed());
        }
        if cancel.is_cancelled() {
            return Err(ImportError::cancelled(Some(path.to_path_buf())));
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(ImportError::timeout(
                path.to_path_buf(),
                elapsed.as_millis() as u64,
            ));
        }
        std::thread::sleep(interval.min(timeout - elapsed));
    }
}
