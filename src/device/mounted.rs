//! Devices exposed through a userspace mount (gvfs, jmtpfs, simple-mtpfs)
//!
//! Every directory directly under the device root is taken to be one phone.
//! Copies run on a background thread so the caller sees the same
//! fire-and-forget contract as with a shell namespace copy. Copy threads are
//! joined by `wait_pending` and on drop, so no copy is cut short by the
//! process exiting.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread::JoinHandle;
use walkdir::WalkDir;

use super::{DeviceBackend, DeviceItem};
use crate::error::ImportError;

#[derive(Debug)]
pub struct MountedDeviceBackend {
    root: PathBuf,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl MountedDeviceBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of copy threads not yet joined
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<DeviceItem>, ImportError> {
        let mut items = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                ImportError::io_error(e.path().map(|p| p.to_path_buf()), e.to_string())
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            let id = entry.path().to_string_lossy().to_string();
            if entry.file_type().is_dir() {
                items.push(DeviceItem::folder(name, id));
            } else {
                // Some MTP mounts fail stat on individual objects
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                items.push(DeviceItem::file(name, id, size));
            }
        }
        Ok(items)
    }
}

impl DeviceBackend for MountedDeviceBackend {
    fn devices(&self) -> Result<Vec<DeviceItem>, ImportError> {
        if !self.root.is_dir() {
            log::debug!("Device root {} does not exist", self.root.display());
            return Ok(Vec::new());
        }
        Ok(self
            .list_dir(&self.root)?
            .into_iter()
            .filter(|item| item.is_folder)
            .collect())
    }

    fn enumerate(&self, folder: &DeviceItem) -> Result<Vec<DeviceItem>, ImportError> {
        self.list_dir(Path::new(&folder.id))
    }

    fn copy_async(&self, item: &DeviceItem, dest_dir: &Path) -> Result<(), ImportError> {
        let source = PathBuf::from(&item.id);
        let target = dest_dir.join(&item.name);
        let handle = std::thread::Builder::new()
            .name(format!("copy {}", item.name))
            .spawn(move || {
                if let Err(e) = std::fs::copy(&source, &target) {
                    log::warn!(
                        "Copy {} -> {} failed: {}",
                        source.display(),
                        target.display(),
                        e
                    );
                }
            })
            .map_err(|e| ImportError::from(e).with_path(dest_dir))?;
        self.lock_pending().push(handle);
        Ok(())
    }

    fn wait_pending(&self) {
        let handles = std::mem::take(&mut *self.lock_pending());
        if !handles.is_empty() {
            log::debug!("Waiting for {} copies to finish", handles.len());
        }
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("A copy thread panicked");
            }
        }
    }
}

impl Drop for MountedDeviceBackend {
    fn drop(&mut self) {
        self.wait_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::device::{DeviceAdapter, DeviceState};

    fn mount_with_phone() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let camera = root
            .path()
            .join("mtp:host=Google_Pixel_7")
            .join("Internal shared storage")
            .join("DCIM")
            .join("Camera");
        std::fs::create_dir_all(&camera).unwrap();
        std::fs::write(camera.join("PXL_20230101_100000000.jpg"), vec![7u8; 4096]).unwrap();
        std::fs::write(camera.join(".trashed-1-PXL_20230101_1.jpg"), vec![7u8; 10]).unwrap();
        root
    }

    fn config_for(root: &Path) -> ImportConfig {
        ImportConfig::builder()
            .device_root(root)
            .poll_interval_ms(5)
            .copy_timeout_ms(5_000)
            .build()
    }

    #[test]
    fn test_missing_root_has_no_devices() {
        let backend = MountedDeviceBackend::new("/no/such/gvfs");
        assert!(backend.devices().unwrap().is_empty());
    }

    #[test]
    fn test_connect_and_list() {
        let root = mount_with_phone();
        let config = config_for(root.path());
        let mut adapter = DeviceAdapter::new(MountedDeviceBackend::new(root.path()), &config);
        adapter.connect().unwrap();

        assert_eq!(adapter.state(), DeviceState::Ready);
        assert_eq!(adapter.device_name(), Some("mtp:host=Google_Pixel_7"));
        let files = adapter.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 4096);
    }

    #[test]
    fn test_copy_to_local() {
        let root = mount_with_phone();
        let dest = tempfile::tempdir().unwrap();
        let config = config_for(root.path());
        let mut adapter = DeviceAdapter::new(MountedDeviceBackend::new(root.path()), &config);
        adapter.connect().unwrap();

        assert!(adapter.copy_to_local("PXL_20230101_100000000.jpg", dest.path()));
        adapter.wait_pending();

        assert_eq!(adapter.backend().pending_count(), 0);
        let copied = dest.path().join("PXL_20230101_100000000.jpg");
        assert_eq!(std::fs::metadata(copied).unwrap().len(), 4096);
    }

    #[test]
    fn test_drop_finishes_large_copy() {
        const SIZE: usize = 32 * 1024 * 1024;
        let root = mount_with_phone();
        let camera = root
            .path()
            .join("mtp:host=Google_Pixel_7/Internal shared storage/DCIM/Camera");
        std::fs::write(camera.join("PXL_20230102_1.mp4"), vec![3u8; SIZE]).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let config = config_for(root.path());

        let mut adapter = DeviceAdapter::new(MountedDeviceBackend::new(root.path()), &config);
        adapter.connect().unwrap();
        assert!(adapter.copy_to_local("PXL_20230102_1.mp4", dest.path()));
        drop(adapter);

        let copied = dest.path().join("PXL_20230102_1.mp4");
        assert_eq!(std::fs::metadata(copied).unwrap().len(), SIZE as u64);
    }

    #[test]
    fn test_sync_leaves_complete_files() {
        const SIZE: usize = 16 * 1024 * 1024;
        let root = mount_with_phone();
        let camera = root
            .path()
            .join("mtp:host=Google_Pixel_7/Internal shared storage/DCIM/Camera");
        std::fs::write(camera.join("PXL_20230103_1.mp4"), vec![5u8; SIZE]).unwrap();
        let staging = tempfile::tempdir().unwrap();
        let config = config_for(root.path());

        let mut adapter = DeviceAdapter::new(MountedDeviceBackend::new(root.path()), &config);
        let result = crate::staging::sync_to_staging(
            &mut adapter,
            staging.path(),
            crate::staging::ListingSource::Live,
            &crate::progress::ProgressReporter::disabled(),
        );

        assert_eq!(result.copied, 2);
        assert_eq!(adapter.backend().pending_count(), 0);
        let copied = staging.path().join("PXL_20230103_1.mp4");
        assert_eq!(std::fs::metadata(copied).unwrap().len(), SIZE as u64);
    }
}
