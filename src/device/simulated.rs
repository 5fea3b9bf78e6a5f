//! In-memory device for exercising the copy protocol without hardware

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{DeviceBackend, DeviceItem};
use crate::error::ImportError;

/// How the simulated device reacts to a copy request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyBehavior {
    /// File is fully written before `copy_async` returns
    #[default]
    Immediate,
    /// File appears after the given delay, from a background thread
    Delayed(Duration),
    /// File never appears
    Never,
    /// An empty file appears immediately and nothing more is written
    Truncated,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<String>,
    item: DeviceItem,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
    current_device: Option<String>,
    copy_requests: Vec<String>,
}

impl Tree {
    fn child(&self, parent: &str, name: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.parent.as_deref() == Some(parent) && n.item.name == name)
    }

    fn insert(&mut self, parent: Option<&str>, item: DeviceItem) {
        self.nodes.push(Node {
            parent: parent.map(str::to_string),
            item,
        });
    }

    /// Create missing folders along `path` below the current device and
    /// return the id of the last one
    fn ensure_folder(&mut self, path: &[&str]) -> Option<String> {
        let mut parent = self.current_device.clone()?;
        for segment in path {
            let existing = self.child(&parent, segment).map(|n| n.item.id.clone());
            parent = match existing {
                Some(id) => id,
                None => {
                    let id = format!("{}/{}", parent, segment);
                    self.insert(Some(parent.as_str()), DeviceItem::folder(*segment, id.clone()));
                    id
                }
            };
        }
        Some(parent)
    }
}

/// A scripted phone. Folders and files are declared up front; copies
/// write zero-filled files of the declared size.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    tree: Mutex<Tree>,
    behavior: CopyBehavior,
    overrides: HashMap<String, CopyBehavior>,
}

impl SimulatedDevice {
    /// No device connected
    pub fn empty() -> Self {
        Self::default()
    }

    /// One connected device with an empty tree
    pub fn new(device_name: &str) -> Self {
        Self::empty().with_device(device_name)
    }

    /// Add another device; later folders and files go under it
    pub fn with_device(self, device_name: &str) -> Self {
        {
            let mut tree = self.lock();
            let id = format!("/{}", device_name);
            tree.insert(None, DeviceItem::folder(device_name, id.clone()));
            tree.current_device = Some(id);
        }
        self
    }

    pub fn with_folder(self, path: &[&str]) -> Self {
        self.lock().ensure_folder(path);
        self
    }

    pub fn with_file(self, folder: &[&str], name: &str, size: u64) -> Self {
        self.add_file(folder, name, size);
        self
    }

    /// Add a file after construction, e.g. while an adapter holds the device
    pub fn add_file(&self, folder: &[&str], name: &str, size: u64) {
        let mut tree = self.lock();
        if let Some(parent) = tree.ensure_folder(folder) {
            let id = format!("{}/{}", parent, name);
            tree.insert(Some(parent.as_str()), DeviceItem::file(name, id, size));
        }
    }

    /// Default reaction to copy requests
    pub fn with_copy_behavior(mut self, behavior: CopyBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Reaction to copy requests for one file name
    pub fn with_file_behavior(mut self, name: &str, behavior: CopyBehavior) -> Self {
        self.overrides.insert(name.to_string(), behavior);
        self
    }

    /// Names of all files a copy was requested for, in order
    pub fn copy_requests(&self) -> Vec<String> {
        self.lock().copy_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceBackend for SimulatedDevice {
    fn devices(&self) -> Result<Vec<DeviceItem>, ImportError> {
        Ok(self
            .lock()
            .nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.item.clone())
            .collect())
    }

    fn enumerate(&self, folder: &DeviceItem) -> Result<Vec<DeviceItem>, ImportError> {
        Ok(self
            .lock()
            .nodes
            .iter()
            .filter(|n| n.parent.as_deref() == Some(folder.id.as_str()))
            .map(|n| n.item.clone())
            .collect())
    }

    fn copy_async(&self, item: &DeviceItem, dest_dir: &Path) -> Result<(), ImportError> {
        self.lock().copy_requests.push(item.name.clone());

        let target = dest_dir.join(&item.name);
        let size = item.size as usize;
        let behavior = self
            .overrides
            .get(&item.name)
            .copied()
            .unwrap_or(self.behavior);

        match behavior {
            CopyBehavior::Immediate => {
                std::fs::write(&target, vec![0u8; size])
                    .map_err(|e| ImportError::from(e).with_path(&target))?;
            }
            CopyBehavior::Delayed(delay) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    if let Err(e) = std::fs::write(&target, vec![0u8; size]) {
                        log::warn!("Simulated copy to {} failed: {}", target.display(), e);
                    }
                });
            }
            CopyBehavior::Never => {}
            CopyBehavior::Truncated => {
                std::fs::File::create(&target)
                    .map_err(|e| ImportError::from(e).with_path(&target))?;
            }
        }
        Ok(())
    }
}
