//! Phone media importer
//!
//! Copies camera files from a phone that is only reachable as a tree of
//! named items into a local staging folder, then files them into a dated
//! archive (`<archive>/YYYY-MM-DD/<name>`).

pub mod archive;
pub mod config;
pub mod device;
pub mod error;
pub mod importer;
pub mod models;
pub mod naming;
pub mod progress;
pub mod qualifier;
pub mod staging;

pub use archive::{date_from_folder_name, find_latest, find_latest_folder};
pub use config::{ImportConfig, ImportConfigBuilder, OverwritePolicy};
pub use device::{
    wait_for_file, CancelToken, DeviceAdapter, DeviceBackend, DeviceItem, DeviceState,
    MountedDeviceBackend, SimulatedDevice,
};
pub use error::{ImportError, ImportErrorKind};
pub use importer::{import_dir, import_staging};
pub use models::{
    DeviceFile, FileOutcome, ImportResult, QualificationResult, SkipReason, SyncResult,
    TransferOutcome,
};
pub use naming::{classify, classify_dir, extract_date, DateKey, FileClass};
pub use progress::{ProgressReporter, RunKind};
pub use qualifier::Qualifier;
pub use staging::{sync_to_staging, ListingSource};
