//! Device to staging sync
//!
//! A cheap pre-filter: a device file is copied only when no file of the same
//! name exists in staging. Sizes are not compared here; the import step is
//! where duplicates are reconciled.

use std::path::Path;
use std::time::Instant;

use crate::device::{DeviceAdapter, DeviceBackend};
use crate::error::{ImportError, ImportErrorKind};
use crate::models::{DeviceFile, SyncResult};
use crate::progress::{ProgressReporter, RunKind};

/// Which device listing a sync works from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingSource {
    /// Enumerate the camera folder again
    #[default]
    Live,
    /// Use the listing taken when the adapter connected
    Snapshot,
}

/// Copy every device file missing from `dest` into it.
///
/// Connects the adapter if needed. Per-file failures are counted and the
/// run carries on; only a missing device or an unusable destination stop it.
pub fn sync_to_staging<B: DeviceBackend>(
    adapter: &mut DeviceAdapter<B>,
    dest: &Path,
    listing: ListingSource,
    reporter: &ProgressReporter,
) -> SyncResult {
    let start = Instant::now();
    let mut result = SyncResult::new();

    let files = match prepare(adapter, dest, listing) {
        Ok(files) => files,
        Err(e) => {
            log::error!("Copy aborted: {}", e.message);
            reporter.report_error(&e);
            result.errors.push(e);
            result.duration_ms = start.elapsed().as_millis() as u64;
            reporter.report_sync_done(&result);
            return result;
        }
    };

    reporter.report_start(RunKind::Copy, &adapter.folder_display(), dest);
    result.listed = files.len() as u64;

    for file in &files {
        if dest.join(&file.name).exists() {
            log::debug!("{} already staged", file.name);
            result.skipped += 1;
            reporter.report_file(&file.name, "skipped");
            continue;
        }

        match adapter.try_copy_to_local(&file.name, dest) {
            Ok(_) => {
                log::info!("Copied {} ({} bytes)", file.name, file.size);
                result.copied += 1;
                reporter.report_file(&file.name, "copied");
            }
            Err(e) => {
                log::warn!("Failed to copy {}: {}", file.name, e.message);
                reporter.report_error(&e);
                result.error_count += 1;
                result.failed_files.push(file.name.clone());
                let cancelled = e.kind == ImportErrorKind::Cancelled;
                result.errors.push(e);
                if cancelled {
                    log::warn!("Copy cancelled");
                    break;
                }
            }
        }
    }

    adapter.wait_pending();
    result.duration_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "{} files copied, {} skipped, {} errors",
        result.copied,
        result.skipped,
        result.error_count
    );
    reporter.report_sync_done(&result);
    result
}

fn prepare<B: DeviceBackend>(
    adapter: &mut DeviceAdapter<B>,
    dest: &Path,
    listing: ListingSource,
) -> Result<Vec<DeviceFile>, ImportError> {
    if !dest.is_dir() {
        return Err(ImportError::resource(
            dest.to_path_buf(),
            format!("Staging directory does not exist: {}", dest.display()),
        ));
    }
    adapter.connect()?;
    match listing {
        ListingSource::Live => adapter.list_files(),
        ListingSource::Snapshot => Ok(adapter.snapshot().to_vec()),
    }
}
