//! Staging to archive import
//!
//! Every staged file is checked for size, dated from its name and copied to
//! `<archive>/<YYYY-MM-DD>/<name>`. A destination of the same name and size
//! counts as already imported; a different size is replaced. A run never
//! stops on a single file.

use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::{ImportConfig, OverwritePolicy};
use crate::error::ImportError;
use crate::models::{FileOutcome, ImportResult, SkipReason, TransferOutcome};
use crate::naming::{extract_date, DateKey};
use crate::progress::{ProgressReporter, RunKind};
use crate::qualifier::Qualifier;

/// Import the configured staging directory into the archive, honoring test mode
pub fn import_staging(config: &ImportConfig, reporter: &ProgressReporter) -> ImportResult {
    import_dir(
        config,
        &config.staging_dir,
        config.effective_archive_dir(),
        reporter,
    )
}

/// Import every file directly inside `source` into dated folders below
/// `dest_root`
pub fn import_dir(
    config: &ImportConfig,
    source: &Path,
    dest_root: &Path,
    reporter: &ProgressReporter,
) -> ImportResult {
    let start = Instant::now();
    let mut result = ImportResult::new();

    if let Err(e) = check_roots(config, source, dest_root) {
        log::error!("Import aborted: {}", e.message);
        reporter.report_error(&e);
        result.errors.push(e);
        result.duration_ms = start.elapsed().as_millis() as u64;
        reporter.report_import_done(&result);
        return result;
    }

    reporter.report_start(RunKind::Import, &source.to_string_lossy(), dest_root);
    let qualifier = Qualifier::new(config.min_file_size);

    for entry in WalkDir::new(source).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let err = ImportError::io_error(e.path().map(|p| p.to_path_buf()), e.to_string());
                log::warn!("Cannot read entry: {}", err.message);
                reporter.report_error(&err);
                result.errors.push(err);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        let outcome = if entry.file_type().is_file() {
            import_file(config, &qualifier, entry.path(), &name, dest_root, &mut result)
        } else {
            FileOutcome::policy_skip(&name, SkipReason::NotAFile)
        };

        match outcome.outcome() {
            None => log::info!("{} {}", entry.path().display(), outcome.describe()),
            Some(TransferOutcome::Failed) => {
                log::warn!("{} {}", entry.path().display(), outcome.describe())
            }
            Some(_) => log::info!("OK: {} - {}", entry.path().display(), outcome.describe()),
        }
        reporter.report_outcome(&outcome);
        result.record(outcome);
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "{} copied, {} overwritten, {} skipped, {} excluded, {} failed",
        result.copied,
        result.overwritten,
        result.skipped,
        result.policy_skipped,
        result.failed
    );
    reporter.report_import_done(&result);
    result
}

fn check_roots(config: &ImportConfig, source: &Path, dest_root: &Path) -> Result<(), ImportError> {
    if !source.is_dir() {
        return Err(ImportError::not_found(source.to_path_buf()));
    }
    if dest_root.is_dir() || config.dry_run {
        return Ok(());
    }
    std::fs::create_dir_all(dest_root).map_err(|e| {
        ImportError::resource(
            dest_root.to_path_buf(),
            format!("Cannot create archive root: {}", e),
        )
    })
}

fn import_file(
    config: &ImportConfig,
    qualifier: &Qualifier,
    path: &Path,
    name: &str,
    dest_root: &Path,
    result: &mut ImportResult,
) -> FileOutcome {
    let qualification = match qualifier.qualify(path) {
        Ok(q) => q,
        Err(e) => return FileOutcome::failed(name, None, None, &e),
    };
    if !qualification.qualified {
        return FileOutcome::policy_skip(name, SkipReason::TooSmall(qualification.reason));
    }

    let date = match extract_date(name) {
        Some(date) => date,
        None => return FileOutcome::policy_skip(name, SkipReason::UnparseableName),
    };

    let bucket = bucket_path(dest_root, &date);
    if !config.dry_run {
        match ensure_bucket(&bucket) {
            Ok(true) => {
                log::debug!("Created {}", bucket.display());
                result.folders_created += 1;
            }
            Ok(false) => {}
            Err(e) => return FileOutcome::failed(name, Some(date), None, &e),
        }
    }

    let dest = bucket.join(name);
    let planned = match std::fs::metadata(path)
        .map_err(ImportError::from)
        .and_then(|m| plan_transfer(m.len(), &dest))
    {
        Ok(planned) => planned,
        Err(e) => return FileOutcome::failed(name, Some(date), Some(dest), &e),
    };

    if planned == TransferOutcome::Skipped || config.dry_run {
        return FileOutcome::transferred(name, date, dest, planned);
    }

    let keep_previous =
        planned == TransferOutcome::Overwritten && config.overwrite_policy == OverwritePolicy::KeepPrevious;
    match copy_preserving_times(path, &dest, keep_previous) {
        Ok(bytes) => {
            result.bytes_copied += bytes;
            FileOutcome::transferred(name, date, dest, planned)
        }
        Err(e) => FileOutcome::failed(name, Some(date), Some(dest), &e),
    }
}

/// Archive folder for a date
pub fn bucket_path(dest_root: &Path, date: &DateKey) -> PathBuf {
    dest_root.join(date.to_string())
}

/// Create a date folder if missing. Returns whether it was created.
pub fn ensure_bucket(bucket: &Path) -> Result<bool, ImportError> {
    if bucket.is_dir() {
        return Ok(false);
    }
    match std::fs::create_dir(bucket) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && bucket.is_dir() => Ok(false),
        Err(e) => Err(ImportError::resource(
            bucket.to_path_buf(),
            format!("Error creating directory {}: {}", bucket.display(), e),
        )),
    }
}

/// Decide what to do with a source of `size` bytes given the destination
pub fn plan_transfer(size: u64, dest: &Path) -> Result<TransferOutcome, ImportError> {
    match std::fs::metadata(dest) {
        Ok(existing) if existing.is_file() && existing.len() == size => Ok(TransferOutcome::Skipped),
        Ok(_) => Ok(TransferOutcome::Overwritten),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TransferOutcome::Copied),
        Err(e) => Err(ImportError::from(e).with_path(dest)),
    }
}

/// `PXL_1.jpg` -> `PXL_1.prev.jpg`, then `PXL_1.prev.1.jpg`, ... for
/// `attempt` 0, 1, ...
fn aside_path(dest: &Path, attempt: u32) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let marker = match attempt {
        0 => "prev".to_string(),
        n => format!("prev.{}", n),
    };
    let name = match dest.extension() {
        Some(ext) => format!("{}.{}.{}", stem, marker, ext.to_string_lossy()),
        None => format!("{}.{}", stem, marker),
    };
    dest.with_file_name(name)
}

/// First aside name not already taken, so earlier backups survive
fn free_aside_path(dest: &Path) -> PathBuf {
    let mut attempt = 0;
    loop {
        let aside = aside_path(dest, attempt);
        if std::fs::symlink_metadata(&aside).is_err() {
            return aside;
        }
        attempt += 1;
    }
}

/// Copy `src` over `dest` and carry over access and modification times
fn copy_preserving_times(src: &Path, dest: &Path, keep_previous: bool) -> Result<u64, ImportError> {
    if keep_previous {
        let aside = free_aside_path(dest);
        std::fs::rename(dest, &aside).map_err(|e| ImportError::from(e).with_path(dest))?;
        log::info!("Kept previous {} as {}", dest.display(), aside.display());
    }

    let bytes = std::fs::copy(src, dest).map_err(|e| ImportError::from(e).with_path(dest))?;

    let metadata = std::fs::metadata(src).map_err(|e| ImportError::from(e).with_path(src))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    let atime = FileTime::from_last_access_time(&metadata);
    if let Err(e) = filetime::set_file_times(dest, atime, mtime) {
        log::warn!("Cannot set times on {}: {}", dest.display(), e);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportErrorKind;

    const MIN: u64 = 1024;

    fn config() -> ImportConfig {
        ImportConfig::builder().min_file_size(MIN).build()
    }

    fn stage(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![1u8; size]).unwrap();
        path
    }

    fn run(config: &ImportConfig, source: &Path, dest: &Path) -> ImportResult {
        import_dir(config, source, dest, &ProgressReporter::disabled())
    }

    fn outcome(result: &ImportResult, name: &str) -> Option<TransferOutcome> {
        result.outcome_of(name).and_then(|f| f.outcome())
    }

    #[test]
    fn test_import_into_dated_folders() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", 2000);
        stage(source.path(), "PXL_20230101_110000000.mp4", 3000);
        stage(source.path(), "IMG-20221224-WA0001.jpg", 1500);

        let result = run(&config(), source.path(), archive.path());

        assert_eq!(result.copied, 3);
        assert_eq!(result.folders_created, 2);
        assert_eq!(result.bytes_copied, 6500);
        assert!(result.is_success());
        assert!(archive.path().join("2023-01-01/PXL_20230101_100000000.jpg").is_file());
        assert!(archive.path().join("2023-01-01/PXL_20230101_110000000.mp4").is_file());
        assert!(archive.path().join("2022-12-24/IMG-20221224-WA0001.jpg").is_file());
    }

    #[test]
    fn test_policy_skips() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", (MIN - 1) as usize);
        stage(source.path(), "holiday.jpg", 5000);
        std::fs::create_dir(source.path().join("subdir")).unwrap();

        let result = run(&config(), source.path(), archive.path());

        assert_eq!(result.policy_skipped, 3);
        assert_eq!(result.copied, 0);
        assert!(result.is_success());

        let small = result.outcome_of("PXL_20230101_100000000.jpg").unwrap();
        assert!(small.is_policy_skip());
        assert!(small.describe().contains("1,024"));
        assert_eq!(
            result.outcome_of("holiday.jpg").unwrap().describe(),
            "Error parsing file name"
        );
        // Nothing was created for skipped files
        assert_eq!(std::fs::read_dir(archive.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", MIN as usize);

        let result = run(&config(), source.path(), archive.path());
        assert_eq!(result.copied, 1);
    }

    #[test]
    fn test_second_run_skips_everything() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", 2000);
        stage(source.path(), "PXL_20230102_100000000.jpg", 2000);
        stage(source.path(), "PXL_20230103_100000000.mp4", 2000);

        let first = run(&config(), source.path(), archive.path());
        assert_eq!(first.copied, 3);

        let second = run(&config(), source.path(), archive.path());
        assert_eq!(second.skipped, 3);
        assert_eq!(second.copied + second.overwritten + second.failed, 0);
        assert_eq!(second.bytes_copied, 0);
        assert_eq!(second.folders_created, 0);
    }

    #[test]
    fn test_changed_size_is_overwritten() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", 2000);
        stage(source.path(), "PXL_20230102_100000000.jpg", 2000);
        run(&config(), source.path(), archive.path());

        stage(source.path(), "PXL_20230102_100000000.jpg", 2500);
        let result = run(&config(), source.path(), archive.path());

        assert_eq!(result.overwritten, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(
            outcome(&result, "PXL_20230102_100000000.jpg"),
            Some(TransferOutcome::Overwritten)
        );
        let dest = archive.path().join("2023-01-02/PXL_20230102_100000000.jpg");
        assert_eq!(std::fs::metadata(dest).unwrap().len(), 2500);
        assert!(!archive
            .path()
            .join("2023-01-02/PXL_20230102_100000000.prev.jpg")
            .exists());
    }

    #[test]
    fn test_keep_previous_renames_aside() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let bucket = archive.path().join("2023-01-02");
        std::fs::create_dir(&bucket).unwrap();
        std::fs::write(bucket.join("PXL_20230102_100000000.jpg"), vec![9u8; 1800]).unwrap();
        stage(source.path(), "PXL_20230102_100000000.jpg", 2500);

        let config = crate::config::ImportConfigBuilder::from_config(config())
            .overwrite_policy(OverwritePolicy::KeepPrevious)
            .build();
        let result = run(&config, source.path(), archive.path());

        assert_eq!(result.overwritten, 1);
        assert_eq!(result.folders_created, 0);
        assert_eq!(
            std::fs::metadata(bucket.join("PXL_20230102_100000000.jpg")).unwrap().len(),
            2500
        );
        assert_eq!(
            std::fs::metadata(bucket.join("PXL_20230102_100000000.prev.jpg")).unwrap().len(),
            1800
        );
    }

    #[test]
    fn test_bucket_failure_is_per_file() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        // A plain file where the date folder should go
        std::fs::write(archive.path().join("2023-01-01"), b"in the way").unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", 2000);
        stage(source.path(), "PXL_20230102_100000000.jpg", 2000);

        let result = run(&config(), source.path(), archive.path());

        assert_eq!(result.failed, 1);
        assert_eq!(result.copied, 1);
        assert_eq!(
            outcome(&result, "PXL_20230101_100000000.jpg"),
            Some(TransferOutcome::Failed)
        );
        assert!(result
            .outcome_of("PXL_20230101_100000000.jpg")
            .unwrap()
            .describe()
            .contains("Error creating directory"));
    }

    #[test]
    fn test_timestamps_preserved() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let src = stage(source.path(), "PXL_20230101_100000000.jpg", 2000);
        let stamp = FileTime::from_unix_time(1_672_567_200, 0);
        filetime::set_file_times(&src, stamp, stamp).unwrap();

        run(&config(), source.path(), archive.path());

        let dest = archive.path().join("2023-01-01/PXL_20230101_100000000.jpg");
        let metadata = std::fs::metadata(dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), stamp);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        stage(source.path(), "PXL_20230101_100000000.jpg", 2000);

        let config = crate::config::ImportConfigBuilder::from_config(config())
            .dry_run(true)
            .build();
        let result = run(&config, source.path(), archive.path());

        assert_eq!(result.copied, 1);
        assert_eq!(result.bytes_copied, 0);
        assert_eq!(std::fs::read_dir(archive.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_source_aborts() {
        let archive = tempfile::tempdir().unwrap();
        let result = run(&config(), Path::new("/no/such/staging"), archive.path());
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].kind, ImportErrorKind::NotFound);
        assert!(result.files.is_empty());
        assert!(!result.is_success());
    }

    #[test]
    fn test_creates_archive_root() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let root = archive.path().join("nested").join("Photos");
        stage(source.path(), "PXL_20230101_100000000.jpg", 2000);

        let result = run(&config(), source.path(), &root);
        assert_eq!(result.copied, 1);
        assert!(root.join("2023-01-01").is_dir());
    }

    #[test]
    fn test_import_staging_uses_test_archive() {
        let staging = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let test_archive = tempfile::tempdir().unwrap();
        stage(staging.path(), "PXL_20230101_100000000.jpg", 2000);

        let config = crate::config::ImportConfigBuilder::from_config(config())
            .staging_dir(staging.path())
            .archive_dir(archive.path())
            .test_archive_dir(test_archive.path())
            .test_mode(true)
            .build();
        let result = import_staging(&config, &ProgressReporter::disabled());

        assert_eq!(result.copied, 1);
        assert!(test_archive.path().join("2023-01-01").is_dir());
        assert!(!archive.path().join("2023-01-01").exists());
    }

    #[test]
    fn test_plan_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jpg");
        assert_eq!(plan_transfer(10, &dest).unwrap(), TransferOutcome::Copied);

        std::fs::write(&dest, vec![0u8; 10]).unwrap();
        assert_eq!(plan_transfer(10, &dest).unwrap(), TransferOutcome::Skipped);
        assert_eq!(plan_transfer(11, &dest).unwrap(), TransferOutcome::Overwritten);
    }

    #[test]
    fn test_ensure_bucket_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("2023-01-01");
        assert!(ensure_bucket(&bucket).unwrap());
        assert!(!ensure_bucket(&bucket).unwrap());
    }

    #[test]
    fn test_aside_path() {
        assert_eq!(
            aside_path(Path::new("/a/PXL_1.NIGHT.jpg"), 0),
            PathBuf::from("/a/PXL_1.NIGHT.prev.jpg")
        );
        assert_eq!(
            aside_path(Path::new("/a/PXL_1.jpg"), 2),
            PathBuf::from("/a/PXL_1.prev.2.jpg")
        );
        assert_eq!(aside_path(Path::new("/a/noext"), 0), PathBuf::from("/a/noext.prev"));
    }

    #[test]
    fn test_keep_previous_never_replaces_a_backup() {
        let source = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let config = crate::config::ImportConfigBuilder::from_config(config())
            .overwrite_policy(OverwritePolicy::KeepPrevious)
            .build();

        for size in [1100, 1200, 1300] {
            stage(source.path(), "PXL_20230102_100000000.jpg", size);
            let result = run(&config, source.path(), archive.path());
            assert!(result.is_success());
        }

        let bucket = archive.path().join("2023-01-02");
        let len_of = |name: &str| std::fs::metadata(bucket.join(name)).unwrap().len();
        assert_eq!(len_of("PXL_20230102_100000000.jpg"), 1300);
        assert_eq!(len_of("PXL_20230102_100000000.prev.jpg"), 1100);
        assert_eq!(len_of("PXL_20230102_100000000.prev.1.jpg"), 1200);
        assert_eq!(std::fs::read_dir(&bucket).unwrap().count(), 3);
    }
}
