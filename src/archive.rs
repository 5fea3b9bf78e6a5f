//! Locating the most recent dated folder in the archive

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::naming::DateKey;

fn folder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:([_-])[\w\-]*)?$").expect("valid folder pattern")
    })
}

/// Read the date from an archive folder name such as `2023-05-20`,
/// `2023-05-20_Party` or `2023-05-20-Trip`.
///
/// With `require_trailing_marker` a bare date is rejected; the separator
/// must be present even when no description follows it.
pub fn date_from_folder_name(name: &str, require_trailing_marker: bool) -> Option<DateKey> {
    let caps = folder_pattern().captures(name)?;
    if require_trailing_marker && caps.get(4).is_none() {
        return None;
    }
    let digits = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
    DateKey::from_digits(&digits)
}

/// Newest dated folder directly under `dest_root`, with its path
pub fn find_latest_folder(
    dest_root: &Path,
    require_trailing_marker: bool,
) -> Option<(DateKey, PathBuf)> {
    if !dest_root.is_dir() {
        log::debug!("Archive root {} does not exist", dest_root.display());
        return None;
    }

    let mut latest: Option<(String, DateKey, PathBuf)> = None;
    for entry in WalkDir::new(dest_root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let name = entry.file_name().to_string_lossy();
        let Some(date) = date_from_folder_name(&name, require_trailing_marker) else {
            log::debug!("Ignoring folder {}", name);
            continue;
        };
        // Fixed-width digits order the same as the dates they spell
        let digits = date.to_digits();
        if latest.as_ref().map_or(true, |(best, _, _)| digits > *best) {
            latest = Some((digits, date, entry.path().to_path_buf()));
        }
    }
    latest.map(|(_, date, path)| (date, path))
}

/// Date of the newest dated folder directly under `dest_root`
pub fn find_latest(dest_root: &Path, require_trailing_marker: bool) -> Option<DateKey> {
    find_latest_folder(dest_root, require_trailing_marker).map(|(date, _)| date)
}
