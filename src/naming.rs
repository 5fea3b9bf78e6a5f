//! Camera file naming conventions
//!
//! Dates come from the file name only; nothing here opens a file. Two
//! vendor conventions are recognized:
//!
//! - `PXL_YYYYMMDD_HHMMSSmmm...` (Pixel camera, `_` separated)
//! - `IMG-YYYYMMDD-WA0001...` (messaging apps, `-` separated)

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::error::ImportError;

/// Shape of a file name as produced by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    /// Anything that does not match a camera pattern exactly
    Unknown,
    /// Camera still
    Photo,
    /// Camera clip
    Video,
}

impl FileClass {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FileClass::Unknown => "unknown",
            FileClass::Photo => "photo",
            FileClass::Video => "video",
        }
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Calendar date used to name archive folders, shown as `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Build from year, month and day; `None` for impossible dates
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parse exactly eight ASCII digits laid out as `YYYYMMDD`
    pub fn from_digits(digits: &str) -> Option<Self> {
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year = digits[0..4].parse().ok()?;
        let month = digits[4..6].parse().ok()?;
        let day = digits[6..8].parse().ok()?;
        Self::from_ymd(year, month, day)
    }

    /// The date as `YYYYMMDD`
    pub fn to_digits(&self) -> String {
        format!("{:04}{:02}{:02}", self.0.year(), self.0.month(), self.0.day())
    }

    /// Underlying calendar date
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Extract the capture date from a camera file name.
///
/// Returns `None` for unrecognized prefixes, fewer than three segments, or a
/// date segment that is not exactly eight digits forming a real date.
/// Camera naming only promises eight digits; a segment such as `20231345`
/// has the right shape but no calendar day and is rejected here too.
pub fn extract_date(file_name: &str) -> Option<DateKey> {
    let separator = if file_name.starts_with("PXL_") {
        '_'
    } else if file_name.starts_with("IMG-") {
        '-'
    } else {
        return None;
    };

    let parts: Vec<&str> = file_name.split(separator).collect();
    if parts.len() < 3 {
        return None;
    }
    DateKey::from_digits(parts[1])
}

fn photo_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    // PXL_20230101_123456789.jpg, PXL_20230101_123456789~2.NIGHT.jpg,
    // PXL_20230101_123456789.LONG_EXPOSURE-02.ORIGINAL.jpg
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^PXL_\d+_\d+(~\d+)?(\.[\w\-]+)*\.jpg$").expect("valid photo pattern")
    })
}

fn video_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^PXL_\d+_\d+(~\d+)?(\.[\w\-]+)*\.mp4$").expect("valid video pattern")
    })
}

/// Classify a file name. Matching is case-sensitive: `.JPG` is `Unknown`.
pub fn classify(file_name: &str) -> FileClass {
    if photo_pattern().is_match(file_name) {
        FileClass::Photo
    } else if video_pattern().is_match(file_name) {
        FileClass::Video
    } else {
        FileClass::Unknown
    }
}

/// Classify every entry of a directory, or a single file name.
///
/// Entries come back in directory enumeration order.
pub fn classify_dir(path: &Path) -> Result<Vec<(String, FileClass)>, ImportError> {
    if !path.is_dir() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let class = classify(&name);
        return Ok(vec![(name, class)]);
    }

    let mut classes = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            ImportError::io_error(e.path().map(|p| p.to_path_buf()), e.to_string())
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        let class = classify(&name);
        classes.push((name, class));
    }
    Ok(classes)
}
