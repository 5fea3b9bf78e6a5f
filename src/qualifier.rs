//! Size-based admission check for candidate files

use std::path::Path;

use crate::error::ImportError;
use crate::models::QualificationResult;

/// Rejects files below a byte threshold. Tiny files on a phone are
/// thumbnails, placeholders or truncated writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qualifier {
    min_size: u64,
}

impl Qualifier {
    pub fn new(min_size: u64) -> Self {
        Self { min_size }
    }

    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    /// Judge a file by its size in bytes. The threshold itself is accepted.
    pub fn qualify_size(&self, size: u64) -> QualificationResult {
        if size < self.min_size {
            return QualificationResult::rejected(format!(
                "Size under threshold {}",
                group_thousands(self.min_size)
            ));
        }
        QualificationResult::accepted()
    }

    /// Judge a file on disk. Fails only if its metadata cannot be read.
    pub fn qualify(&self, path: &Path) -> Result<QualificationResult, ImportError> {
        let metadata = std::fs::metadata(path).map_err(|e| ImportError::from(e).with_path(path))?;
        Ok(self.qualify_size(metadata.len()))
    }
}

/// 614400 -> "614,400"
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
