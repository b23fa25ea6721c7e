//! Record width metadata stored next to the index file.
//!
//! The sorted file is addressed by `record_width * line`, so the width is
//! recorded once at build time and checked against the data when the
//! catalog is opened.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result, SkudexError};
use crate::external_sort::constants::LINE_TERMINATOR;
use crate::index::constants::{LAYOUT_FORMAT_VERSION, LAYOUT_SUFFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLayout {
    pub format_version: u32,
    /// Bytes per line including the terminator. `0` for an empty file.
    pub record_width: usize,
    pub line_count: u64,
    pub key_count: u64,
    pub sorted_file_bytes: u64,
}

impl IndexLayout {
    pub fn new(record_width: usize, line_count: u64, key_count: u64) -> Self {
        Self {
            format_version: LAYOUT_FORMAT_VERSION,
            record_width,
            line_count,
            key_count,
            sorted_file_bytes: (record_width as u64).saturating_mul(line_count),
        }
    }

    /// `<index_file>.layout.json`
    pub fn sidecar_path(index_file: &Path) -> PathBuf {
        let mut name = OsString::from(index_file.as_os_str());
        name.push(LAYOUT_SUFFIX);
        PathBuf::from(name)
    }

    pub fn save(&self, index_file: &Path) -> Result<()> {
        let path = Self::sidecar_path(index_file);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SkudexError::config_mismatch(format!("cannot encode layout: {}", e)))?;
        std::fs::write(&path, content).io_context(&path, "write layout")
    }

    pub fn load(index_file: &Path) -> Result<Self> {
        let path = Self::sidecar_path(index_file);
        let content = std::fs::read_to_string(&path).io_context(&path, "read layout")?;
        let layout: Self = serde_json::from_str(&content).map_err(|e| {
            SkudexError::config_mismatch(format!("unreadable layout {}: {}", path.display(), e))
        })?;

        if layout.format_version != LAYOUT_FORMAT_VERSION {
            return Err(SkudexError::config_mismatch(format!(
                "layout format version {} is not supported (expected {})",
                layout.format_version, LAYOUT_FORMAT_VERSION
            )));
        }
        layout.expected_bytes()?;
        Ok(layout)
    }

    pub fn byte_offset(&self, line: u64) -> u64 {
        (self.record_width as u64).saturating_mul(line)
    }

    /// `record_width * line_count`, rejecting layouts that cannot describe
    /// a real file.
    pub fn expected_bytes(&self) -> Result<u64> {
        if self.record_width == 0 && self.line_count > 0 {
            return Err(SkudexError::config_mismatch(format!(
                "layout has {} lines of width 0",
                self.line_count
            )));
        }
        (self.record_width as u64)
            .checked_mul(self.line_count)
            .ok_or_else(|| {
                SkudexError::config_mismatch(format!(
                    "{} lines of {} bytes overflow the file size",
                    self.line_count, self.record_width
                ))
            })
    }

    /// Checks the sorted file's length and samples the first, middle and
    /// last lines for the stored width.
    pub fn verify_sorted_file(&self, sorted_file: &Path) -> Result<()> {
        let mut file = File::open(sorted_file).io_context(sorted_file, "open sorted file")?;
        let actual_len = file
            .metadata()
            .io_context(sorted_file, "stat sorted file")?
            .len();

        let expected_len = self.expected_bytes()?;
        if actual_len != self.sorted_file_bytes || actual_len != expected_len {
            return Err(SkudexError::config_mismatch(format!(
                "{} is {} bytes, layout expects {} lines of {} bytes",
                sorted_file.display(),
                actual_len,
                self.line_count,
                self.record_width
            )));
        }

        if self.line_count == 0 {
            return Ok(());
        }

        let mut samples = vec![0, self.line_count / 2, self.line_count - 1];
        samples.dedup();

        let mut buf = vec![0u8; self.record_width];
        for line in samples {
            file.seek(SeekFrom::Start(self.byte_offset(line)))
                .io_context(sorted_file, "seek sorted file")?;
            file.read_exact(&mut buf)
                .io_context(sorted_file, "read sorted file")?;

            let terminator_at = buf.iter().position(|&b| b == LINE_TERMINATOR);
            if terminator_at != Some(self.record_width - 1) {
                return Err(SkudexError::config_mismatch(format!(
                    "line {} of {} is not {} bytes wide",
                    line,
                    sorted_file.display(),
                    self.record_width
                )));
            }
        }

        Ok(())
    }
}
