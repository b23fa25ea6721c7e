use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use anyhow::Result;
use sysinfo::System;
use tracing::info;

use crate::error::SkudexError;
use crate::external_sort::constants::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Records per partition. `0` derives it from available memory.
    pub batch_size: usize,
    pub memory_usage_percent: f64,
    pub io_buffer_size_kb: usize,
    pub temp_directory: PathBuf,
    /// Declared byte width of every sorted line including `\n`.
    pub record_width: Option<usize>,
    pub strict_index: bool,
    pub merge_progress_interval_seconds: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            memory_usage_percent: DEFAULT_MEMORY_USAGE_PERCENT,
            io_buffer_size_kb: DEFAULT_IO_BUFFER_SIZE_KB,
            temp_directory: std::env::temp_dir(),
            record_width: None,
            strict_index: true,
            merge_progress_interval_seconds: DEFAULT_MERGE_PROGRESS_INTERVAL_SECONDS,
        }
    }
}

impl BuildConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(SkudexError::InvalidConfig(format!(
                "batch_size must not exceed {}",
                MAX_BATCH_SIZE
            )));
        }

        if self.batch_size == 0
            && (self.memory_usage_percent < MIN_MEMORY_USAGE_PERCENT
                || self.memory_usage_percent > MAX_MEMORY_USAGE_PERCENT)
        {
            return Err(SkudexError::InvalidConfig(format!(
                "memory_usage_percent must be between {} and {}",
                MIN_MEMORY_USAGE_PERCENT, MAX_MEMORY_USAGE_PERCENT
            )));
        }

        if self.io_buffer_size_kb < MIN_IO_BUFFER_SIZE_KB
            || self.io_buffer_size_kb > MAX_IO_BUFFER_SIZE_KB
        {
            return Err(SkudexError::InvalidConfig(format!(
                "io_buffer_size_kb must be between {} and {}",
                MIN_IO_BUFFER_SIZE_KB, MAX_IO_BUFFER_SIZE_KB
            )));
        }

        if let Some(width) = self.record_width {
            if width < MIN_RECORD_WIDTH {
                return Err(SkudexError::InvalidConfig(format!(
                    "record_width must be at least {} bytes",
                    MIN_RECORD_WIDTH
                )));
            }
        }

        if self.temp_directory.as_os_str().is_empty() {
            return Err(SkudexError::InvalidConfig(
                "temp_directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The batch size actually used by the sorter.
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size > 0 {
            return self.batch_size;
        }

        let mut system = System::new_all();
        system.refresh_memory();

        let budget = system.available_memory() as f64 * self.memory_usage_percent / 100.0;
        let per_record = (ESTIMATED_RECORD_TEXT_BYTES + ESTIMATED_RECORD_OVERHEAD_BYTES) as f64;
        let derived = ((budget / per_record) as usize).clamp(1, MAX_BATCH_SIZE);

        info!(
            "Derived batch size {} from {:.1} MB memory budget",
            derived,
            budget / BYTES_PER_MB as f64
        );
        derived
    }

    /// `<temp_directory>/skudex_partitions`, owned by the build.
    pub fn partition_directory(&self) -> PathBuf {
        self.temp_directory.join(PARTITION_DIR_NAME)
    }

    pub fn io_buffer_size_bytes(&self) -> usize {
        self.io_buffer_size_kb * BYTES_PER_KB
    }
}
