pub mod config;
pub mod constants;
pub mod processor;
pub mod record;
pub mod chunk;
pub mod merger;

#[cfg(test)]
mod tests;

pub use config::BuildConfig;
pub use processor::BuildPipeline;
pub use record::{Record, SortRecord};

use crate::error::Result;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub total_records: usize,
    pub partitions_created: usize,
    pub distinct_keys: usize,
    pub record_width: usize,
    pub split_time_ms: u64,
    pub merge_time_ms: u64,
    pub index_time_ms: u64,
}

impl BuildStats {
    pub fn total_time_ms(&self) -> u64 {
        self.split_time_ms + self.merge_time_ms + self.index_time_ms
    }
}

/// Builds the sorted file and its index from `input_file` in one call.
pub fn build_sorted_index(
    input_file: &Path,
    sorted_file: &Path,
    index_file: &Path,
    config: BuildConfig,
) -> Result<BuildStats> {
    let pipeline = BuildPipeline::new(config)?;
    let stats = pipeline.run(input_file, sorted_file, index_file)?;
    pipeline.cleanup()?;
    Ok(stats)
}
