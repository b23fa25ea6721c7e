use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{IoContext, Result};
use crate::external_sort::chunk::ChunkProcessor;
use crate::external_sort::merger::ChunkMerger;
use crate::external_sort::{BuildConfig, BuildStats};
use crate::index::IndexBuilder;

/// Runs split, merge and index build one after another.
pub struct BuildPipeline {
    config: BuildConfig,
    chunk_processor: ChunkProcessor,
    merger: ChunkMerger,
    index_builder: IndexBuilder,
}

impl BuildPipeline {
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        let partition_dir = config.partition_directory();
        std::fs::create_dir_all(&partition_dir)
            .io_context(&partition_dir, "create partition directory")?;

        let chunk_processor = ChunkProcessor::new(config.io_buffer_size_bytes(), partition_dir);
        let merger = ChunkMerger::new(
            config.io_buffer_size_bytes(),
            config.merge_progress_interval_seconds,
        );
        let index_builder = IndexBuilder::new(config.io_buffer_size_bytes())
            .with_record_width(config.record_width)
            .with_strict_order(config.strict_index);

        Ok(Self {
            config,
            chunk_processor,
            merger,
            index_builder,
        })
    }

    pub fn run(&self, input_file: &Path, sorted_file: &Path, index_file: &Path) -> Result<BuildStats> {
        let file = File::open(input_file).io_context(input_file, "open input")?;
        let reader = BufReader::with_capacity(self.config.io_buffer_size_bytes(), file);
        self.run_from_reader(reader, input_file, sorted_file, index_file)
    }

    /// Same as [`run`](Self::run) for an already-open input stream; `source`
    /// only labels errors.
    pub fn run_from_reader<R: std::io::BufRead>(
        &self,
        reader: R,
        source: &Path,
        sorted_file: &Path,
        index_file: &Path,
    ) -> Result<BuildStats> {
        let mut stats = BuildStats::default();

        let stale = self.chunk_processor.cleanup_partitions()?;
        if stale > 0 {
            warn!("Removed {} stale partition files from a previous run", stale);
        }

        let batch_size = self.config.effective_batch_size();
        info!("Splitting {} into sorted partitions of {} records", source.display(), batch_size);

        let split_start = Instant::now();
        let chunks = match self.chunk_processor.split_to_sorted_partitions(reader, source, batch_size) {
            Ok(chunks) => chunks,
            Err(e) => {
                // Nothing was registered for merge; drop what was written.
                if let Err(cleanup_err) = self.chunk_processor.cleanup_partitions() {
                    warn!("Failed to clean up partitions after split error: {}", cleanup_err);
                }
                return Err(e);
            }
        };
        stats.split_time_ms = split_start.elapsed().as_millis() as u64;
        stats.partitions_created = chunks.len();
        stats.total_records = chunks.iter().map(|c| c.record_count).sum();
        info!("Created {} partitions holding {} records", chunks.len(), stats.total_records);

        let merge_start = Instant::now();
        let summary = self.merger.merge_chunks(&chunks, sorted_file)?;
        stats.merge_time_ms = merge_start.elapsed().as_millis() as u64;
        info!("Merged into {} ({} records)", sorted_file.display(), summary.records_written);

        let index_start = Instant::now();
        let layout = self.index_builder.build_index(sorted_file, index_file)?;
        stats.index_time_ms = index_start.elapsed().as_millis() as u64;
        stats.distinct_keys = layout.key_count as usize;
        stats.record_width = layout.record_width;
        info!(
            "Wrote index {} with {} keys (record width {} bytes)",
            index_file.display(),
            layout.key_count,
            layout.record_width
        );

        Ok(stats)
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Removes the partition directory if nothing else was left in it. The
    /// configured temp directory itself is never removed.
    pub fn cleanup(&self) -> Result<()> {
        self.chunk_processor.cleanup_partitions()?;
        let partition_dir = self.config.partition_directory();
        if partition_dir.exists() {
            if let Err(e) = std::fs::remove_dir(&partition_dir) {
                warn!("Partition directory {} not removed: {}", partition_dir.display(), e);
            }
        }
        Ok(())
    }
}
