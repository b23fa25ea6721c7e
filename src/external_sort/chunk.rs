use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{IoContext, Result};
use crate::external_sort::constants::*;
use crate::external_sort::record::SortRecord;

/// A sorted partition written by [`ChunkProcessor`].
#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    pub chunk_id: usize,
    pub file_path: PathBuf,
    pub record_count: usize,
    pub file_size_bytes: u64,
}

pub struct ChunkProcessor {
    io_buffer_size: usize,
    partition_dir: PathBuf,
}

impl ChunkProcessor {
    pub fn new(io_buffer_size: usize, partition_dir: PathBuf) -> Self {
        Self {
            io_buffer_size,
            partition_dir,
        }
    }

    /// Splits `reader` into sorted partitions of `batch_size` records each.
    ///
    /// Partition `n` is written to `chunk_<n>.csv` in the partition directory.
    /// Any error aborts the split; partitions written before the failure are
    /// left on disk for the caller to remove.
    pub fn split_to_sorted_partitions<R: BufRead>(
        &self,
        mut reader: R,
        source: &Path,
        batch_size: usize,
    ) -> Result<Vec<ChunkMetadata>> {
        let batch_size = batch_size.max(1);
        let mut chunks = Vec::new();
        let mut current_chunk = Vec::with_capacity(batch_size.min(MAX_PREALLOCATED_RECORDS));
        let mut line = String::new();
        let mut line_count = 0usize;

        loop {
            line.clear();
            let read = reader.read_line(&mut line).io_context(source, "read input")?;
            if read == 0 {
                break;
            }
            line_count += 1;

            if let Some(record) = SortRecord::from_line(&line)? {
                current_chunk.push(record);
            }

            if current_chunk.len() == batch_size {
                let chunk = self.sort_and_write_chunk(chunks.len(), std::mem::take(&mut current_chunk))?;
                chunks.push(chunk);
            }
        }

        if !current_chunk.is_empty() {
            let chunk = self.sort_and_write_chunk(chunks.len(), current_chunk)?;
            chunks.push(chunk);
        }

        debug!("Read {} input lines into {} partitions", line_count, chunks.len());
        Ok(chunks)
    }

    pub fn sort_and_write_chunk(
        &self,
        chunk_id: usize,
        mut records: Vec<SortRecord>,
    ) -> Result<ChunkMetadata> {
        // par_sort_by is stable, so equal keys keep their input order.
        records.par_sort_by(|a, b| a.sort_key().cmp(b.sort_key()));

        let chunk_file = self.chunk_path(chunk_id);
        let file = File::create(&chunk_file).io_context(&chunk_file, "create partition")?;
        let mut writer = BufWriter::with_capacity(self.io_buffer_size, file);

        for record in &records {
            writeln!(writer, "{}", record.as_line()).io_context(&chunk_file, "write partition")?;
        }

        writer.flush().io_context(&chunk_file, "flush partition")?;
        let file_size = std::fs::metadata(&chunk_file)
            .io_context(&chunk_file, "stat partition")?
            .len();

        debug!("Wrote partition {} with {} records", chunk_id, records.len());

        Ok(ChunkMetadata {
            chunk_id,
            file_path: chunk_file,
            record_count: records.len(),
            file_size_bytes: file_size,
        })
    }

    pub fn chunk_path(&self, chunk_id: usize) -> PathBuf {
        self.partition_dir.join(format!(
            "{}{}{}",
            CHUNK_FILE_PREFIX, chunk_id, CHUNK_FILE_EXTENSION
        ))
    }

    /// Removes every partition file in the partition directory, including
    /// ones left by an earlier failed run. Returns how many were removed.
    pub fn cleanup_partitions(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.partition_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(crate::SkudexError::io(&self.partition_dir, "list partition directory", e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.io_context(&self.partition_dir, "list partition directory")?.path();
            if !is_partition_file(&path) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove partition {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

fn is_partition_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| {
            name.strip_prefix(CHUNK_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(CHUNK_FILE_EXTENSION))
                .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        })
        .unwrap_or(false)
}
