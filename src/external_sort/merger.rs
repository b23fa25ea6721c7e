use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{IoContext, Result};
use crate::external_sort::chunk::ChunkMetadata;
use crate::external_sort::constants::*;
use crate::external_sort::record::SortRecord;

pub struct ChunkMerger {
    io_buffer_size: usize,
    progress_interval_seconds: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeSummary {
    pub records_written: usize,
    pub partitions_removed: usize,
}

/// Head record of one partition cursor. Ordered by `(key, chunk_id)` so the
/// lowest cursor id wins ties.
#[derive(Debug)]
struct MergeEntry {
    record: SortRecord,
    chunk_id: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.chunk_id == other.chunk_id && self.record.sort_key() == other.record.sort_key()
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.record
            .sort_key()
            .cmp(other.record.sort_key())
            .then(self.chunk_id.cmp(&other.chunk_id))
    }
}

struct Cursor<'a> {
    reader: BufReader<File>,
    path: &'a Path,
    line: String,
}

impl<'a> Cursor<'a> {
    fn open(path: &'a Path, io_buffer_size: usize) -> Result<Self> {
        let file = File::open(path).io_context(path, "open partition")?;
        Ok(Self {
            reader: BufReader::with_capacity(io_buffer_size, file),
            path,
            line: String::new(),
        })
    }

    fn next_record(&mut self) -> Result<Option<SortRecord>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .io_context(self.path, "read partition")?;
            if read == 0 {
                return Ok(None);
            }
            if let Some(record) = SortRecord::from_line(&self.line)? {
                return Ok(Some(record));
            }
        }
    }
}

impl ChunkMerger {
    pub fn new(io_buffer_size: usize, progress_interval_seconds: u64) -> Self {
        Self {
            io_buffer_size,
            progress_interval_seconds,
        }
    }

    /// K-way merges sorted partitions into `output_file`, then deletes them.
    ///
    /// Holds one buffered record per partition. Partitions are deleted only
    /// after the output has been flushed and synced; on any error they are
    /// left in place.
    pub fn merge_chunks(&self, chunks: &[ChunkMetadata], output_file: &Path) -> Result<MergeSummary> {
        let mut cursors = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            cursors.push(Cursor::open(&chunk.file_path, self.io_buffer_size)?);
        }

        let output = File::create(output_file).io_context(output_file, "create sorted file")?;
        let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE_KB * BYTES_PER_KB, output);

        let mut merge_heap = BinaryHeap::with_capacity(chunks.len().min(MERGE_HEAP_INITIAL_CAPACITY));
        for (chunk_id, cursor) in cursors.iter_mut().enumerate() {
            if let Some(record) = cursor.next_record()? {
                merge_heap.push(Reverse(MergeEntry { record, chunk_id }));
            }
        }

        let total_estimated_records: usize = chunks.iter().map(|c| c.record_count).sum();
        let progress_interval = Duration::from_secs(self.progress_interval_seconds);
        let mut last_progress_time = Instant::now();
        let mut records_written = 0usize;

        while let Some(Reverse(entry)) = merge_heap.pop() {
            writeln!(writer, "{}", entry.record.as_line())
                .io_context(output_file, "write sorted file")?;
            records_written += 1;

            if let Some(next) = cursors[entry.chunk_id].next_record()? {
                merge_heap.push(Reverse(MergeEntry {
                    record: next,
                    chunk_id: entry.chunk_id,
                }));
            }

            if last_progress_time.elapsed() >= progress_interval {
                let pct = if total_estimated_records > 0 {
                    (records_written as f64 / total_estimated_records as f64 * 100.0).min(100.0)
                } else {
                    0.0
                };
                info!("Merge progress: {:.1}% ({} records written)", pct, records_written);
                last_progress_time = Instant::now();
            }
        }

        writer.flush().io_context(output_file, "flush sorted file")?;
        writer
            .get_ref()
            .sync_all()
            .io_context(output_file, "sync sorted file")?;
        drop(writer);
        drop(cursors);

        let partitions_removed = remove_partitions(chunks);
        debug!(
            "Merged {} partitions into {} records, removed {} partition files",
            chunks.len(),
            records_written,
            partitions_removed
        );

        Ok(MergeSummary {
            records_written,
            partitions_removed,
        })
    }
}

/// Best-effort removal. Missing files are skipped silently.
fn remove_partitions(chunks: &[ChunkMetadata]) -> usize {
    let mut removed = 0;
    for chunk in chunks {
        match std::fs::remove_file(&chunk.file_path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partition {}: {}", chunk.chunk_id, e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_chunk(dir: &Path, chunk_id: usize, content: &str) -> ChunkMetadata {
        let file_path = dir.join(format!("chunk_{}.csv", chunk_id));
        std::fs::write(&file_path, content).unwrap();
        ChunkMetadata {
            chunk_id,
            file_path,
            record_count: content.lines().count(),
            file_size_bytes: content.len() as u64,
        }
    }

    #[test]
    fn test_merge_orders_globally_and_breaks_ties_by_cursor() {
        let dir = tempdir().unwrap();
        let chunks = vec![
            write_chunk(dir.path(), 0, "a,p0,0.1\nc,p0,0.2\nc,p0b,0.3\n"),
            write_chunk(dir.path(), 1, "b,p1,0.4\nc,p1,0.5\n"),
            write_chunk(dir.path(), 2, ""),
        ];
        let output = dir.path().join("sorted.csv");

        let summary = ChunkMerger::new(4096, 60).merge_chunks(&chunks, &output).unwrap();

        assert_eq!(summary.records_written, 5);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "a,p0,0.1\nb,p1,0.4\nc,p0,0.2\nc,p0b,0.3\nc,p1,0.5\n"
        );
    }

    #[test]
    fn test_partitions_deleted_after_success_and_missing_ones_skipped() {
        let dir = tempdir().unwrap();
        let chunks = vec![
            write_chunk(dir.path(), 0, "a,1,0.1\n"),
            write_chunk(dir.path(), 1, "b,2,0.2\n"),
        ];
        let output = dir.path().join("sorted.csv");

        let summary = ChunkMerger::new(4096, 60).merge_chunks(&chunks, &output).unwrap();
        assert_eq!(summary.partitions_removed, 2);
        assert!(chunks.iter().all(|c| !c.file_path.exists()));

        // A second removal pass over the same handles is a no-op.
        assert_eq!(remove_partitions(&chunks), 0);
    }

    #[test]
    fn test_failed_merge_keeps_partitions() {
        let dir = tempdir().unwrap();
        let chunks = vec![write_chunk(dir.path(), 0, "a,1,0.1\n")];
        let output = dir.path().join("missing_dir").join("sorted.csv");

        let result = ChunkMerger::new(4096, 60).merge_chunks(&chunks, &output);
        assert!(matches!(result, Err(crate::SkudexError::Io { .. })));
        assert!(chunks[0].file_path.exists());
    }

    #[test]
    fn test_merge_of_no_partitions_creates_empty_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("sorted.csv");

        let summary = ChunkMerger::new(4096, 60).merge_chunks(&[], &output).unwrap();
        assert_eq!(summary.records_written, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
    }
}
