use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IoContext, Result, SkudexError};
use crate::external_sort::constants::LINE_TERMINATOR;
use crate::external_sort::record::Record;
use crate::index::catalog::IndexCatalog;

/// Serving entry point: the sorted file plus its loaded catalog.
///
/// Holds no open handle. Every lookup opens the file, seeks and reads its
/// key's run, so concurrent callers never share a cursor.
#[derive(Debug, Clone)]
pub struct RangeLookup {
    sorted_file: PathBuf,
    catalog: Arc<IndexCatalog>,
}

impl RangeLookup {
    pub fn open(sorted_file: &Path, index_file: &Path) -> Result<Self> {
        let catalog = IndexCatalog::open(sorted_file, index_file)?;
        Ok(Self::new(sorted_file.to_path_buf(), Arc::new(catalog)))
    }

    pub fn new(sorted_file: PathBuf, catalog: Arc<IndexCatalog>) -> Self {
        Self { sorted_file, catalog }
    }

    pub fn lookup(&self, key: &str, rank_threshold: f64) -> Result<Vec<(String, f64)>> {
        lookup(&self.sorted_file, &self.catalog, key, rank_threshold)
    }

    pub fn index_size(&self) -> usize {
        self.catalog.len()
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }
}

/// Returns `(value, rank)` pairs for `key` with `rank > rank_threshold`,
/// ascending by rank. An unknown key yields an empty list.
pub fn lookup(
    sorted_file: &Path,
    catalog: &IndexCatalog,
    key: &str,
    rank_threshold: f64,
) -> Result<Vec<(String, f64)>> {
    let Some(entry) = catalog.get(key) else {
        return Ok(Vec::new());
    };

    let width = catalog.record_width();
    let byte_offset = catalog.layout().byte_offset(entry.start_line);
    let run_bytes = usize::try_from(entry.line_count())
        .ok()
        .and_then(|lines| lines.checked_mul(width))
        .ok_or_else(|| {
            SkudexError::config_mismatch(format!("run for key {:?} is too large to read", key))
        })?;

    let mut file = File::open(sorted_file).io_context(sorted_file, "open sorted file")?;
    file.seek(SeekFrom::Start(byte_offset))
        .io_context(sorted_file, "seek sorted file")?;

    let mut buf = vec![0u8; run_bytes];
    file.read_exact(&mut buf)
        .io_context(sorted_file, "read sorted file")?;

    let mut results = Vec::with_capacity(buf.len() / width.max(1));
    for raw in buf.chunks(width.max(1)) {
        if raw.last() != Some(&LINE_TERMINATOR) {
            return Err(SkudexError::config_mismatch(format!(
                "record at offset {} is not terminated at width {}",
                byte_offset, width
            )));
        }
        let line = String::from_utf8_lossy(raw);
        let record = Record::decode(&line)?;
        if record.rank > rank_threshold {
            results.push(record.into_pair());
        }
    }

    results.sort_by(|a, b| a.1.total_cmp(&b.1));
    Ok(results)
}
