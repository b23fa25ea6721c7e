use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{IoContext, Result, SkudexError};
use crate::external_sort::constants::{BYTES_PER_KB, LINE_TERMINATOR, OUTPUT_BUFFER_SIZE_KB};
use crate::external_sort::record::sort_key_of;
use crate::index::constants::INDEX_FIELD_SEPARATOR;
use crate::index::layout::IndexLayout;

/// Inclusive run of lines in the sorted file sharing one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub start_line: u64,
    pub end_line: u64,
}

impl IndexEntry {
    pub fn line_count(&self) -> u64 {
        self.end_line - self.start_line + 1
    }
}

pub struct IndexBuilder {
    io_buffer_size: usize,
    record_width: Option<usize>,
    strict: bool,
}

struct OpenRun {
    key: String,
    start_line: u64,
}

impl IndexBuilder {
    pub fn new(io_buffer_size: usize) -> Self {
        Self {
            io_buffer_size,
            record_width: None,
            strict: true,
        }
    }

    /// Requires every line to be exactly `width` bytes. Without it the
    /// first line's width is adopted.
    pub fn with_record_width(mut self, width: Option<usize>) -> Self {
        self.record_width = width;
        self
    }

    /// When disabled, an unsorted file produces disjoint runs for the same
    /// key instead of an error.
    pub fn with_strict_order(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Scans `sorted_file` once and writes `key,start_line,end_line` lines
    /// to `index_file`, plus the layout sidecar.
    pub fn build_index(&self, sorted_file: &Path, index_file: &Path) -> Result<IndexLayout> {
        let input = File::open(sorted_file).io_context(sorted_file, "open sorted file")?;
        let mut reader = BufReader::with_capacity(self.io_buffer_size, input);

        let output = File::create(index_file).io_context(index_file, "create index file")?;
        let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE_KB * BYTES_PER_KB, output);

        let mut width = self.record_width;
        let mut run: Option<OpenRun> = None;
        let mut line_number = 0u64;
        let mut key_count = 0u64;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(LINE_TERMINATOR, &mut buf)
                .io_context(sorted_file, "read sorted file")?;
            if read == 0 {
                break;
            }

            let expected = *width.get_or_insert(read);
            if read != expected || buf.last() != Some(&LINE_TERMINATOR) {
                return Err(SkudexError::config_mismatch(format!(
                    "line {} of {} is {} bytes, expected {} including the terminator",
                    line_number,
                    sorted_file.display(),
                    read,
                    expected
                )));
            }

            let line = std::str::from_utf8(&buf).map_err(|e| {
                SkudexError::io(
                    sorted_file,
                    "decode sorted file",
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                )
            })?;
            let key = sort_key_of(line);

            if let Some(open) = run.as_mut() {
                if open.key != key {
                    if self.strict && key < open.key.as_str() {
                        return Err(SkudexError::IndexBuildInvariant {
                            key: key.to_string(),
                            line: line_number,
                        });
                    }
                    write_entry(&mut writer, index_file, &open.key, open.start_line, line_number - 1)?;
                    key_count += 1;
                    open.key.clear();
                    open.key.push_str(key);
                    open.start_line = line_number;
                }
            } else {
                run = Some(OpenRun {
                    key: key.to_string(),
                    start_line: line_number,
                });
            }

            line_number += 1;
        }

        if let Some(open) = run {
            write_entry(&mut writer, index_file, &open.key, open.start_line, line_number - 1)?;
            key_count += 1;
        }

        writer.flush().io_context(index_file, "flush index file")?;

        let layout = IndexLayout::new(width.unwrap_or(0), line_number, key_count);
        layout.save(index_file)?;

        debug!(
            "Indexed {} lines into {} key runs (record width {})",
            line_number, key_count, layout.record_width
        );
        Ok(layout)
    }
}

fn write_entry<W: Write>(
    writer: &mut W,
    index_file: &Path,
    key: &str,
    start_line: u64,
    end_line: u64,
) -> Result<()> {
    writeln!(
        writer,
        "{key}{sep}{start_line}{sep}{end_line}",
        sep = INDEX_FIELD_SEPARATOR
    )
    .io_context(index_file, "write index file")
}
