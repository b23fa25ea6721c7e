use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use crate::error::{IoContext, Result, SkudexError};
use crate::external_sort::record::strip_terminator;
use crate::index::builder::IndexEntry;
use crate::index::constants::{INDEX_FIELD_COUNT, INDEX_FIELD_SEPARATOR};
use crate::index::layout::IndexLayout;

/// In-memory key to line-range mapping. Immutable once loaded; share it
/// behind an `Arc` between concurrent lookups.
#[derive(Debug, Clone)]
pub struct IndexCatalog {
    entries: HashMap<String, IndexEntry>,
    layout: IndexLayout,
}

impl IndexCatalog {
    /// Loads the index and its layout, and verifies the layout against
    /// `sorted_file` before returning.
    pub fn open(sorted_file: &Path, index_file: &Path) -> Result<Self> {
        let layout = IndexLayout::load(index_file)?;
        layout.verify_sorted_file(sorted_file)?;

        let entries = load_index(index_file)?;
        for (key, entry) in &entries {
            if entry.end_line >= layout.line_count {
                return Err(SkudexError::config_mismatch(format!(
                    "index entry {:?} ends at line {} but the sorted file has {} lines",
                    key, entry.end_line, layout.line_count
                )));
            }
        }

        info!(
            "Loaded {} index entries (record width {}, {} lines)",
            entries.len(),
            layout.record_width,
            layout.line_count
        );
        Ok(Self { entries, layout })
    }

    pub fn from_parts(entries: HashMap<String, IndexEntry>, layout: IndexLayout) -> Self {
        Self { entries, layout }
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    pub fn record_width(&self) -> usize {
        self.layout.record_width
    }
}

/// Parses an index file into a mapping. A later line for the same key
/// replaces the earlier one. Any malformed line fails the whole load.
pub fn load_index(index_file: &Path) -> Result<HashMap<String, IndexEntry>> {
    let file = File::open(index_file).io_context(index_file, "open index file")?;
    let reader = BufReader::new(file);
    let mut entries = HashMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.io_context(index_file, "read index file")?;
        let (key, entry) = parse_index_line(strip_terminator(&line), i + 1)?;
        entries.insert(key.to_string(), entry);
    }

    Ok(entries)
}

fn parse_index_line(line: &str, line_number: usize) -> Result<(&str, IndexEntry)> {
    let fields: Vec<&str> = line.split(INDEX_FIELD_SEPARATOR).collect();
    if fields.len() != INDEX_FIELD_COUNT {
        return Err(SkudexError::malformed_index(
            line_number,
            format!("expected {} fields, found {}", INDEX_FIELD_COUNT, fields.len()),
        ));
    }

    let parse_line_no = |field: &str, name: &str| {
        field.trim().parse::<u64>().map_err(|e| {
            SkudexError::malformed_index(line_number, format!("{} {:?}: {}", name, field, e))
        })
    };
    let start_line = parse_line_no(fields[1], "start_line")?;
    let end_line = parse_line_no(fields[2], "end_line")?;

    if end_line < start_line {
        return Err(SkudexError::malformed_index(
            line_number,
            format!("end_line {} precedes start_line {}", end_line, start_line),
        ));
    }

    Ok((fields[0], IndexEntry { start_line, end_line }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_index(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.csv");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_parses_entries() {
        let (_dir, path) = write_index("a,0,0\nb,1,2\n");
        let entries = load_index(&path).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["b"], IndexEntry { start_line: 1, end_line: 2 });
        assert_eq!(entries["b"].line_count(), 2);
    }

    #[test]
    fn test_later_duplicate_replaces_earlier() {
        let (_dir, path) = write_index("b,0,0\na,1,1\nb,2,2\n");
        let entries = load_index(&path).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["b"], IndexEntry { start_line: 2, end_line: 2 });
    }

    #[test]
    fn test_malformed_lines_fail_the_load() {
        for content in ["a,0\n", "a,x,1\n", "a,0,1,2\n", "a,0,0\nb,5,3\n"] {
            let (_dir, path) = write_index(content);
            assert!(
                matches!(load_index(&path), Err(SkudexError::MalformedIndex { .. })),
                "expected failure for {:?}",
                content
            );
        }
    }

    #[test]
    fn test_malformed_index_reports_line_number() {
        let (_dir, path) = write_index("a,0,0\nb,1\n");
        match load_index(&path) {
            Err(SkudexError::MalformedIndex { line_number, .. }) => assert_eq!(line_number, 2),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_open_rejects_entry_past_end_of_file() {
        let dir = tempdir().unwrap();
        let sorted = dir.path().join("sorted.csv");
        let index = dir.path().join("index.csv");
        std::fs::write(&sorted, "a,v2,0.9\n").unwrap();
        std::fs::write(&index, "a,0,4\n").unwrap();
        IndexLayout::new(9, 1, 1).save(&index).unwrap();

        assert!(matches!(
            IndexCatalog::open(&sorted, &index),
            Err(SkudexError::ConfigMismatch(_))
        ));
    }
}
