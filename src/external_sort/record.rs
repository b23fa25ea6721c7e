use std::cmp::Ordering;

use crate::error::{Result, SkudexError};
use crate::external_sort::constants::*;

/// One `(key, value, rank)` data row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: String,
    pub rank: f64,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>, rank: f64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            rank,
        }
    }

    /// Serializes as `key,value,rank\n`.
    ///
    /// Offset addressing requires every encoded line in one sorted file to
    /// have the same byte length. The codec does not pad or check this; the
    /// index builder rejects files where it does not hold.
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}\n",
            self.key,
            self.value,
            self.rank,
            sep = FIELD_SEPARATOR
        )
    }

    /// Parses one line, with or without its terminator.
    pub fn decode(line: &str) -> Result<Self> {
        let trimmed = strip_terminator(line);
        let mut fields = trimmed.split(FIELD_SEPARATOR);
        let (key, value, rank) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(key), Some(value), Some(rank), None) => (key, value, rank),
            _ => {
                return Err(SkudexError::malformed_record(
                    trimmed,
                    format!("expected {} comma-separated fields", RECORD_FIELD_COUNT),
                ))
            }
        };

        let rank = rank.trim().parse::<f64>().map_err(|e| {
            SkudexError::malformed_record(trimmed, format!("rank {:?} is not a number: {}", rank, e))
        })?;

        Ok(Self::new(key, value, rank))
    }

    pub fn sort_key(&self) -> &str {
        &self.key
    }

    pub fn into_pair(self) -> (String, f64) {
        (self.value, self.rank)
    }
}

/// Removes a trailing `\n` or `\r\n`.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Extracts the ordering key from an encoded line without decoding the rest.
pub fn sort_key_of(line: &str) -> &str {
    match line.find(FIELD_SEPARATOR) {
        Some(pos) => &line[..pos],
        None => strip_terminator(line),
    }
}

/// A validated input line as it moves through the sorter and the merger.
///
/// The original text is kept byte for byte so the sorted file preserves the
/// input's fixed widths; the rank is never re-formatted.
#[derive(Debug, Clone)]
pub struct SortRecord {
    line: String,
    key_len: usize,
}

impl SortRecord {
    /// Validates `line` with the codec. Returns `Ok(None)` for blank lines.
    pub fn from_line(line: &str) -> Result<Option<Self>> {
        let trimmed = strip_terminator(line);
        if trimmed.trim().is_empty() {
            return Ok(None);
        }

        let record = Record::decode(trimmed)?;
        Ok(Some(Self {
            key_len: record.key.len(),
            line: trimmed.to_string(),
        }))
    }

    pub fn sort_key(&self) -> &str {
        &self.line[..self.key_len]
    }

    /// The record text without terminator.
    pub fn as_line(&self) -> &str {
        &self.line
    }

    /// Bytes this record occupies once written with its terminator.
    pub fn encoded_len(&self) -> usize {
        self.line.len() + 1
    }

    pub fn estimated_size(&self) -> usize {
        self.line.len() + ESTIMATED_RECORD_OVERHEAD_BYTES
    }
}

impl PartialEq for SortRecord {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for SortRecord {}

impl PartialOrd for SortRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(other.sort_key())
    }
}
