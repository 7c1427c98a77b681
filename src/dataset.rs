//! In-memory tabular representation shared by readers and writers.

use std::ops::Range;

/// A materialized table: one header plus ordered data rows.
///
/// The header is read once from the input and preserved verbatim on every
/// output part. A dataset is read-only after construction and dropped when
/// the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Borrows the contiguous row range for one part.
    ///
    /// Panics if the range is out of bounds; callers derive ranges from
    /// `partition::plan`, which never exceeds the row count.
    pub fn slice(&self, range: Range<usize>) -> &[Vec<String>] {
        &self.rows[range]
    }
}
