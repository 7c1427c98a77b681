//! Streaming ZIP assembly of the output parts.
//!
//! Entries are written through the archive writer as each part is produced,
//! so peak memory is bounded by one serialized part plus the growing
//! compressed output, never by the sum of uncompressed parts. The archive
//! must be finalized before the bytes are handed out.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SplitError;

/// Accumulates named byte blobs into one compressed archive.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
            entries: 0,
        }
    }

    /// Appends one entry. Entries are stored in call order.
    ///
    /// Duplicate names cannot occur when callers follow the part naming
    /// contract; hitting one is an invariant violation, not a user error.
    pub fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), SplitError> {
        let inserted = self.names.insert(name.to_string());
        debug_assert!(inserted, "duplicate archive entry name: {}", name);

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer
            .start_file(name, options)
            .map_err(|e| SplitError::Archive(format!("failed to start entry {}: {}", name, e)))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| SplitError::Archive(format!("failed to write entry {}: {}", name, e)))?;

        self.entries += 1;
        Ok(())
    }

    /// Number of entries written so far.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Flushes all entries, writes the central directory and returns the
    /// archive bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, SplitError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| SplitError::Archive(format!("archive finalization failed: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
