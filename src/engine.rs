//! Request orchestration.
//!
//! The engine is the single entry point: it resolves configuration, picks
//! the reader for the declared extension, decides between the streaming and
//! materialized paths, drives the partitioner and writer, and assembles the
//! archive while reporting progress. It performs no recovery; the first
//! error wins and any partial archive is discarded. One request runs
//! start-to-finish on the calling thread and owns all of its buffers.

use std::sync::Arc;

use serde::Serialize;

use crate::archive::ArchiveBuilder;
use crate::cache::{self, ParseCache};
use crate::config::SplitConfig;
use crate::dataset::Dataset;
use crate::error::SplitError;
use crate::naming;
use crate::partition::{self, PartitionPlan};
use crate::reader::legacy::{LegacyReaderRegistry, LegacyWorkbookReader};
use crate::reader::{self, delimited, workbook, InputKind};
use crate::writer::{BackendChain, PartitionWriter};

// ─────────────────────────────────────────────────────────────────────────────
// Progress
// ─────────────────────────────────────────────────────────────────────────────

/// Receives `(completed, total)` part counts after each part is finalized.
///
/// Reports are purely advisory: the sequence is monotonically increasing
/// and ends at `(total, total)`.
pub trait ProgressSink {
    fn on_progress(&mut self, completed: usize, total: usize);
}

/// Ignores all progress reports.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _completed: usize, _total: usize) {}
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn on_progress(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / Outcome Types
// ─────────────────────────────────────────────────────────────────────────────

/// One split request: raw bytes, the original file name, and the resolved
/// configuration.
pub struct SplitRequest<'a> {
    pub bytes: &'a [u8],
    pub file_name: &'a str,
    pub config: SplitConfig,
}

impl<'a> SplitRequest<'a> {
    pub fn new(bytes: &'a [u8], file_name: &'a str, config: SplitConfig) -> Self {
        Self {
            bytes,
            file_name,
            config,
        }
    }
}

/// Terminal result of a successful request.
#[derive(Debug, Clone, Serialize)]
pub enum SplitOutcome {
    /// The table was split; the archive holds one file per part.
    Archive(ArchiveBundle),
    /// The table fits in a single chunk; the caller should offer the
    /// original file unchanged instead of an archive.
    NotSplit(NotSplit),
}

/// The assembled archive plus everything the shell needs to present it.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveBundle {
    /// Suggested download name, `<base>_dividido[_<token>].zip`.
    pub file_name: String,
    /// The archive bytes.
    pub bytes: Vec<u8>,
    /// Number of parts in the archive.
    pub partitions: usize,
    /// Data rows in each part, in emission order.
    pub rows_per_partition: Vec<usize>,
    /// Token shared by all part names of this request, if any.
    pub token: Option<String>,
}

/// Signal that no split was needed.
#[derive(Debug, Clone, Serialize)]
pub struct NotSplit {
    /// The original file name, unchanged.
    pub file_name: String,
    /// The original bytes, unchanged.
    pub bytes: Vec<u8>,
    /// Data rows counted in the table.
    pub rows: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// The splitting pipeline. Construct once, then run one request at a time.
pub struct SplitEngine {
    backends: BackendChain,
    legacy: LegacyReaderRegistry,
    cache: Option<ParseCache>,
}

impl SplitEngine {
    pub fn new() -> Self {
        Self {
            backends: BackendChain::standard(),
            legacy: LegacyReaderRegistry::new(),
            cache: None,
        }
    }

    /// Replaces the workbook backend chain.
    pub fn with_backends(mut self, backends: BackendChain) -> Self {
        self.backends = backends;
        self
    }

    /// Enables the parse cache with the given capacity.
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = Some(ParseCache::new(capacity));
        self
    }

    /// Registers a reader for legacy binary workbook formats.
    pub fn register_legacy_reader(&mut self, reader: Box<dyn LegacyWorkbookReader>) {
        self.legacy.register(reader);
    }

    /// Runs one request to completion.
    ///
    /// # Errors
    ///
    /// Any failure in reading, planning, serializing or assembly is
    /// terminal; no partial archive is ever returned.
    pub fn split(
        &mut self,
        request: &SplitRequest<'_>,
        progress: &mut dyn ProgressSink,
    ) -> Result<SplitOutcome, SplitError> {
        let chunk_size = partition::validate_chunk_size(request.config.chunk_size)?;
        let extension =
            naming::extension(request.file_name).ok_or_else(|| SplitError::UnsupportedFormat {
                extension: "(none)".into(),
            })?;
        let kind = reader::classify(&extension)?;
        let token = request.config.token.resolve();

        if kind == InputKind::Delimited && request.config.stream_csv {
            self.split_streamed(request, chunk_size, token.as_deref(), progress)
        } else {
            self.split_materialized(request, kind, &extension, chunk_size, token.as_deref(), progress)
        }
    }

    /// Streaming CSV path: one counting pass establishes the totals, then
    /// chunks are pulled, serialized and appended one at a time, so peak
    /// memory stays proportional to the chunk size.
    fn split_streamed(
        &self,
        request: &SplitRequest<'_>,
        chunk_size: usize,
        token: Option<&str>,
        progress: &mut dyn ProgressSink,
    ) -> Result<SplitOutcome, SplitError> {
        let dialect = &request.config.input_dialect;
        let (header, total_rows) = delimited::count_data_rows(request.bytes, dialect)?;

        let ranges = match partition::plan(total_rows, chunk_size) {
            PartitionPlan::NotNeeded { rows } => return Ok(not_split(request, rows)),
            PartitionPlan::Split(ranges) => ranges,
        };
        let total = ranges.partition_count();
        let base = naming::base_name(request.file_name);
        tracing::debug!(
            rows = total_rows,
            chunk_size,
            parts = total,
            "splitting streamed CSV input"
        );

        let writer = PartitionWriter::resolve(&request.config, &self.backends)?;
        let mut archive = ArchiveBuilder::new();
        let mut rows_per_partition: Vec<usize> = Vec::with_capacity(total);

        let chunks = delimited::CsvChunks::new(request.bytes, dialect, chunk_size)?;
        for (index, chunk) in chunks.enumerate() {
            let rows = chunk?;
            let part = index + 1;
            emit_part(
                &writer,
                &mut archive,
                base,
                token,
                part,
                total,
                &header,
                &rows,
                &request.config,
                progress,
            )?;
            rows_per_partition.push(rows.len());
        }

        // The counting pass and the chunk pass must agree.
        debug_assert_eq!(rows_per_partition.len(), total);
        debug_assert_eq!(rows_per_partition.iter().sum::<usize>(), total_rows);

        bundle(archive, base, token, rows_per_partition)
    }

    /// Whole-table path for workbook input and non-streaming CSV. Peak
    /// memory is proportional to the table, the accepted trade-off for
    /// these formats.
    fn split_materialized(
        &mut self,
        request: &SplitRequest<'_>,
        kind: InputKind,
        extension: &str,
        chunk_size: usize,
        token: Option<&str>,
        progress: &mut dyn ProgressSink,
    ) -> Result<SplitOutcome, SplitError> {
        let dataset = self.materialize(kind, extension, request)?;

        let ranges = match partition::plan(dataset.row_count(), chunk_size) {
            PartitionPlan::NotNeeded { rows } => return Ok(not_split(request, rows)),
            PartitionPlan::Split(ranges) => ranges,
        };
        let total = ranges.partition_count();
        let base = naming::base_name(request.file_name);
        tracing::debug!(
            rows = dataset.row_count(),
            chunk_size,
            parts = total,
            "splitting materialized table"
        );

        let writer = PartitionWriter::resolve(&request.config, &self.backends)?;
        let mut archive = ArchiveBuilder::new();
        let mut rows_per_partition: Vec<usize> = Vec::with_capacity(total);

        for (index, range) in ranges.enumerate() {
            let part = index + 1;
            emit_part(
                &writer,
                &mut archive,
                base,
                token,
                part,
                total,
                dataset.header(),
                dataset.slice(range.clone()),
                &request.config,
                progress,
            )?;
            rows_per_partition.push(range.len());
        }

        bundle(archive, base, token, rows_per_partition)
    }

    fn materialize(
        &mut self,
        kind: InputKind,
        extension: &str,
        request: &SplitRequest<'_>,
    ) -> Result<Arc<Dataset>, SplitError> {
        let key = self
            .cache
            .as_ref()
            .map(|_| cache::cache_key(request.bytes, extension, &request.config.input_dialect));

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), key.as_ref()) {
            if let Some(dataset) = cache.get(key) {
                tracing::debug!("parse cache hit");
                return Ok(dataset);
            }
        }

        let dataset = Arc::new(match kind {
            InputKind::Delimited => {
                delimited::read_dataset(request.bytes, &request.config.input_dialect)?
            }
            InputKind::Workbook => workbook::read_workbook(request.bytes)?,
            InputKind::LegacyWorkbook => self.legacy.read(extension, request.bytes)?,
        });

        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key) {
            cache.insert(key, Arc::clone(&dataset));
        }

        Ok(dataset)
    }
}

impl Default for SplitEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Serializes one part, appends it to the archive and reports progress.
#[allow(clippy::too_many_arguments)]
fn emit_part(
    writer: &PartitionWriter<'_>,
    archive: &mut ArchiveBuilder,
    base: &str,
    token: Option<&str>,
    part: usize,
    total: usize,
    header: &[String],
    rows: &[Vec<String>],
    config: &SplitConfig,
    progress: &mut dyn ProgressSink,
) -> Result<(), SplitError> {
    let bytes = writer
        .write(header, rows)
        .map_err(|e| serialization_error(part, e))?;
    let name = naming::partition_file_name(base, part, token, config.output.extension());
    archive.append(&name, &bytes)?;
    progress.on_progress(part, total);
    tracing::debug!(part, total, rows = rows.len(), "part appended");
    Ok(())
}

fn bundle(
    archive: ArchiveBuilder,
    base: &str,
    token: Option<&str>,
    rows_per_partition: Vec<usize>,
) -> Result<SplitOutcome, SplitError> {
    let partitions = archive.entry_count();
    let bytes = archive.finish()?;
    Ok(SplitOutcome::Archive(ArchiveBundle {
        file_name: naming::archive_file_name(base, token),
        bytes,
        partitions,
        rows_per_partition,
        token: token.map(str::to_string),
    }))
}

fn not_split(request: &SplitRequest<'_>, rows: usize) -> SplitOutcome {
    tracing::debug!(rows, "table fits in one chunk, returning original bytes");
    SplitOutcome::NotSplit(NotSplit {
        file_name: request.file_name.to_string(),
        bytes: request.bytes.to_vec(),
        rows,
    })
}

/// Folds a writer failure into the part-indexed serialization error the
/// caller reports.
fn serialization_error(partition: usize, err: SplitError) -> SplitError {
    let message = match err {
        SplitError::Internal(m) | SplitError::Decode(m) | SplitError::Archive(m) => m,
        other => other.to_string(),
    };
    SplitError::Serialization { partition, message }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
