//! Partition serialization.
//!
//! CSV parts are written with a configurable output dialect. Excel parts go
//! through an ordered chain of interchangeable workbook backends: the chain
//! is capability-checked once per request and the first available backend
//! wins, with unavailable preferred backends logged and silently skipped.
//! Falling back is a degraded but successful path, never an error.

pub mod delimited;
pub mod workbook;

use crate::config::{CsvDialect, OutputFormat, SplitConfig};
use crate::error::SplitError;

pub use workbook::{InlineStringsBackend, SharedStringsBackend};

/// One interchangeable Excel serialization strategy.
pub trait WorkbookBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the backend can run in this process.
    fn is_available(&self) -> bool;

    /// Serializes one part (header plus rows) into workbook bytes.
    fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, SplitError>;
}

/// Ordered, preference-ranked workbook backends.
pub struct BackendChain {
    backends: Vec<Box<dyn WorkbookBackend>>,
}

impl BackendChain {
    /// The default preference order: the streaming inline-strings writer
    /// first, then the shared-strings writer.
    pub fn standard() -> Self {
        Self::from_backends(vec![
            Box::new(InlineStringsBackend),
            Box::new(SharedStringsBackend),
        ])
    }

    pub fn from_backends(backends: Vec<Box<dyn WorkbookBackend>>) -> Self {
        Self { backends }
    }

    /// Selects the first available backend.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::Internal` when no backend in the chain is
    /// available; an engine is always constructed with at least the
    /// standard chain, so this indicates host misconfiguration.
    pub fn select(&self) -> Result<&dyn WorkbookBackend, SplitError> {
        for (rank, backend) in self.backends.iter().enumerate() {
            if backend.is_available() {
                if rank > 0 {
                    tracing::warn!(
                        backend = backend.name(),
                        skipped = rank,
                        "preferred workbook backend unavailable, continuing with fallback"
                    );
                }
                return Ok(backend.as_ref());
            }
            tracing::warn!(backend = backend.name(), "workbook backend unavailable");
        }
        Err(SplitError::Internal(
            "no workbook writer backend is available".into(),
        ))
    }
}

/// The serializer resolved for one request: either the CSV dialect writer
/// or the selected workbook backend.
pub enum PartitionWriter<'a> {
    Csv(&'a CsvDialect),
    Workbook(&'a dyn WorkbookBackend),
}

impl<'a> PartitionWriter<'a> {
    /// Resolves the writer for the request's output format, selecting a
    /// workbook backend from the chain when Excel output is requested.
    pub fn resolve(
        config: &'a SplitConfig,
        chain: &'a BackendChain,
    ) -> Result<Self, SplitError> {
        match config.output {
            OutputFormat::Csv => Ok(PartitionWriter::Csv(&config.output_dialect)),
            OutputFormat::Excel => Ok(PartitionWriter::Workbook(chain.select()?)),
        }
    }

    pub fn write(
        &self,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<Vec<u8>, SplitError> {
        match self {
            PartitionWriter::Csv(dialect) => delimited::write_partition(header, rows, dialect),
            PartitionWriter::Workbook(backend) => backend.write(header, rows),
        }
    }
}
