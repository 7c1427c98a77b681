//! Splits large CSV/Excel spreadsheets into row-bounded parts packaged as
//! a single ZIP archive.
//!
//! The pipeline is synchronous and processes one request start-to-finish:
//! raw bytes and a [`SplitConfig`] go in, and either an [`ArchiveBundle`]
//! (one file per part, headers repeated, names following the
//! `<base>_parte_<n>` convention) or a [`SplitOutcome::NotSplit`] signal
//! comes back. Progress is reported per finalized part through a
//! [`ProgressSink`]. The UI shell that collects uploads and renders
//! progress lives outside this crate.
//!
//! ```no_run
//! use sheetsplit::{NoProgress, SplitConfig, SplitEngine, SplitRequest};
//!
//! # fn main() -> Result<(), sheetsplit::SplitError> {
//! let bytes = std::fs::read("clientes.csv").expect("upload");
//! let request = SplitRequest::new(&bytes, "clientes.csv", SplitConfig::default());
//!
//! let mut engine = SplitEngine::new();
//! let outcome = engine.split(&request, &mut NoProgress)?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod naming;
pub mod partition;
pub mod reader;
pub mod writer;

pub use config::{CsvDialect, OutputFormat, SplitConfig, TokenPolicy, DEFAULT_CHUNK_SIZE};
pub use dataset::Dataset;
pub use engine::{
    ArchiveBundle, NoProgress, NotSplit, ProgressSink, SplitEngine, SplitOutcome, SplitRequest,
};
pub use error::{ErrorPresentation, SplitError};
pub use reader::legacy::LegacyWorkbookReader;
pub use writer::{BackendChain, WorkbookBackend};
