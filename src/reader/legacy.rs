//! Optional readers for legacy binary workbook formats (`.xls`, `.xlsb`).
//!
//! No legacy backend ships with this crate. Hosts that need the binary
//! formats register an implementation of `LegacyWorkbookReader`; without
//! one, requests for these extensions fail with a message naming the
//! extension and the remediation.

use crate::dataset::Dataset;
use crate::error::SplitError;

/// A reader for workbook formats outside the OOXML family.
///
/// This seam decouples the pipeline from any particular binary-format
/// parser. Tests provide fake implementations; hosts can wire in a real
/// one when the capability is wanted.
pub trait LegacyWorkbookReader: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Extensions this reader handles, lowercased with leading dot.
    fn extensions(&self) -> &[&'static str];

    /// Reads the first worksheet into a `Dataset`.
    fn read(&self, bytes: &[u8]) -> Result<Dataset, SplitError>;
}

/// Registered legacy readers, looked up by extension.
#[derive(Default)]
pub struct LegacyReaderRegistry {
    readers: Vec<Box<dyn LegacyWorkbookReader>>,
}

impl LegacyReaderRegistry {
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    pub fn register(&mut self, reader: Box<dyn LegacyWorkbookReader>) {
        self.readers.push(reader);
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.readers
            .iter()
            .any(|r| r.extensions().contains(&extension))
    }

    /// Reads with the first registered backend handling `extension`.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::MissingCapability` when no backend is registered
    /// for the extension.
    pub fn read(&self, extension: &str, bytes: &[u8]) -> Result<Dataset, SplitError> {
        match self
            .readers
            .iter()
            .find(|r| r.extensions().contains(&extension))
        {
            Some(reader) => {
                tracing::debug!(backend = reader.name(), extension, "reading legacy workbook");
                reader.read(bytes)
            }
            None => Err(SplitError::MissingCapability {
                extension: extension.to_string(),
                remediation:
                    "Register a legacy workbook reader, or re-save the file as .xlsx.".into(),
            }),
        }
    }
}
