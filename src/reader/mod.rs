//! Input decoding, dispatched by declared file extension.
//!
//! CSV input can be materialized or read as a bounded-memory chunk stream;
//! OOXML workbooks are always materialized. Legacy binary workbook formats
//! are an optional capability supplied by the host.

pub mod delimited;
pub mod legacy;
pub mod workbook;

use crate::error::SplitError;

/// The reader family responsible for a given input extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Delimiter-separated text (`.csv`).
    Delimited,
    /// OOXML workbook (`.xlsx`, `.xlsm`).
    Workbook,
    /// Binary workbook (`.xls`, `.xlsb`), readable only through a registered
    /// legacy backend.
    LegacyWorkbook,
}

/// Maps a lowercased extension (with leading dot) to its reader family.
///
/// # Errors
///
/// Returns `SplitError::UnsupportedFormat` for anything else.
pub fn classify(extension: &str) -> Result<InputKind, SplitError> {
    match extension {
        ".csv" => Ok(InputKind::Delimited),
        ".xlsx" | ".xlsm" => Ok(InputKind::Workbook),
        ".xls" | ".xlsb" => Ok(InputKind::LegacyWorkbook),
        other => Err(SplitError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
