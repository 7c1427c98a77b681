//! CSV part serialization.
//!
//! Writes header plus rows with the output dialect's delimiter, CRLF
//! terminators, and text encoding. The output dialect is independent of
//! whatever dialect the input was parsed with.

use csv::{Terminator, WriterBuilder};
use encoding_rs::UTF_8;

use crate::config::CsvDialect;
use crate::error::SplitError;

/// Serializes one part into CSV bytes.
pub fn write_partition(
    header: &[String],
    rows: &[Vec<String>],
    dialect: &CsvDialect,
) -> Result<Vec<u8>, SplitError> {
    let encoding = dialect.resolve_encoding()?;

    let mut writer = WriterBuilder::new()
        .delimiter(dialect.delimiter)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(header)
        .map_err(|e| SplitError::Internal(format!("failed to write header: {}", e)))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| SplitError::Internal(format!("failed to write record: {}", e)))?;
    }

    let utf8 = writer
        .into_inner()
        .map_err(|e| SplitError::Internal(format!("failed to flush writer: {}", e)))?;

    if encoding == UTF_8 {
        return Ok(utf8);
    }

    let text = String::from_utf8(utf8)
        .map_err(|e| SplitError::Internal(format!("writer produced invalid UTF-8: {}", e)))?;
    let (encoded, _, had_errors) = encoding.encode(&text);
    if had_errors {
        return Err(SplitError::Internal(format!(
            "data contains characters not representable in {}",
            encoding.name()
        )));
    }
    Ok(encoded.into_owned())
}
