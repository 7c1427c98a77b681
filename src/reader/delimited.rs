//! Record-aware CSV reading with configurable delimiter and text encoding.
//!
//! Uses the `csv` crate so that embedded delimiters and newlines inside
//! quoted fields never corrupt records. Input is decoded to UTF-8 up front
//! (stripping a UTF-8 BOM when present) and can then be read two ways:
//! fully materialized into a `Dataset`, or pulled as successive row chunks
//! whose peak memory is bounded by the chunk size rather than the table.

use std::io::Cursor;

use csv::{ReaderBuilder, StringRecordsIntoIter};
use encoding_rs::UTF_8;

use crate::config::CsvDialect;
use crate::dataset::Dataset;
use crate::error::SplitError;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decodes raw input bytes into UTF-8 text using the dialect's encoding.
///
/// # Errors
///
/// Returns `SplitError::Decode` naming the byte offset (UTF-8) or the
/// encoding (other charsets) when the input is malformed.
pub fn decode_input(bytes: &[u8], dialect: &CsvDialect) -> Result<String, SplitError> {
    let encoding = dialect.resolve_encoding()?;

    let bytes = if encoding == UTF_8 && bytes.starts_with(UTF8_BOM) {
        &bytes[UTF8_BOM.len()..]
    } else {
        bytes
    };

    if encoding == UTF_8 {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_owned()),
            Err(e) => Err(SplitError::Decode(format!(
                "input is not valid UTF-8 (first invalid byte at offset {})",
                e.valid_up_to()
            ))),
        }
    } else {
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
            .ok_or_else(|| {
                SplitError::Decode(format!(
                    "input contains byte sequences that are not valid {}",
                    encoding.name()
                ))
            })
    }
}

/// Reads the whole table into memory.
pub fn read_dataset(bytes: &[u8], dialect: &CsvDialect) -> Result<Dataset, SplitError> {
    let text = decode_input(bytes, dialect)?;
    let mut reader = reader_from(text, dialect.delimiter);

    let header = read_header(&mut reader)?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| parse_error(&e))?;
        rows.push(record.iter().map(String::from).collect());
    }

    // A lone header with no data rows is a valid, empty table.
    Ok(Dataset::new(header, rows))
}

/// Counts data rows without materializing them, reusing one record buffer.
///
/// Returns the header and the total data row count. Used by the streaming
/// path to establish part totals before any part is emitted.
pub fn count_data_rows(
    bytes: &[u8],
    dialect: &CsvDialect,
) -> Result<(Vec<String>, usize), SplitError> {
    let text = decode_input(bytes, dialect)?;
    let mut reader = reader_from(text, dialect.delimiter);

    let header = read_header(&mut reader)?;

    let mut record = csv::ByteRecord::new();
    let mut count: usize = 0;
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => count += 1,
            Ok(false) => break,
            Err(e) => return Err(parse_error(&e)),
        }
    }

    Ok((header, count))
}

/// Pull-based sequence of row chunks of at most `chunk_size` rows each.
///
/// Finite and non-restartable. Only the current chunk is held in memory.
pub struct CsvChunks {
    records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
    header: Vec<String>,
    chunk_size: usize,
    finished: bool,
}

impl CsvChunks {
    pub fn new(
        bytes: &[u8],
        dialect: &CsvDialect,
        chunk_size: usize,
    ) -> Result<Self, SplitError> {
        let text = decode_input(bytes, dialect)?;
        let mut reader = reader_from(text, dialect.delimiter);
        let header = read_header(&mut reader)?;

        Ok(Self {
            records: reader.into_records(),
            header,
            chunk_size,
            finished: false,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Vec<Vec<String>>, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut rows: Vec<Vec<String>> = Vec::new();
        while rows.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => rows.push(record.iter().map(String::from).collect()),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(parse_error(&e)));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if rows.is_empty() {
            None
        } else {
            Some(Ok(rows))
        }
    }
}

fn reader_from(text: String, delimiter: u8) -> csv::Reader<Cursor<Vec<u8>>> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(Cursor::new(text.into_bytes()))
}

fn read_header(reader: &mut csv::Reader<Cursor<Vec<u8>>>) -> Result<Vec<String>, SplitError> {
    let header = reader.headers().map_err(|e| parse_error(&e))?;
    Ok(header.iter().map(String::from).collect())
}

fn parse_error(err: &csv::Error) -> SplitError {
    match err.position() {
        Some(pos) => SplitError::Decode(format!(
            "malformed CSV record at line {} (byte {}): {}",
            pos.line(),
            pos.byte(),
            err
        )),
        None => SplitError::Decode(format!("malformed CSV: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_dialect() -> CsvDialect {
        CsvDialect::default()
    }

    #[test]
    fn reads_basic_table() {
        let input = b"Id,Name\n1,Alice\n2,Bob\n";
        let ds = read_dataset(input, &utf8_dialect()).expect("read");

        assert_eq!(ds.header(), &["Id".to_string(), "Name".to_string()]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.rows()[1], vec!["2".to_string(), "Bob".to_string()]);
    }

    #[test]
    fn strips_utf8_bom_from_header() {
        let mut input = Vec::new();
        input.extend_from_slice(UTF8_BOM);
        input.extend_from_slice(b"Id,Name\n1,Alice\n");

        let ds = read_dataset(&input, &utf8_dialect()).expect("read");
        assert_eq!(ds.header()[0], "Id", "BOM must not leak into the header");
    }

    #[test]
    fn empty_input_yields_empty_dataset() {
        let ds = read_dataset(b"", &utf8_dialect()).expect("read");
        assert!(ds.header().is_empty());
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn header_only_input_yields_zero_rows() {
        let ds = read_dataset(b"Id,Name\n", &utf8_dialect()).expect("read");
        assert_eq!(ds.header().len(), 2);
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn quoted_fields_preserve_embedded_delimiter_and_newline() {
        let input = b"Name,Bio\n\"John\",\"Works at Acme, Inc.\nLoves coding\"\n";
        let ds = read_dataset(input, &utf8_dialect()).expect("read");

        assert_eq!(ds.row_count(), 1);
        assert!(ds.rows()[0][1].contains("Acme, Inc."));
        assert!(ds.rows()[0][1].contains('\n'));
    }

    #[test]
    fn semicolon_latin1_dialect_decodes_accents() {
        // "preço" and "pão" in latin-1 (0xE7 = c-cedilla, 0xE3 = a-tilde).
        let input = b"nome;pre\xE7o\np\xE3o;3,50\nleite;4,20\n";
        let dialect = CsvDialect::default().delimiter(b';').encoding("latin-1");

        let ds = read_dataset(input, &dialect).expect("read");
        assert_eq!(ds.header(), &["nome".to_string(), "pre\u{e7}o".to_string()]);
        assert_eq!(ds.rows()[0][0], "p\u{e3}o");
        assert_eq!(ds.rows()[0][1], "3,50");
    }

    #[test]
    fn invalid_utf8_names_byte_offset() {
        let input = b"Id,Name\n1,\xFF\xFE\n";
        match read_dataset(input, &utf8_dialect()) {
            Err(SplitError::Decode(msg)) => {
                assert!(msg.contains("UTF-8"), "message: {}", msg);
                assert!(msg.contains("offset 10"), "message: {}", msg);
            }
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn ragged_row_names_line() {
        let input = b"Id,Name\n1,Alice\n2,Bob,Extra\n";
        match read_dataset(input, &utf8_dialect()) {
            Err(SplitError::Decode(msg)) => assert!(msg.contains("line 3"), "message: {}", msg),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn count_matches_materialized_row_count() {
        let input = b"Id\n1\n2\n3\n4\n5\n";
        let (header, count) = count_data_rows(input, &utf8_dialect()).expect("count");
        assert_eq!(header, vec!["Id".to_string()]);
        assert_eq!(count, 5);

        let ds = read_dataset(input, &utf8_dialect()).expect("read");
        assert_eq!(ds.row_count(), count);
    }

    #[test]
    fn chunks_cover_all_rows_in_order() {
        let input = b"Id\n1\n2\n3\n4\n5\n6\n7\n";
        let chunks = CsvChunks::new(input, &utf8_dialect(), 5).expect("chunks");
        assert_eq!(chunks.header(), &["Id".to_string()]);

        let collected: Vec<Vec<Vec<String>>> = chunks.map(|c| c.expect("chunk")).collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].len(), 5);
        assert_eq!(collected[1].len(), 2);

        let flattened: Vec<String> = collected
            .iter()
            .flatten()
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(flattened, vec!["1", "2", "3", "4", "5", "6", "7"]);
    }

    #[test]
    fn chunk_stream_over_header_only_input_is_empty() {
        let chunks = CsvChunks::new(b"Id,Name\n", &utf8_dialect(), 100).expect("chunks");
        assert_eq!(chunks.count(), 0);
    }

    #[test]
    fn chunk_stream_is_not_restartable() {
        let mut chunks = CsvChunks::new(b"Id\n1\n2\n", &utf8_dialect(), 10).expect("chunks");
        assert!(chunks.next().is_some());
        assert!(chunks.next().is_none());
        assert!(chunks.next().is_none());
    }

    #[test]
    fn chunk_stream_surfaces_parse_error_and_stops() {
        let input = b"Id,Name\n1,Alice\n2\n";
        let mut chunks = CsvChunks::new(input, &utf8_dialect(), 1).expect("chunks");

        assert!(chunks.next().expect("first chunk").is_ok());
        match chunks.next() {
            Some(Err(SplitError::Decode(_))) => {}
            other => panic!("Expected Decode error, got {:?}", other.map(|r| r.is_ok())),
        }
        assert!(chunks.next().is_none(), "stream must stop after an error");
    }
}
