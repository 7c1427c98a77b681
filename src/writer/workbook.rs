//! OOXML workbook writing.
//!
//! Two interchangeable backends produce the same logical workbook:
//!
//! - `InlineStringsBackend` streams every cell as an inline string. Memory
//!   stays proportional to one row while the sheet XML is generated, which
//!   makes it the preferred backend.
//! - `SharedStringsBackend` deduplicates cell text into a shared string
//!   table the way desktop Excel saves files. It holds the table in memory
//!   and is ranked second for that reason.
//!
//! Both emit a minimal single-sheet package: content types, package
//! relationships, workbook part, styles, and the worksheet.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer as XmlWriter;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SplitError;
use crate::writer::WorkbookBackend;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const CONTENT_TYPES_BASE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#;

const CONTENT_TYPES_SHARED: &str = r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_BASE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#;

const WORKBOOK_RELS_SHARED: &str = r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf/></cellStyleXfs><cellXfs count="1"><xf xfId="0"/></cellXfs></styleSheet>"#;

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

/// Streams every cell as an inline string.
pub struct InlineStringsBackend;

impl WorkbookBackend for InlineStringsBackend {
    fn name(&self) -> &'static str {
        "xlsx-inline"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, SplitError> {
        let sheet = inline_sheet_xml(header, rows)?;
        assemble_package(&sheet, None)
    }
}

/// Deduplicates cell text into a shared string table.
pub struct SharedStringsBackend;

impl WorkbookBackend for SharedStringsBackend {
    fn name(&self) -> &'static str {
        "xlsx-shared"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, SplitError> {
        let mut table = SharedStringTable::new();
        let sheet = shared_sheet_xml(header, rows, &mut table)?;
        let strings = table.into_xml()?;
        assemble_package(&sheet, Some(&strings))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Package assembly
// ─────────────────────────────────────────────────────────────────────────────

fn assemble_package(
    sheet_xml: &[u8],
    shared_strings: Option<&[u8]>,
) -> Result<Vec<u8>, SplitError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let content_types = match shared_strings {
        Some(_) => format!("{}{}</Types>", CONTENT_TYPES_BASE, CONTENT_TYPES_SHARED),
        None => format!("{}</Types>", CONTENT_TYPES_BASE),
    };
    let workbook_rels = match shared_strings {
        Some(_) => format!(
            "{}{}</Relationships>",
            WORKBOOK_RELS_BASE, WORKBOOK_RELS_SHARED
        ),
        None => format!("{}</Relationships>", WORKBOOK_RELS_BASE),
    };

    write_entry(&mut zip, "[Content_Types].xml", content_types.as_bytes(), options)?;
    write_entry(&mut zip, "_rels/.rels", ROOT_RELS.as_bytes(), options)?;
    write_entry(&mut zip, "xl/workbook.xml", WORKBOOK.as_bytes(), options)?;
    write_entry(
        &mut zip,
        "xl/_rels/workbook.xml.rels",
        workbook_rels.as_bytes(),
        options,
    )?;
    write_entry(&mut zip, "xl/styles.xml", STYLES.as_bytes(), options)?;
    if let Some(strings) = shared_strings {
        write_entry(&mut zip, "xl/sharedStrings.xml", strings, options)?;
    }
    write_entry(&mut zip, "xl/worksheets/sheet1.xml", sheet_xml, options)?;

    let cursor = zip
        .finish()
        .map_err(|e| SplitError::Internal(format!("workbook package finalization failed: {}", e)))?;
    Ok(cursor.into_inner())
}

fn write_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    bytes: &[u8],
    options: FileOptions,
) -> Result<(), SplitError> {
    zip.start_file(name, options)
        .map_err(|e| SplitError::Internal(format!("failed to start package part {}: {}", name, e)))?;
    zip.write_all(bytes)
        .map_err(|e| SplitError::Internal(format!("failed to write package part {}: {}", name, e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Worksheet XML
// ─────────────────────────────────────────────────────────────────────────────

fn xml_write_error(err: quick_xml::Error) -> SplitError {
    SplitError::Internal(format!("worksheet XML generation failed: {}", err))
}

fn inline_sheet_xml(header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, SplitError> {
    sheet_xml(header, rows, |writer, cell_ref, value| {
        let mut c = BytesStart::new("c");
        c.push_attribute(("r", cell_ref));
        c.push_attribute(("t", "inlineStr"));
        writer.write_event(Event::Start(c))?;
        writer.write_event(Event::Start(BytesStart::new("is")))?;
        write_text_element(writer, value)?;
        writer.write_event(Event::End(BytesEnd::new("is")))?;
        writer.write_event(Event::End(BytesEnd::new("c")))
    })
}

fn shared_sheet_xml(
    header: &[String],
    rows: &[Vec<String>],
    table: &mut SharedStringTable,
) -> Result<Vec<u8>, SplitError> {
    sheet_xml(header, rows, |writer, cell_ref, value| {
        let index = table.intern(value);
        let mut c = BytesStart::new("c");
        c.push_attribute(("r", cell_ref));
        c.push_attribute(("t", "s"));
        writer.write_event(Event::Start(c))?;
        writer.write_event(Event::Start(BytesStart::new("v")))?;
        writer.write_event(Event::Text(BytesText::new(&index.to_string())))?;
        writer.write_event(Event::End(BytesEnd::new("v")))?;
        writer.write_event(Event::End(BytesEnd::new("c")))
    })
}

fn sheet_xml<F>(
    header: &[String],
    rows: &[Vec<String>],
    mut write_cell: F,
) -> Result<Vec<u8>, SplitError>
where
    F: FnMut(&mut XmlWriter<Vec<u8>>, &str, &str) -> Result<(), quick_xml::Error>,
{
    let mut writer = XmlWriter::new(Vec::new());

    (|| -> Result<(), quick_xml::Error> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let mut worksheet = BytesStart::new("worksheet");
        worksheet.push_attribute(("xmlns", NS_MAIN));
        writer.write_event(Event::Start(worksheet))?;
        writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

        write_row(&mut writer, 1, header, &mut write_cell)?;
        for (i, row) in rows.iter().enumerate() {
            write_row(&mut writer, i + 2, row, &mut write_cell)?;
        }

        writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
        writer.write_event(Event::End(BytesEnd::new("worksheet")))
    })()
    .map_err(xml_write_error)?;

    Ok(writer.into_inner())
}

fn write_row<F>(
    writer: &mut XmlWriter<Vec<u8>>,
    row_number: usize,
    cells: &[String],
    write_cell: &mut F,
) -> Result<(), quick_xml::Error>
where
    F: FnMut(&mut XmlWriter<Vec<u8>>, &str, &str) -> Result<(), quick_xml::Error>,
{
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_number.to_string().as_str()));
    writer.write_event(Event::Start(row))?;
    for (col, value) in cells.iter().enumerate() {
        let cell_ref = format!("{}{}", column_reference(col), row_number);
        write_cell(writer, &cell_ref, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))
}

fn write_text_element(
    writer: &mut XmlWriter<Vec<u8>>,
    value: &str,
) -> Result<(), quick_xml::Error> {
    let mut t = BytesStart::new("t");
    if needs_space_preserve(value) {
        t.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))
}

/// Excel drops unprotected leading and trailing whitespace on load.
fn needs_space_preserve(value: &str) -> bool {
    value
        .chars()
        .next()
        .map(char::is_whitespace)
        .unwrap_or(false)
        || value
            .chars()
            .next_back()
            .map(char::is_whitespace)
            .unwrap_or(false)
}

/// Converts a zero-based column index into letters: 0 -> A, 26 -> AA.
fn column_reference(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("column letters are ASCII")
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared string table
// ─────────────────────────────────────────────────────────────────────────────

struct SharedStringTable {
    indexes: HashMap<String, usize>,
    strings: Vec<String>,
    total_refs: usize,
}

impl SharedStringTable {
    fn new() -> Self {
        Self {
            indexes: HashMap::new(),
            strings: Vec::new(),
            total_refs: 0,
        }
    }

    fn intern(&mut self, value: &str) -> usize {
        self.total_refs += 1;
        if let Some(&index) = self.indexes.get(value) {
            return index;
        }
        let index = self.strings.len();
        self.indexes.insert(value.to_string(), index);
        self.strings.push(value.to_string());
        index
    }

    fn into_xml(self) -> Result<Vec<u8>, SplitError> {
        let mut writer = XmlWriter::new(Vec::new());

        (|| -> Result<(), quick_xml::Error> {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
            let mut sst = BytesStart::new("sst");
            sst.push_attribute(("xmlns", NS_MAIN));
            sst.push_attribute(("count", self.total_refs.to_string().as_str()));
            sst.push_attribute(("uniqueCount", self.strings.len().to_string().as_str()));
            writer.write_event(Event::Start(sst))?;
            for value in &self.strings {
                writer.write_event(Event::Start(BytesStart::new("si")))?;
                write_text_element(&mut writer, value)?;
                writer.write_event(Event::End(BytesEnd::new("si")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("sst")))
        })()
        .map_err(xml_write_error)?;

        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::workbook::read_workbook;

    fn header() -> Vec<String> {
        vec!["Id".into(), "Name".into()]
    }

    fn rows() -> Vec<Vec<String>> {
        vec![
            vec!["1".into(), "Alice".into()],
            vec!["2".into(), "Bob & \"Co\" <x>".into()],
            vec!["3".into(), "  padded  ".into()],
        ]
    }

    #[test]
    fn inline_backend_round_trips_through_the_reader() {
        let bytes = InlineStringsBackend.write(&header(), &rows()).expect("write");
        let ds = read_workbook(&bytes).expect("read back");

        assert_eq!(ds.header(), header().as_slice());
        assert_eq!(ds.rows(), rows().as_slice());
    }

    #[test]
    fn shared_backend_round_trips_through_the_reader() {
        let bytes = SharedStringsBackend.write(&header(), &rows()).expect("write");
        let ds = read_workbook(&bytes).expect("read back");

        assert_eq!(ds.header(), header().as_slice());
        assert_eq!(ds.rows(), rows().as_slice());
    }

    #[test]
    fn shared_backend_deduplicates_repeated_values() {
        let repeated = vec![
            vec!["same".to_string()],
            vec!["same".to_string()],
            vec!["same".to_string()],
        ];
        let bytes = SharedStringsBackend
            .write(&["Col".to_string()], &repeated)
            .expect("write");

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("zip");
        let mut entry = zip.by_name("xl/sharedStrings.xml").expect("sst part");
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut entry, &mut xml).expect("read sst");

        assert!(xml.contains(r#"uniqueCount="2""#), "sst: {}", xml);
        assert!(xml.contains(r#"count="4""#), "sst: {}", xml);
    }

    #[test]
    fn both_backends_produce_the_same_logical_table() {
        let inline = InlineStringsBackend.write(&header(), &rows()).expect("inline");
        let shared = SharedStringsBackend.write(&header(), &rows()).expect("shared");

        assert_eq!(
            read_workbook(&inline).expect("inline read"),
            read_workbook(&shared).expect("shared read")
        );
    }

    #[test]
    fn package_contains_the_expected_parts() {
        let bytes = InlineStringsBackend.write(&header(), &rows()).expect("write");
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("zip");

        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/styles.xml",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(zip.by_name(part).is_ok(), "missing package part {}", part);
        }
    }

    #[test]
    fn empty_row_set_still_writes_the_header() {
        let bytes = InlineStringsBackend.write(&header(), &[]).expect("write");
        let ds = read_workbook(&bytes).expect("read back");
        assert_eq!(ds.header(), header().as_slice());
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn column_references_cover_multi_letter_columns() {
        assert_eq!(column_reference(0), "A");
        assert_eq!(column_reference(25), "Z");
        assert_eq!(column_reference(26), "AA");
        assert_eq!(column_reference(54), "BC");
        assert_eq!(column_reference(701), "ZZ");
        assert_eq!(column_reference(702), "AAA");
    }

    #[test]
    fn whitespace_values_survive_the_round_trip() {
        let ws_rows = vec![vec![" leading".to_string()], vec!["trailing ".to_string()]];
        let bytes = InlineStringsBackend
            .write(&["Col".to_string()], &ws_rows)
            .expect("write");
        let ds = read_workbook(&bytes).expect("read back");
        assert_eq!(ds.rows(), ws_rows.as_slice());
    }
}
