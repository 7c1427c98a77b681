//! OOXML workbook reading (`.xlsx` / `.xlsm`).
//!
//! Walks the package the way it is laid out on disk: the ZIP container, the
//! workbook part for the sheet list, the relationships part for the sheet
//! target, the shared string table, then the worksheet XML itself. Only the
//! first sheet is read. Cell values are decoded to their display text; the
//! whole table is materialized, which is the accepted memory trade-off for
//! workbook input.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use zip::ZipArchive;

use crate::dataset::Dataset;
use crate::error::SplitError;

/// Reads the first worksheet of an OOXML workbook into a `Dataset`.
///
/// The first row becomes the header; shorter data rows are padded to the
/// header width so downstream writers always see rectangular data.
pub fn read_workbook(bytes: &[u8]) -> Result<Dataset, SplitError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SplitError::Decode(format!("not a valid workbook container: {}", e)))?;

    let workbook_xml = read_zip_entry(&mut zip, "xl/workbook.xml")?
        .ok_or_else(|| SplitError::Decode("workbook is missing xl/workbook.xml".into()))?;
    let sheet_rid = first_sheet_relationship(&workbook_xml)?;

    let rels_xml = read_zip_entry(&mut zip, "xl/_rels/workbook.xml.rels")?.ok_or_else(|| {
        SplitError::Decode("workbook is missing its relationships part".into())
    })?;
    let relationships = parse_relationships(&rels_xml)?;
    let target = relationships.get(&sheet_rid).ok_or_else(|| {
        SplitError::Decode(format!(
            "workbook relationship {} has no target",
            sheet_rid
        ))
    })?;
    let sheet_path = resolve_part_path(target);

    let shared = match read_zip_entry(&mut zip, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = read_zip_entry(&mut zip, &sheet_path)?.ok_or_else(|| {
        SplitError::Decode(format!("worksheet part {} not found", sheet_path))
    })?;
    let mut rows = parse_sheet_rows(&sheet_xml, &shared)?;

    let header = if rows.is_empty() {
        Vec::new()
    } else {
        rows.remove(0)
    };

    let width = header.len();
    for row in &mut rows {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }

    Ok(Dataset::new(header, rows))
}

// ─────────────────────────────────────────────────────────────────────────────
// Package parts
// ─────────────────────────────────────────────────────────────────────────────

fn read_zip_entry<R: Read + std::io::Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, SplitError> {
    match zip.by_name(name) {
        Ok(mut entry) => {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| SplitError::Decode(format!("failed to read {}: {}", name, e)))?;
            Ok(Some(bytes))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(SplitError::Decode(format!(
            "failed to open {}: {}",
            name, e
        ))),
    }
}

/// Worksheet targets in the relationships part are relative to `xl/`, unless
/// written as an absolute package path.
fn resolve_part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn xml_error(err: quick_xml::Error) -> SplitError {
    SplitError::Decode(format!("workbook XML is malformed: {}", err))
}

/// Returns the relationship id of the first `<sheet>` in the workbook part.
fn first_sheet_relationship(xml: &[u8]) -> Result<String, SplitError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref().ends_with(b":id") {
                        let value = attr
                            .decode_and_unescape_value(&reader)
                            .map_err(xml_error)?;
                        return Ok(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Err(SplitError::Decode("workbook has no worksheets".into()))
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, SplitError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref().ends_with(b"Relationship") =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => {
                            id = Some(
                                attr.decode_and_unescape_value(&reader)
                                    .map_err(xml_error)?
                                    .into_owned(),
                            )
                        }
                        b"Target" => {
                            target = Some(
                                attr.decode_and_unescape_value(&reader)
                                    .map_err(xml_error)?
                                    .into_owned(),
                            )
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    out.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared strings
// ─────────────────────────────────────────────────────────────────────────────

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, SplitError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();

    let mut strings: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    // Depth inside phonetic annotation subtrees, whose text is not part of
    // the cell value.
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else {
                    match e.name().as_ref() {
                        b"si" => {
                            in_si = true;
                            current.clear();
                        }
                        b"t" if in_si => in_t = true,
                        b"rPh" | b"phoneticPr" if in_si => skip_depth = 1,
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    match e.name().as_ref() {
                        b"si" => {
                            strings.push(std::mem::take(&mut current));
                            in_si = false;
                        }
                        b"t" => in_t = false,
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) if in_t && skip_depth == 0 => {
                current.push_str(&t.unescape().map_err(xml_error)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Worksheet
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    General,
    Shared,
    Inline,
    Boolean,
}

fn parse_sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>, SplitError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut in_sheet_data = false;
    let mut in_row = false;

    let mut cell_col: usize = 0;
    let mut cell_kind = CellKind::General;
    let mut cell_value = String::new();
    let mut capture = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref() == b"sheetData" =>
            {
                in_sheet_data = true;
            }
            Ok(Event::Start(e)) if in_sheet_data && e.name().as_ref() == b"row" => {
                pad_row_gap(&mut rows, row_number(&e, &reader)?);
                current.clear();
                in_row = true;
            }
            Ok(Event::Empty(e)) if in_sheet_data && e.name().as_ref() == b"row" => {
                pad_row_gap(&mut rows, row_number(&e, &reader)?);
                rows.push(Vec::new());
            }
            Ok(Event::Start(e)) if in_row && e.name().as_ref() == b"c" => {
                let (col, kind) = cell_meta(&e, &reader, current.len())?;
                cell_col = col;
                cell_kind = kind;
                cell_value.clear();
            }
            // Self-closing cells carry no value and close without an End event.
            Ok(Event::Empty(e)) if in_row && e.name().as_ref() == b"c" => {
                let (col, _) = cell_meta(&e, &reader, current.len())?;
                place(&mut current, col, String::new());
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"sheetData" => in_sheet_data = false,
                b"row" if in_row => {
                    rows.push(std::mem::take(&mut current));
                    in_row = false;
                }
                b"c" if in_row => {
                    let value = resolve_cell(cell_kind, &mut cell_value, shared)?;
                    place(&mut current, cell_col, value);
                }
                b"v" | b"t" => capture = false,
                _ => {}
            },
            Ok(Event::Start(e))
                if in_row && matches!(e.name().as_ref(), b"v" | b"t") =>
            {
                capture = true;
            }
            Ok(Event::Text(t)) if capture => {
                cell_value.push_str(&t.unescape().map_err(xml_error)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Rows may be sparse in the grid; missing row elements are blank rows.
fn pad_row_gap(rows: &mut Vec<Vec<String>>, row_number: Option<usize>) {
    if let Some(number) = row_number {
        while rows.len() + 1 < number {
            rows.push(Vec::new());
        }
    }
}

fn row_number<B: std::io::BufRead>(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &XmlReader<B>,
) -> Result<Option<usize>, SplitError> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"r" {
            let value = attr.decode_and_unescape_value(reader).map_err(xml_error)?;
            let number = value.parse::<usize>().map_err(|_| {
                SplitError::Decode(format!("invalid row number: {}", value))
            })?;
            return Ok(Some(number));
        }
    }
    Ok(None)
}

/// Extracts the zero-based column index and value kind from a `<c>` element.
/// Cells without a reference attribute are laid out sequentially.
fn cell_meta<B: std::io::BufRead>(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &XmlReader<B>,
    next_col: usize,
) -> Result<(usize, CellKind), SplitError> {
    let mut col = next_col;
    let mut kind = CellKind::General;

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                let value = attr.decode_and_unescape_value(reader).map_err(xml_error)?;
                col = column_from_reference(&value)?;
            }
            b"t" => {
                let value = attr.decode_and_unescape_value(reader).map_err(xml_error)?;
                kind = match value.as_ref() {
                    "s" => CellKind::Shared,
                    "inlineStr" => CellKind::Inline,
                    "b" => CellKind::Boolean,
                    _ => CellKind::General,
                };
            }
            _ => {}
        }
    }

    Ok((col, kind))
}

/// Parses the column letters of a cell reference like `BC12` into a
/// zero-based index.
fn column_from_reference(reference: &str) -> Result<usize, SplitError> {
    let mut col: usize = 0;
    let mut seen_letter = false;
    for c in reference.chars() {
        if c.is_ascii_alphabetic() {
            seen_letter = true;
            col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
        } else {
            break;
        }
    }
    if seen_letter {
        Ok(col - 1)
    } else {
        Err(SplitError::Decode(format!(
            "invalid cell reference: {}",
            reference
        )))
    }
}

fn resolve_cell(
    kind: CellKind,
    raw: &mut String,
    shared: &[String],
) -> Result<String, SplitError> {
    match kind {
        CellKind::Shared => {
            if raw.trim().is_empty() {
                return Ok(String::new());
            }
            let index: usize = raw.trim().parse().map_err(|_| {
                SplitError::Decode(format!("invalid shared string index: {}", raw))
            })?;
            shared.get(index).cloned().ok_or_else(|| {
                SplitError::Decode(format!("shared string index {} out of range", index))
            })
        }
        CellKind::Boolean => Ok(if raw.trim() == "1" {
            "TRUE".into()
        } else {
            "FALSE".into()
        }),
        CellKind::General | CellKind::Inline => Ok(std::mem::take(raw)),
    }
}

fn place(row: &mut Vec<String>, col: usize, value: String) {
    if row.len() < col {
        row.resize(col, String::new());
    }
    if row.len() == col {
        row.push(value);
    } else {
        row[col] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use zip::write::FileOptions;
    use zip::ZipWriter;

    const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

    /// Builds a minimal workbook package around the given sheet XML.
    fn build_workbook(sheet_xml: &str, shared_strings: Option<&str>) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = FileOptions::default();

        let mut entries = vec![
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", sheet_xml),
        ];
        if let Some(shared) = shared_strings {
            entries.push(("xl/sharedStrings.xml", shared));
        }

        for (name, content) in entries {
            writer.start_file(name, options).expect("start entry");
            writer.write_all(content.as_bytes()).expect("write entry");
        }

        writer.finish().expect("finish").into_inner()
    }

    fn sheet(rows: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            rows
        )
    }

    #[test]
    fn reads_inline_string_cells() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Id</t></is></c><c r="B1" t="inlineStr"><is><t>Name</t></is></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2" t="inlineStr"><is><t>Alice</t></is></c></row>"#,
        );
        let ds = read_workbook(&build_workbook(&xml, None)).expect("read");

        assert_eq!(ds.header(), &["Id".to_string(), "Name".to_string()]);
        assert_eq!(ds.row_count(), 1);
        assert_eq!(ds.rows()[0], vec!["1".to_string(), "Alice".to_string()]);
    }

    #[test]
    fn reads_shared_string_cells() {
        let shared = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3"><si><t>Id</t></si><si><t>Name</t></si><si><t>Bob</t></si></sst>"#;
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2"><v>2</v></c><c r="B2" t="s"><v>2</v></c></row>"#,
        );
        let ds = read_workbook(&build_workbook(&xml, Some(shared))).expect("read");

        assert_eq!(ds.header(), &["Id".to_string(), "Name".to_string()]);
        assert_eq!(ds.rows()[0][1], "Bob");
    }

    #[test]
    fn pads_missing_trailing_cells_to_header_width() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>A</t></is></c><c r="B1" t="inlineStr"><is><t>B</t></is></c><c r="C1" t="inlineStr"><is><t>C</t></is></c></row>
<row r="2"><c r="A2"><v>1</v></c></row>"#,
        );
        let ds = read_workbook(&build_workbook(&xml, None)).expect("read");

        assert_eq!(ds.rows()[0].len(), 3);
        assert_eq!(ds.rows()[0], vec!["1".to_string(), String::new(), String::new()]);
    }

    #[test]
    fn gap_cells_become_empty_strings() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>A</t></is></c><c r="B1" t="inlineStr"><is><t>B</t></is></c><c r="C1" t="inlineStr"><is><t>C</t></is></c></row>
<row r="2"><c r="C2"><v>9</v></c></row>"#,
        );
        let ds = read_workbook(&build_workbook(&xml, None)).expect("read");

        assert_eq!(
            ds.rows()[0],
            vec![String::new(), String::new(), "9".to_string()]
        );
    }

    #[test]
    fn boolean_cells_read_as_display_text() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Flag</t></is></c></row>
<row r="2"><c r="A2" t="b"><v>1</v></c></row>
<row r="3"><c r="A3" t="b"><v>0</v></c></row>"#,
        );
        let ds = read_workbook(&build_workbook(&xml, None)).expect("read");

        assert_eq!(ds.rows()[0][0], "TRUE");
        assert_eq!(ds.rows()[1][0], "FALSE");
    }

    #[test]
    fn empty_sheet_yields_empty_dataset() {
        let ds = read_workbook(&build_workbook(&sheet(""), None)).expect("read");
        assert!(ds.header().is_empty());
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn header_only_sheet_yields_zero_rows() {
        let xml = sheet(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Id</t></is></c></row>"#);
        let ds = read_workbook(&build_workbook(&xml, None)).expect("read");
        assert_eq!(ds.header(), &["Id".to_string()]);
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn non_zip_bytes_are_a_decode_error() {
        match read_workbook(b"definitely not a zip") {
            Err(SplitError::Decode(msg)) => assert!(msg.contains("container")),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn missing_workbook_part_is_a_decode_error() {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("unrelated.txt", FileOptions::default())
            .unwrap();
        writer.write_all(b"hi").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        match read_workbook(&bytes) {
            Err(SplitError::Decode(msg)) => assert!(msg.contains("workbook.xml")),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn column_references_parse() {
        assert_eq!(column_from_reference("A1").unwrap(), 0);
        assert_eq!(column_from_reference("Z10").unwrap(), 25);
        assert_eq!(column_from_reference("AA3").unwrap(), 26);
        assert_eq!(column_from_reference("BC12").unwrap(), 54);
        assert!(column_from_reference("12").is_err());
    }

    #[test]
    fn escaped_text_is_unescaped() {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>a &amp; b &lt;c&gt;</t></is></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>x</t></is></c></row>"#,
        );
        let ds = read_workbook(&build_workbook(&xml, None)).expect("read");
        assert_eq!(ds.header()[0], "a & b <c>");
    }
}
