//! Serialises a [`Table`] into a downloadable file.

use std::fmt;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::table::{Cell, Table};

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet encoding failed: {0}")]
    Xlsx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    pub fn parse(format: &str) -> Result<Self, EncodeError> {
        match format.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" => Ok(FileFormat::Xlsx),
            _ => Err(EncodeError::UnsupportedFormat(format.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone)]
pub struct EncodedReport {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Encodes `table` as `format`, naming the file `{table_name}-report.{ext}`.
pub fn encode(table: &Table, table_name: &str, format: &str) -> Result<EncodedReport, EncodeError> {
    let format = FileFormat::parse(format)?;
    let bytes = match format {
        FileFormat::Csv => encode_csv(table)?,
        FileFormat::Xlsx => encode_xlsx(table)?,
    };

    Ok(EncodedReport {
        file_name: format!("{}-report.{}", table_name, format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}

fn encode_csv(table: &Table) -> Result<Vec<u8>, EncodeError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| EncodeError::Csv(e.into_error().into()))
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn encode_xlsx(table: &Table) -> Result<Vec<u8>, EncodeError> {
    let sheet = sheet_xml(table)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", ROOT_RELS_XML.as_bytes()),
        ("xl/workbook.xml", WORKBOOK_XML.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.as_bytes()),
        ("xl/worksheets/sheet1.xml", &sheet),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).map_err(xlsx_err)?;
        zip.write_all(body).map_err(xlsx_err)?;
    }

    let cursor = zip.finish().map_err(xlsx_err)?;
    Ok(cursor.into_inner())
}

fn xlsx_err(e: impl fmt::Display) -> EncodeError {
    EncodeError::Xlsx(e.to_string())
}

fn sheet_xml(table: &Table) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xlsx_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("worksheet").with_attributes([(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )])))
        .map_err(xlsx_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("sheetData")))
        .map_err(xlsx_err)?;

    let header: Vec<Cell> = table.columns.iter().cloned().map(Cell::Text).collect();
    write_row(&mut writer, 1, &header)?;
    for (i, row) in table.rows.iter().enumerate() {
        write_row(&mut writer, i + 2, row)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("sheetData")))
        .map_err(xlsx_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("worksheet")))
        .map_err(xlsx_err)?;

    Ok(writer.into_inner().into_inner())
}

fn write_row(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    row_number: usize,
    cells: &[Cell],
) -> Result<(), EncodeError> {
    let r = row_number.to_string();
    writer
        .write_event(Event::Start(
            BytesStart::new("row").with_attributes([("r", r.as_str())]),
        ))
        .map_err(xlsx_err)?;

    for (col, cell) in cells.iter().enumerate() {
        if cell.is_null() {
            continue;
        }
        let reference = format!("{}{}", column_letters(col), row_number);
        write_cell(writer, &reference, cell)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("row")))
        .map_err(xlsx_err)
}

fn write_cell(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    reference: &str,
    cell: &Cell,
) -> Result<(), EncodeError> {
    let (kind, value) = match cell {
        Cell::Bool(b) => ("b", if *b { "1".to_string() } else { "0".to_string() }),
        other => match other.as_number() {
            Some(n) => ("n", n),
            None => ("inlineStr", other.to_string()),
        },
    };

    writer
        .write_event(Event::Start(
            BytesStart::new("c").with_attributes([("r", reference), ("t", kind)]),
        ))
        .map_err(xlsx_err)?;

    if kind == "inlineStr" {
        let value = xml_text(&value);
        writer
            .write_event(Event::Start(BytesStart::new("is")))
            .map_err(xlsx_err)?;
        let t = if value.trim() != value {
            BytesStart::new("t").with_attributes([("xml:space", "preserve")])
        } else {
            BytesStart::new("t")
        };
        writer.write_event(Event::Start(t)).map_err(xlsx_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&value)))
            .map_err(xlsx_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("t")))
            .map_err(xlsx_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("is")))
            .map_err(xlsx_err)?;
    } else {
        writer
            .write_event(Event::Start(BytesStart::new("v")))
            .map_err(xlsx_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&value)))
            .map_err(xlsx_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("v")))
            .map_err(xlsx_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("c")))
        .map_err(xlsx_err)
}

/// Drops characters XML 1.0 does not allow in text content. Tab, line
/// feed and carriage return are kept.
fn xml_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c >= ' ' || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Zero-based column index to spreadsheet letters (0 → A, 26 → AA).
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
