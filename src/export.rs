use crate::store::CheckinEvent;
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const EXPORT_COLUMNS: [&str; 5] = ["Name", "Date", "Time", "Morale", "Understanding"];

/// Which slice of the store an export covers: everything, or one year-month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportScope {
    All,
    Month { year: i32, month: u32 },
}

impl ExportScope {
    /// `"all"` or `"YYYY-MM"`.
    pub fn parse(raw: &str) -> Result<Self, ExportError> {
        let t = raw.trim();
        if t == "all" {
            return Ok(ExportScope::All);
        }
        let Some((y, m)) = t.split_once('-') else {
            return Err(ExportError::InvalidRange(format!(
                "scope must be \"all\" or \"YYYY-MM\", got {:?}",
                raw
            )));
        };
        let year = y
            .parse::<i32>()
            .map_err(|_| ExportError::InvalidRange("scope year must be numeric".to_string()))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| ExportError::InvalidRange("scope month must be numeric".to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(ExportError::InvalidRange(
                "scope month must be between 01 and 12".to_string(),
            ));
        }
        Ok(ExportScope::Month { year, month })
    }

    fn matches(&self, date_key: &str) -> bool {
        match self {
            ExportScope::All => true,
            ExportScope::Month { year, month } => {
                date_key.starts_with(&format!("{:04}-{:02}", year, month))
            }
        }
    }

    /// Filename fragment, e.g. `all_data` or `2025_03`.
    pub fn file_tag(&self) -> String {
        match self {
            ExportScope::All => "all_data".to_string(),
            ExportScope::Month { year, month } => format!("{:04}_{:02}", year, month),
        }
    }
}

#[derive(Debug)]
pub enum ExportError {
    InvalidRange(String),
    Empty,
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::InvalidRange(_) => "invalid_range",
            ExportError::Empty => "empty_export",
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::InvalidRange(m) => write!(f, "{}", m),
            ExportError::Empty => write!(f, "no data to export for this period"),
        }
    }
}

/// One exported row per check-in event; column order is fixed and the time
/// column uses the 12-hour clock (`HH:MM:SS AM/PM`) downstream consumers
/// expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub name: String,
    pub date: String,
    pub time: String,
    pub morale: i64,
    pub understanding: i64,
}

/// Pure projection: filter by scope, split the stamp into date and 12-hour
/// time. Touches no file system; serializers below turn the rows into bytes.
pub fn build_export(
    events: &[CheckinEvent],
    scope: &ExportScope,
) -> Result<Vec<ExportRecord>, ExportError> {
    let records: Vec<ExportRecord> = events
        .iter()
        .filter(|e| scope.matches(e.date_key()))
        .map(|e| {
            // A stamp that fails to parse (corrupted store) is carried through
            // verbatim rather than dropped; the row itself is never lost.
            let time = match e.submitted_at_dt() {
                Some(dt) => dt.format("%I:%M:%S %p").to_string(),
                None => e.submitted_at.clone(),
            };
            ExportRecord {
                name: e.name.clone(),
                date: e.date_key().to_string(),
                time,
                morale: e.morale,
                understanding: e.understanding,
            }
        })
        .collect();
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(records)
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn to_csv(records: &[ExportRecord]) -> String {
    let mut csv = String::new();
    csv.push_str(&EXPORT_COLUMNS.join(","));
    csv.push('\n');
    for r in records {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_quote(&r.name),
            csv_quote(&r.date),
            csv_quote(&r.time),
            r.morale,
            r.understanding
        ));
    }
    csv
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const XLSX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const XLSX_WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Checkins" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const XLSX_WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn xlsx_sheet(records: &[ExportRecord]) -> String {
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    let text_cell = |s: &str| format!("<c t=\"inlineStr\"><is><t>{}</t></is></c>", xml_escape(s));
    sheet.push_str("<row>");
    for col in EXPORT_COLUMNS {
        sheet.push_str(&text_cell(col));
    }
    sheet.push_str("</row>");
    for r in records {
        sheet.push_str("<row>");
        sheet.push_str(&text_cell(&r.name));
        sheet.push_str(&text_cell(&r.date));
        sheet.push_str(&text_cell(&r.time));
        sheet.push_str(&format!("<c><v>{}</v></c>", r.morale));
        sheet.push_str(&format!("<c><v>{}</v></c>", r.understanding));
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");
    sheet
}

/// Minimal single-sheet SpreadsheetML container; strings are inline so no
/// shared-strings part is needed.
pub fn to_xlsx(records: &[ExportRecord]) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: [(&str, String); 5] = [
        ("[Content_Types].xml", XLSX_CONTENT_TYPES.to_string()),
        ("_rels/.rels", XLSX_ROOT_RELS.to_string()),
        ("xl/workbook.xml", XLSX_WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", XLSX_WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", xlsx_sheet(records)),
    ];
    for (path, body) in entries {
        zip.start_file(path, opts)
            .with_context(|| format!("failed to start xlsx entry {}", path))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write xlsx entry {}", path))?;
    }
    let cursor = zip.finish().context("failed to finalize xlsx container")?;
    Ok(cursor.into_inner())
}

pub const ODS_MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

const ODS_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2"><manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/><manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/></manifest:manifest>"#;

fn ods_content(records: &[ExportRecord]) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2"><office:body><office:spreadsheet><table:table table:name="Checkins">"#,
    );
    let text_cell = |s: &str| {
        format!(
            "<table:table-cell office:value-type=\"string\"><text:p>{}</text:p></table:table-cell>",
            xml_escape(s)
        )
    };
    let number_cell = |v: i64| {
        format!(
            "<table:table-cell office:value-type=\"float\" office:value=\"{}\"><text:p>{}</text:p></table:table-cell>",
            v, v
        )
    };
    content.push_str("<table:table-row>");
    for col in EXPORT_COLUMNS {
        content.push_str(&text_cell(col));
    }
    content.push_str("</table:table-row>");
    for r in records {
        content.push_str("<table:table-row>");
        content.push_str(&text_cell(&r.name));
        content.push_str(&text_cell(&r.date));
        content.push_str(&text_cell(&r.time));
        content.push_str(&number_cell(r.morale));
        content.push_str(&number_cell(r.understanding));
        content.push_str("</table:table-row>");
    }
    content.push_str("</table:table></office:spreadsheet></office:body></office:document-content>");
    content
}

/// Minimal OpenDocument spreadsheet. The `mimetype` entry must come first and
/// be stored uncompressed for consumers that sniff the container.
pub fn to_ods(records: &[ExportRecord]) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored)
        .context("failed to start ods mimetype entry")?;
    zip.write_all(ODS_MIMETYPE.as_bytes())
        .context("failed to write ods mimetype entry")?;

    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("META-INF/manifest.xml", deflated)
        .context("failed to start ods manifest entry")?;
    zip.write_all(ODS_MANIFEST.as_bytes())
        .context("failed to write ods manifest entry")?;
    zip.start_file("content.xml", deflated)
        .context("failed to start ods content entry")?;
    zip.write_all(ods_content(records).as_bytes())
        .context("failed to write ods content entry")?;

    let cursor = zip.finish().context("failed to finalize ods container")?;
    Ok(cursor.into_inner())
}
