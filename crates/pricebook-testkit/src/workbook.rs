// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use pricebook_app::{CellFill, CellValue, FillPattern, RawCell};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const HEADER: [&str; 5] = ["title", "tag0", "tag1", "price", "time"];

/// Builds minimal but valid `.xlsx` bytes with one worksheet.
#[derive(Debug, Clone, Default)]
pub struct WorkbookBuilder {
    rows: Vec<Vec<RawCell>>,
    inline_strings: bool,
    extra_sheets: Vec<String>,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `title, tag0, tag1, price, time` header row.
    pub fn header(self) -> Self {
        self.row(HEADER.iter().map(|label| text(label)).collect())
    }

    pub fn row(mut self, cells: Vec<RawCell>) -> Self {
        self.rows.push(cells);
        self
    }

    pub fn blank_row(self) -> Self {
        self.row(Vec::new())
    }

    pub fn group(self, title: &str) -> Self {
        self.row(vec![
            text(title),
            empty(),
            empty(),
            empty(),
            empty(),
        ])
    }

    pub fn item(self, title: &str, price: f64, time: &str) -> Self {
        self.row(vec![
            text(title),
            empty(),
            empty(),
            number(price),
            text(time),
        ])
    }

    /// Item whose tag cells carry solid fills.
    pub fn tagged_item(
        self,
        title: &str,
        tag0: (&str, &str),
        tag1: (&str, &str),
        price: f64,
    ) -> Self {
        self.row(vec![
            text(title),
            text(tag0.0).with_fill(CellFill::solid(tag0.1)),
            text(tag1.0).with_fill(CellFill::solid(tag1.1)),
            number(price),
            empty(),
        ])
    }

    /// Store strings inline instead of in `sharedStrings.xml`.
    pub fn inline_strings(mut self, inline: bool) -> Self {
        self.inline_strings = inline;
        self
    }

    /// Adds an empty sheet after the first one.
    pub fn extra_sheet(mut self, name: &str) -> Self {
        self.extra_sheets.push(name.to_owned());
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let styles = StyleTable::collect(&self.rows);
        let mut strings = SharedStrings::default();
        let sheet = self.sheet_xml(&styles, &mut strings);

        let mut parts = vec![
            ("[Content_Types].xml".to_owned(), self.content_types_xml()),
            ("_rels/.rels".to_owned(), ROOT_RELS.to_owned()),
            ("xl/workbook.xml".to_owned(), self.workbook_xml()),
            (
                "xl/_rels/workbook.xml.rels".to_owned(),
                self.workbook_rels_xml(),
            ),
            ("xl/styles.xml".to_owned(), styles.xml()),
            ("xl/worksheets/sheet1.xml".to_owned(), sheet),
        ];
        if !self.inline_strings {
            parts.push(("xl/sharedStrings.xml".to_owned(), strings.xml()));
        }
        for index in 0..self.extra_sheets.len() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", index + 2),
                EMPTY_SHEET.to_owned(),
            ));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, body) in parts {
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("start {name}"))?;
            zip.write_all(body.as_bytes())
                .with_context(|| format!("write {name}"))?;
        }
        Ok(zip.finish().context("finish workbook")?.into_inner())
    }

    fn sheet_xml(&self, styles: &StyleTable, strings: &mut SharedStrings) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);
        for (row_index, cells) in self.rows.iter().enumerate() {
            let row_number = row_index + 1;
            xml.push_str(&format!(r#"<row r="{row_number}">"#));
            for (column, cell) in cells.iter().enumerate() {
                let reference = format!("{}{row_number}", column_letter(column));
                let style = styles.index_of(cell.fill.as_ref());
                let style_attr = if style == 0 {
                    String::new()
                } else {
                    format!(r#" s="{style}""#)
                };
                match &cell.value {
                    CellValue::Empty => {
                        if style != 0 {
                            xml.push_str(&format!(r#"<c r="{reference}"{style_attr}/>"#));
                        }
                    }
                    CellValue::Text(value) if self.inline_strings => xml.push_str(&format!(
                        r#"<c r="{reference}"{style_attr} t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(value)
                    )),
                    CellValue::Text(value) => xml.push_str(&format!(
                        r#"<c r="{reference}"{style_attr} t="s"><v>{}</v></c>"#,
                        strings.index_of(value)
                    )),
                    CellValue::Number(value) => xml.push_str(&format!(
                        r#"<c r="{reference}"{style_attr}><v>{value}</v></c>"#
                    )),
                    CellValue::Bool(value) => xml.push_str(&format!(
                        r#"<c r="{reference}"{style_attr} t="b"><v>{}</v></c>"#,
                        u8::from(*value)
                    )),
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }

    fn sheet_count(&self) -> usize {
        1 + self.extra_sheets.len()
    }

    fn content_types_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
        if !self.inline_strings {
            xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        }
        for sheet in 1..=self.sheet_count() {
            xml.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{sheet}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#);
        let names = std::iter::once("Prices").chain(self.extra_sheets.iter().map(String::as_str));
        for (index, name) in names.enumerate() {
            let id = index + 1;
            xml.push_str(&format!(
                r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
                escape(name)
            ));
        }
        xml.push_str("</sheets></workbook>");
        xml
    }

    fn workbook_rels_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        let sheets = self.sheet_count();
        for sheet in 1..=sheets {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{sheet}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{sheet}.xml"/>"#
            ));
        }
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            sheets + 1
        ));
        if !self.inline_strings {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
                sheets + 2
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }
}

pub fn text(value: &str) -> RawCell {
    RawCell::new(CellValue::text(value))
}

pub fn number(value: f64) -> RawCell {
    RawCell::new(CellValue::Number(value))
}

pub fn empty() -> RawCell {
    RawCell::new(CellValue::Empty)
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const EMPTY_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;

#[derive(Debug, Default)]
struct SharedStrings {
    strings: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl SharedStrings {
    fn index_of(&mut self, value: &str) -> usize {
        if let Some(index) = self.index.get(value) {
            return *index;
        }
        let index = self.strings.len();
        self.strings.push(value.to_owned());
        self.index.insert(value.to_owned(), index);
        index
    }

    fn xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(&format!(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
            self.strings.len()
        ));
        for value in &self.strings {
            xml.push_str(&format!(
                r#"<si><t xml:space="preserve">{}</t></si>"#,
                escape(value)
            ));
        }
        xml.push_str("</sst>");
        xml
    }
}

/// Fills 0 and 1 are the two Excel reserves (`none`, `gray125`); every
/// distinct fill after that gets its own fill and cell format.
#[derive(Debug, Default)]
struct StyleTable {
    fills: Vec<CellFill>,
}

impl StyleTable {
    fn collect(rows: &[Vec<RawCell>]) -> Self {
        let mut table = Self::default();
        for fill in rows.iter().flatten().filter_map(|cell| cell.fill.as_ref()) {
            if !table.fills.contains(fill) {
                table.fills.push(fill.clone());
            }
        }
        table
    }

    fn index_of(&self, fill: Option<&CellFill>) -> usize {
        fill.and_then(|fill| self.fills.iter().position(|known| known == fill))
            .map_or(0, |position| position + 1)
    }

    fn xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
        xml.push_str(r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#);
        xml.push_str(&format!(
            r#"<fills count="{}"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#,
            self.fills.len() + 2
        ));
        for fill in &self.fills {
            let pattern = match &fill.pattern {
                FillPattern::None => "none".to_owned(),
                FillPattern::Solid => "solid".to_owned(),
                FillPattern::Other(other) => other.clone(),
            };
            let color = match &fill.fg_rgb {
                Some(rgb) => format!(r#"<fgColor rgb="{}"/>"#, escape(rgb)),
                None => r#"<fgColor theme="4"/>"#.to_owned(),
            };
            xml.push_str(&format!(
                r#"<fill><patternFill patternType="{pattern}">{color}<bgColor indexed="64"/></patternFill></fill>"#
            ));
        }
        xml.push_str("</fills>");
        xml.push_str(r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#);
        xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);
        xml.push_str(&format!(
            r#"<cellXfs count="{}"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
            self.fills.len() + 1
        ));
        for index in 0..self.fills.len() {
            xml.push_str(&format!(
                r#"<xf numFmtId="0" fontId="0" fillId="{}" borderId="0" xfId="0" applyFill="1"/>"#,
                index + 2
            ));
        }
        xml.push_str("</cellXfs></styleSheet>");
        xml
    }
}

fn column_letter(mut index: usize) -> String {
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

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
