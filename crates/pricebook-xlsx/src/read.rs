// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Streaming reader for the first worksheet of an `.xlsx` workbook.
//!
//! Values come from the sheet XML and `sharedStrings.xml`. Fills are
//! resolved through `styles.xml` (`cellXfs[s].fillId -> fills[fillId]`).

use anyhow::{Context, Result};
use pricebook_app::{
    CellFill, CellValue, Column, FillPattern, LineItem, NoTagColors, RawCell, RawRow,
    SolidFillTags, parse_with,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::package::{
    SHARED_STRINGS_PART, STYLES_PART, attr_by_local_name, column_index, first_sheet_part,
    open_archive, read_part,
};

/// How a sheet is turned into line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetOptions {
    /// Leading rows dropped before parsing.
    pub header_rows: usize,
    pub min_columns: usize,
    /// Read tag colors from cell fills.
    pub tag_colors: bool,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            header_rows: 1,
            min_columns: pricebook_app::DEFAULT_MIN_COLUMNS,
            tag_colors: true,
        }
    }
}

/// Reads and parses a workbook in one step.
pub fn parse_workbook(bytes: &[u8], options: &SheetOptions) -> Result<Vec<LineItem>> {
    let rows = read_rows(bytes, options)?;
    let items = if options.tag_colors {
        parse_with(&rows, options.min_columns, &SolidFillTags)
    } else {
        parse_with(&rows, options.min_columns, &NoTagColors)
    };
    debug!(rows = rows.len(), items = items.len(), "parsed workbook");
    Ok(items)
}

/// Rows of the first worksheet with the first `header_rows` rows removed.
///
/// Rows are padded toward the widest row so sparse storage never makes a
/// row short. Padding stops at the columns the parser looks at; cells past
/// that point are kept only in the rows that have them.
pub fn read_rows(bytes: &[u8], options: &SheetOptions) -> Result<Vec<RawRow>> {
    let mut archive = open_archive(bytes)?;
    let sheet_part = first_sheet_part(&mut archive)?;
    let shared_strings = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let styles = match read_part(&mut archive, STYLES_PART)? {
        Some(xml) => parse_styles(&xml)?,
        None => Styles::default(),
    };
    let sheet = read_part(&mut archive, &sheet_part)?.with_context(|| {
        format!("workbook has no worksheet at {sheet_part} -- re-export it and retry")
    })?;

    let mut rows = parse_sheet(&sheet, &shared_strings, &styles)
        .with_context(|| format!("parse {sheet_part}"))?;
    let width = rows.iter().map(RawRow::len).max().unwrap_or(0);
    let padded = pad_rows(&mut rows, width, options.min_columns);
    let kept = rows.split_off(options.header_rows.min(rows.len()));
    debug!(
        sheet = %sheet_part,
        rows = kept.len(),
        width,
        padded,
        shared_strings = shared_strings.len(),
        "read worksheet"
    );
    Ok(kept)
}

pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0_usize;

    loop {
        match reader
            .read_event_into(&mut buf)
            .context("parse xl/sharedStrings.xml")?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" => in_text = phonetic_depth == 0,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(text) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&text.unescape().context("malformed shared string")?);
                }
            }
            Event::CData(text) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Styles {
    fills: Vec<CellFill>,
    xf_fill_ids: Vec<usize>,
}

impl Styles {
    pub(crate) fn fill_for(&self, style_index: usize) -> Option<&CellFill> {
        let fill_id = *self.xf_fill_ids.get(style_index)?;
        self.fills.get(fill_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleSection {
    Other,
    Fills,
    CellXfs,
}

pub(crate) fn parse_styles(xml: &[u8]) -> Result<Styles> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut styles = Styles::default();
    let mut section = StyleSection::Other;
    let mut fill: Option<CellFill> = None;

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .context("parse xl/styles.xml")?;
        let (element, empty) = match &event {
            Event::Start(e) => (Some(e), false),
            Event::Empty(e) => (Some(e), true),
            _ => (None, false),
        };
        if let Some(e) = element {
            match (section, e.local_name().as_ref()) {
                (_, b"fills") => section = StyleSection::Fills,
                (_, b"cellXfs") => section = StyleSection::CellXfs,
                (StyleSection::Fills, b"fill") => {
                    if empty {
                        styles.fills.push(no_fill());
                    } else {
                        fill = Some(no_fill());
                    }
                }
                (StyleSection::Fills, b"patternFill") => {
                    if let Some(fill) = fill.as_mut() {
                        let pattern = attr_by_local_name(e, b"patternType")?.unwrap_or_default();
                        fill.pattern = FillPattern::parse(&pattern);
                    }
                }
                (StyleSection::Fills, b"fgColor") => {
                    if let Some(fill) = fill.as_mut() {
                        fill.fg_rgb = attr_by_local_name(e, b"rgb")?;
                    }
                }
                (StyleSection::CellXfs, b"xf") => {
                    let fill_id = attr_by_local_name(e, b"fillId")?
                        .and_then(|value| value.trim().parse().ok())
                        .unwrap_or(0);
                    styles.xf_fill_ids.push(fill_id);
                }
                _ => {}
            }
        }
        match &event {
            Event::End(e) => match e.local_name().as_ref() {
                b"fill" => styles.fills.extend(fill.take()),
                b"fills" | b"cellXfs" => section = StyleSection::Other,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(styles)
}

fn no_fill() -> CellFill {
    CellFill {
        pattern: FillPattern::None,
        fg_rgb: None,
    }
}

/// The cell being read between `<c>` and `</c>`.
#[derive(Debug, Default)]
struct PendingCell {
    column: usize,
    kind: String,
    style: usize,
    value: String,
    has_value: bool,
}

impl PendingCell {
    fn from_start(element: &BytesStart<'_>, fallback_column: usize) -> Result<Self> {
        let column = attr_by_local_name(element, b"r")?
            .and_then(|reference| column_index(&reference))
            .unwrap_or(fallback_column);
        let kind = attr_by_local_name(element, b"t")?.unwrap_or_default();
        let style = attr_by_local_name(element, b"s")?
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0);
        Ok(Self {
            column,
            kind,
            style,
            ..Self::default()
        })
    }

    fn into_cell(self, shared_strings: &[String], styles: &Styles) -> (usize, RawCell) {
        let value = if !self.has_value {
            CellValue::Empty
        } else {
            match self.kind.as_str() {
                "s" => self
                    .value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| shared_strings.get(index))
                    .map_or(CellValue::Empty, |text| CellValue::text(text.as_str())),
                "inlineStr" | "str" | "e" | "d" => CellValue::Text(self.value),
                "b" => CellValue::Bool(self.value.trim() == "1"),
                _ => match self.value.trim().parse::<f64>() {
                    Ok(number) => CellValue::Number(number),
                    Err(_) => CellValue::Text(self.value),
                },
            }
        };
        let fill = styles.fill_for(self.style).cloned();
        (self.column, RawCell { value, fill })
    }
}

fn parse_sheet(xml: &[u8], shared_strings: &[String], styles: &Styles) -> Result<Vec<RawRow>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut rows = Vec::new();
    let mut row: Option<RawRow> = None;
    let mut next_row_number = 1_u32;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_sheet_data = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sheetData" => in_sheet_data = true,
                b"row" if in_sheet_data => {
                    row = Some(start_row(&e, next_row_number)?);
                }
                b"c" if row.is_some() => {
                    let fallback = row.as_ref().map_or(0, RawRow::len);
                    cell = Some(PendingCell::from_start(&e, fallback)?);
                }
                // `<v>` for plain values, `<is><t>` for inline strings.
                b"v" | b"t" if cell.is_some() => {
                    in_value = true;
                    if let Some(cell) = cell.as_mut() {
                        cell.has_value = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" if in_sheet_data => {
                    let empty = start_row(&e, next_row_number)?;
                    next_row_number = empty.sheet_row.get().saturating_add(1);
                    rows.push(empty);
                }
                b"c" => {
                    if let Some(row) = row.as_mut() {
                        let pending = PendingCell::from_start(&e, row.len())?;
                        place_cell(row, pending.into_cell(shared_strings, styles));
                    }
                }
                _ => {}
            },
            Event::Text(text) if in_value => {
                if let Some(cell) = cell.as_mut() {
                    cell.value
                        .push_str(&text.unescape().context("malformed cell text")?);
                }
            }
            Event::CData(text) if in_value => {
                if let Some(cell) = cell.as_mut() {
                    cell.value.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(row), Some(pending)) = (row.as_mut(), cell.take()) {
                        place_cell(row, pending.into_cell(shared_strings, styles));
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        next_row_number = done.sheet_row.get().saturating_add(1);
                        rows.push(done);
                    }
                }
                b"sheetData" => in_sheet_data = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn start_row(element: &BytesStart<'_>, fallback: u32) -> Result<RawRow> {
    let number = attr_by_local_name(element, b"r")?
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(fallback);
    Ok(RawRow::new(number, Vec::new()))
}

/// Pads every row to `width`, capped at what classification and parsing
/// read. Returns the padded width.
fn pad_rows(rows: &mut [RawRow], width: usize, min_columns: usize) -> usize {
    let padded = width.min(min_columns.max(Column::COUNT));
    for row in rows.iter_mut().filter(|row| row.len() < padded) {
        row.cells.resize_with(padded, RawCell::default);
    }
    padded
}

fn place_cell(row: &mut RawRow, (column, cell): (usize, RawCell)) {
    if row.cells.len() <= column {
        row.cells.resize_with(column + 1, RawCell::default);
    }
    row.cells[column] = cell;
}
