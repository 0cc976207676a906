// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Writes edited prices back into a workbook.
//!
//! Edits are keyed by item title. The first worksheet is re-emitted event by
//! event; only price cells of matching rows change. Every other zip entry is
//! raw-copied so styles, other sheets and media survive byte for byte.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use anyhow::{Context, Result, bail};
use pricebook_app::{Column, cents_to_float};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::package::{
    SHARED_STRINGS_PART, attr_by_local_name, column_index, first_sheet_part, open_archive,
    read_part,
};
use crate::read::parse_shared_strings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub bytes: Vec<u8>,
    pub patched_cells: usize,
}

/// Rewrites the price cell of every row whose title is a key of `edits`.
///
/// A row is only touched when its price cell already holds a value, so
/// group headers sharing a title with an item stay headers. The first
/// `header_rows` rows are never touched, matching what the reader drops.
pub fn patch_prices(
    bytes: &[u8],
    edits: &BTreeMap<String, i64>,
    header_rows: usize,
) -> Result<PatchOutcome> {
    let mut archive = open_archive(bytes)?;
    let sheet_part = first_sheet_part(&mut archive)?;
    let shared_strings = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let Some(sheet) = read_part(&mut archive, &sheet_part)? else {
        bail!("workbook has no worksheet at {sheet_part} -- re-export it and retry");
    };

    let (sheet, patched_cells) = patch_sheet_xml(&sheet, edits, &shared_strings, header_rows)
        .with_context(|| format!("patch {sheet_part}"))?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len())));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .with_context(|| format!("read zip entry {index}"))?;
        if file.name() == sheet_part {
            let name = file.name().to_owned();
            drop(file);
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("write {name}"))?;
            zip.write_all(&sheet)
                .with_context(|| format!("write {name}"))?;
        } else {
            let name = file.name().to_owned();
            zip.raw_copy_file(file)
                .with_context(|| format!("copy {name}"))?;
        }
    }
    let bytes = zip.finish().context("finish patched workbook")?.into_inner();
    debug!(sheet = %sheet_part, patched_cells, edits = edits.len(), "patched prices");
    Ok(PatchOutcome {
        bytes,
        patched_cells,
    })
}

/// One `<c>` element inside a buffered row.
#[derive(Debug)]
struct CellSpan {
    start: usize,
    end: usize,
    column: usize,
    start_tag: BytesStart<'static>,
    kind: String,
    value: String,
    has_value: bool,
}

impl CellSpan {
    fn text(&self, shared_strings: &[String]) -> String {
        if !self.has_value {
            return String::new();
        }
        match self.kind.as_str() {
            "s" => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .cloned()
                .unwrap_or_default(),
            _ => self.value.clone(),
        }
    }
}

fn patch_sheet_xml(
    original: &[u8],
    edits: &BTreeMap<String, i64>,
    shared_strings: &[String],
    header_rows: usize,
) -> Result<(Vec<u8>, usize)> {
    let mut reader = Reader::from_reader(original);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(original.len() + 64));
    let mut buf = Vec::new();
    let mut patched = 0;
    let mut seen_rows = 0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let start = e.into_owned();
                let events = buffer_row(&mut reader, start)?;
                if seen_rows < header_rows {
                    for event in events {
                        writer.write_event(event)?;
                    }
                } else {
                    patched += write_row(&mut writer, events, edits, shared_strings)?;
                }
                seen_rows += 1;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                seen_rows += 1;
                writer.write_event(Event::Empty(e.into_owned()))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
    Ok((writer.into_inner(), patched))
}

/// Collects every event from `<row>` through `</row>`.
fn buffer_row(
    reader: &mut Reader<&[u8]>,
    start: BytesStart<'static>,
) -> Result<Vec<Event<'static>>> {
    let mut events = vec![Event::Start(start)];
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        if matches!(event, Event::Eof) {
            bail!("unexpected end of worksheet inside a row");
        }
        let row_end = matches!(&event, Event::End(e) if e.local_name().as_ref() == b"row");
        events.push(event);
        if row_end {
            return Ok(events);
        }
        buf.clear();
    }
}

fn write_row(
    writer: &mut Writer<Vec<u8>>,
    events: Vec<Event<'static>>,
    edits: &BTreeMap<String, i64>,
    shared_strings: &[String],
) -> Result<usize> {
    let cells = cell_spans(&events)?;
    let title = cells
        .iter()
        .find(|cell| cell.column == Column::Title.index())
        .map(|cell| cell.text(shared_strings));
    let price = cells
        .iter()
        .find(|cell| cell.column == Column::Price.index())
        .filter(|cell| !cell.text(shared_strings).trim().is_empty());

    let replacement = match (title, price) {
        (Some(title), Some(price)) => edits
            .get(title.trim())
            .map(|cents| (price, price_cell_events(&price.start_tag, *cents))),
        _ => None,
    };

    let Some((price, new_events)) = replacement else {
        for event in events {
            writer.write_event(event)?;
        }
        return Ok(0);
    };
    let (range_start, range_end) = (price.start, price.end);
    for (index, event) in events.into_iter().enumerate() {
        if index == range_start {
            for new_event in &new_events {
                writer.write_event(new_event.clone())?;
            }
        }
        if (range_start..=range_end).contains(&index) {
            continue;
        }
        writer.write_event(event)?;
    }
    Ok(1)
}

fn cell_spans(events: &[Event<'static>]) -> Result<Vec<CellSpan>> {
    let mut spans = Vec::new();
    let mut open: Option<CellSpan> = None;
    let mut in_value = false;
    let mut next_column = 0;

    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                open = Some(span_from(e, index, next_column)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let span = span_from(e, index, next_column)?;
                next_column = span.column + 1;
                spans.push(span);
            }
            Event::Start(e) if matches!(e.local_name().as_ref(), b"v" | b"t") => {
                in_value = true;
                if let Some(span) = open.as_mut() {
                    span.has_value = true;
                }
            }
            Event::Text(text) if in_value => {
                if let Some(span) = open.as_mut() {
                    span.value.push_str(&text.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(mut span) = open.take() {
                        span.end = index;
                        next_column = span.column + 1;
                        spans.push(span);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    Ok(spans)
}

fn span_from(
    element: &BytesStart<'static>,
    index: usize,
    fallback_column: usize,
) -> Result<CellSpan> {
    let column = attr_by_local_name(element, b"r")?
        .and_then(|reference| column_index(&reference))
        .unwrap_or(fallback_column);
    Ok(CellSpan {
        start: index,
        end: index,
        column,
        start_tag: element.clone(),
        kind: attr_by_local_name(element, b"t")?.unwrap_or_default(),
        value: String::new(),
        has_value: false,
    })
}

/// `<c r=".." s=".."><v>price</v></c>` with every other attribute dropped.
fn price_cell_events(original: &BytesStart<'static>, cents: i64) -> Vec<Event<'static>> {
    let mut cell = BytesStart::new("c");
    for attr in original.attributes().flatten() {
        if matches!(attr.key.local_name().as_ref(), b"r" | b"s") {
            cell.push_attribute(attr);
        }
    }
    vec![
        Event::Start(cell.into_owned()),
        Event::Start(BytesStart::new("v")),
        Event::Text(BytesText::new(&format_price(cents)).into_owned()),
        Event::End(BytesEnd::new("v")),
        Event::End(BytesEnd::new("c")),
    ]
}

fn format_price(cents: i64) -> String {
    if cents % 100 == 0 {
        (cents / 100).to_string()
    } else {
        cents_to_float(cents).to_string()
    }
}
