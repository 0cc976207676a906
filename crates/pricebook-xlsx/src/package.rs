// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::io::{Cursor, Read};

use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub(crate) const STYLES_PART: &str = "xl/styles.xml";
const FALLBACK_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive(bytes: &[u8]) -> Result<Archive<'_>> {
    ZipArchive::new(Cursor::new(bytes))
        .context("workbook is not a valid .xlsx archive -- re-export it from your spreadsheet app")
}

/// Reads a whole part, or `None` when the archive does not contain it.
pub(crate) fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(error).with_context(|| format!("open workbook part {name}")),
    };
    let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
    file.read_to_end(&mut bytes)
        .with_context(|| format!("read workbook part {name}"))?;
    Ok(Some(bytes))
}

/// Zip path of the first worksheet in workbook order.
pub(crate) fn first_sheet_part(archive: &mut Archive<'_>) -> Result<String> {
    let Some(workbook) = read_part(archive, WORKBOOK_PART)? else {
        return Ok(FALLBACK_SHEET_PART.to_owned());
    };
    let Some(rel_id) = first_sheet_rel_id(&workbook)? else {
        return Err(anyhow!("workbook has no sheets -- add a sheet and retry"));
    };
    let Some(rels) = read_part(archive, WORKBOOK_RELS_PART)? else {
        return Ok(FALLBACK_SHEET_PART.to_owned());
    };
    let target = relationship_target(&rels, &rel_id)?
        .ok_or_else(|| anyhow!("workbook relationship {rel_id} is missing"))?;
    Ok(resolve_target(&target))
}

fn first_sheet_rel_id(workbook: &[u8]) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(workbook);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .context("parse xl/workbook.xml")?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                return attr_by_local_name(&e, b"id");
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn relationship_target(rels: &[u8], rel_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(rels);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .context("parse xl/_rels/workbook.xml.rels")?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr_by_local_name(&e, b"Id")?.as_deref() == Some(rel_id) {
                    return attr_by_local_name(&e, b"Target");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// Targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_owned(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

/// Attribute value matched on its local name, ignoring any namespace prefix.
pub(crate) fn attr_by_local_name(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.context("malformed XML attribute")?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .context("malformed XML attribute value")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Columns a worksheet can hold (`A` through `XFD`).
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// `D12` -> zero-based column 3. Row digits are ignored. References past
/// `XFD` yield `None`.
pub(crate) fn column_index(cell_ref: &str) -> Option<usize> {
    let letters = cell_ref
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .collect::<Vec<_>>();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0_usize;
    for letter in letters {
        index = index
            .checked_mul(26)?
            .checked_add(usize::from(letter.to_ascii_uppercase() - b'A') + 1)?;
        if index > MAX_COLUMNS {
            return None;
        }
    }
    Some(index - 1)
}

#[cfg(test)]
mod tests {
    use super::{column_index, resolve_target};

    #[test]
    fn column_letters_map_to_zero_based_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("D12"), Some(3));
        assert_eq!(column_index("z3"), Some(25));
        assert_eq!(column_index("AA1"), Some(26));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn references_past_the_last_column_are_rejected() {
        assert_eq!(column_index("XFD7"), Some(16_383));
        assert_eq!(column_index("XFE7"), None);
        assert_eq!(column_index("ZZZZZZZZZ2"), None);
        assert_eq!(column_index(&"Z".repeat(40)), None);
    }

    #[test]
    fn relationship_targets_resolve_under_xl() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(
            resolve_target("/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
    }
}
