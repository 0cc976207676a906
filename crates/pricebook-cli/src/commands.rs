// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use pricebook_app::{LineItem, Locale, SourceRowIndex, group_items};
use pricebook_tui::{ReceiptSettings, receipt_text};
use pricebook_xlsx::{Library, WorkbookSource};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct WorkbookDump<'a> {
    workbook: &'a str,
    item_count: usize,
    sections: Vec<SectionDump<'a>>,
}

#[derive(Debug, Serialize)]
struct SectionDump<'a> {
    group: Option<&'a str>,
    label: &'a str,
    items: Vec<&'a LineItem>,
}

/// Reads a workbook from a path or URL and stores it in the library.
pub fn import(library: &mut Library, arg: &str, timeout: Duration) -> Result<String> {
    let source = WorkbookSource::parse(arg)?;
    debug!(%source, "importing workbook");
    let bytes = source.read(timeout)?;
    library
        .import(&source.file_name(), &bytes)
        .with_context(|| format!("import {source}"))
}

/// Pretty JSON of one workbook's items in display order.
pub fn dump_json(library: &mut Library, name: &str, locale: Locale) -> Result<String> {
    let workbook = library.load(name)?;
    let sections = group_items(&workbook.items, locale);
    let dump = WorkbookDump {
        workbook: &workbook.name,
        item_count: workbook.items.len(),
        sections: sections
            .iter()
            .map(|section| SectionDump {
                group: section.group.as_deref(),
                label: &section.label,
                items: section.items.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&dump).context("serialize workbook")
}

/// Renders a receipt for the items at `select`, or for every item when
/// `select` is empty.
pub fn receipt(
    library: &mut Library,
    name: &str,
    select: &[usize],
    title: Option<&str>,
    settings: &ReceiptSettings,
    printed_at: OffsetDateTime,
) -> Result<String> {
    let workbook = library.load(name)?;
    let items = if select.is_empty() {
        workbook.items.clone()
    } else {
        let mut items = Vec::with_capacity(select.len());
        for &index in select {
            match workbook.item(SourceRowIndex::new(index)) {
                Some(item) => items.push(item.clone()),
                None => bail!(
                    "{name} has no item {index}; valid indexes are 0..{}",
                    workbook.items.len()
                ),
            }
        }
        items
    };
    info!(workbook = %name, items = items.len(), "rendering receipt");
    Ok(receipt_text(
        &items,
        settings,
        title.unwrap_or_default(),
        printed_at,
    ))
}

/// One line per stored workbook. Returns the report and the number of
/// workbooks that failed to load.
pub fn check(library: &mut Library) -> Result<(String, usize)> {
    let report = library.load_all()?;
    let mut out = String::new();
    for workbook in &report.workbooks {
        let groups = group_items(&workbook.items, Locale::default())
            .iter()
            .filter(|section| section.group.is_some())
            .count();
        let _ = writeln!(
            out,
            "ok      {}: {} item(s) in {} group(s)",
            workbook.name,
            workbook.items.len(),
            groups
        );
    }
    for failure in &report.failures {
        let _ = writeln!(out, "failed  {}: {:#}", failure.name, failure.error);
    }
    if report.workbooks.is_empty() && report.failures.is_empty() {
        let _ = writeln!(
            out,
            "no workbooks in {} -- add one with --import",
            library.dir().display()
        );
    }
    Ok((out, report.failures.len()))
}
