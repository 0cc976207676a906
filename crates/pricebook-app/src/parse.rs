// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Turns worksheet rows into priced line items.
//!
//! A price list is a flat sheet encoding two levels: a row with a title and
//! no price opens a section, and every following row with both a title and
//! a price is an item of that section. Data-quality problems degrade per row
//! and never abort the parse.

use crate::ids::SourceRowIndex;
use crate::model::{Column, LineItem, RawRow};
use crate::style::{SolidFillTags, TagStyle};

pub const DEFAULT_MIN_COLUMNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    GroupHeader,
    LineItem,
    Skip,
}

pub fn classify(row: &RawRow, min_columns: usize) -> RowClass {
    if row.len() < min_columns {
        return RowClass::Skip;
    }
    let title_blank = row.value(Column::Title).is_none_or(|value| value.is_blank());
    let price_blank = row.value(Column::Price).is_none_or(|value| value.is_blank());
    match (title_blank, price_blank) {
        (true, _) => RowClass::Skip,
        (false, true) => RowClass::GroupHeader,
        (false, false) => RowClass::LineItem,
    }
}

/// Parses rows with the standard solid-fill tag convention.
pub fn parse(rows: &[RawRow], min_columns: usize) -> Vec<LineItem> {
    parse_with(rows, min_columns, &SolidFillTags)
}

pub fn parse_with<S: TagStyle + ?Sized>(
    rows: &[RawRow],
    min_columns: usize,
    tags: &S,
) -> Vec<LineItem> {
    rows.iter()
        .fold(ParseFold::default(), |fold, row| {
            fold.step(row, min_columns, tags)
        })
        .items
}

/// State carried left to right across the rows.
#[derive(Debug, Default)]
struct ParseFold {
    current_group: Option<String>,
    items: Vec<LineItem>,
}

impl ParseFold {
    fn step<S: TagStyle + ?Sized>(mut self, row: &RawRow, min_columns: usize, tags: &S) -> Self {
        match classify(row, min_columns) {
            RowClass::Skip => self,
            RowClass::GroupHeader => {
                self.current_group = Some(text_of(row, Column::Title));
                self
            }
            RowClass::LineItem => {
                let item = LineItem {
                    source_row_index: SourceRowIndex::new(self.items.len()),
                    sheet_row: row.sheet_row,
                    group: self.current_group.clone(),
                    title: text_of(row, Column::Title),
                    price_cents: row
                        .value(Column::Price)
                        .map_or(0, |value| value.price_cents()),
                    tag0_text: text_of(row, Column::Tag0),
                    tag0_color: tags.tag_color(fill_of(row, Column::Tag0)),
                    tag1_text: text_of(row, Column::Tag1),
                    tag1_color: tags.tag_color(fill_of(row, Column::Tag1)),
                    time: text_of(row, Column::Time),
                };
                self.items.push(item);
                self
            }
        }
    }
}

fn text_of(row: &RawRow, column: Column) -> String {
    row.value(column)
        .map(|value| value.display_text())
        .unwrap_or_default()
}

fn fill_of(row: &RawRow, column: Column) -> Option<&crate::model::CellFill> {
    row.cell(column).and_then(|cell| cell.fill.as_ref())
}
