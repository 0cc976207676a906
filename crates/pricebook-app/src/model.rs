// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::{SheetRow, SourceRowIndex};
use crate::money::{float_to_cents, parse_decimal_cents};

/// Fixed column positions of a price-list sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Title,
    Tag0,
    Tag1,
    Price,
    Time,
}

impl Column {
    /// Columns a price-list row is read from.
    pub const COUNT: usize = 5;

    pub const fn index(self) -> usize {
        match self {
            Self::Title => 0,
            Self::Tag0 => 1,
            Self::Tag1 => 2,
            Self::Price => 3,
            Self::Time => 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Null, or a string that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    pub fn display_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) => value.trim().to_owned(),
            Self::Number(value) => format_number(*value),
            Self::Bool(true) => "TRUE".to_owned(),
            Self::Bool(false) => "FALSE".to_owned(),
        }
    }

    /// Price coercion: anything that is not a finite number becomes 0.
    pub fn price_cents(&self) -> i64 {
        let parsed = match self {
            Self::Number(value) => float_to_cents(*value),
            Self::Text(value) => parse_decimal_cents(value),
            Self::Empty | Self::Bool(_) => None,
        };
        parsed.unwrap_or(0)
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPattern {
    None,
    Solid,
    Other(String),
}

impl FillPattern {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "none" => Self::None,
            "solid" => Self::Solid,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Cell fill as stored in the workbook styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFill {
    pub pattern: FillPattern,
    /// ARGB hex as written by the producer, for example `FFA1B2C3`.
    pub fg_rgb: Option<String>,
}

impl CellFill {
    pub fn solid(rgb: impl Into<String>) -> Self {
        Self {
            pattern: FillPattern::Solid,
            fg_rgb: Some(rgb.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    pub value: CellValue,
    pub fill: Option<CellFill>,
}

impl RawCell {
    pub fn new(value: CellValue) -> Self {
        Self { value, fill: None }
    }

    pub fn with_fill(mut self, fill: CellFill) -> Self {
        self.fill = Some(fill);
        self
    }
}

/// One worksheet row as handed over by a spreadsheet source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub sheet_row: SheetRow,
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn new(sheet_row: u32, cells: Vec<RawCell>) -> Self {
        Self {
            sheet_row: SheetRow::new(sheet_row),
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, column: Column) -> Option<&RawCell> {
        self.cells.get(column.index())
    }

    pub fn value(&self, column: Column) -> Option<&CellValue> {
        self.cell(column).map(|cell| &cell.value)
    }
}

/// Normalized `#rrggbb` color taken from a tag cell's fill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagColor(String);

impl TagColor {
    /// Accepts six hex digits with or without a leading `#`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(format!("#{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&self.0[range], 16).unwrap_or_default()
        };
        (channel(1..3), channel(3..5), channel(5..7))
    }
}

impl std::fmt::Display for TagColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub source_row_index: SourceRowIndex,
    pub sheet_row: SheetRow,
    pub group: Option<String>,
    pub title: String,
    pub price_cents: i64,
    pub tag0_text: String,
    pub tag0_color: Option<TagColor>,
    pub tag1_text: String,
    pub tag1_color: Option<TagColor>,
    pub time: String,
}

impl LineItem {
    pub fn tag_texts(&self) -> impl Iterator<Item = &str> {
        [self.tag0_text.as_str(), self.tag1_text.as_str()]
            .into_iter()
            .filter(|text| !text.trim().is_empty())
    }

    /// Title followed by the non-empty tag texts in parentheses.
    pub fn full_title(&self) -> String {
        let tags = self.tag_texts().collect::<Vec<_>>();
        if tags.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, tags.join(", "))
        }
    }

    pub fn group_label(&self) -> Option<&str> {
        self.group.as_deref().filter(|group| !group.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{CellValue, LineItem, TagColor};
    use crate::{SheetRow, SourceRowIndex};

    fn item(title: &str, tag0: &str, tag1: &str) -> LineItem {
        LineItem {
            source_row_index: SourceRowIndex::new(0),
            sheet_row: SheetRow::new(2),
            group: None,
            title: title.to_owned(),
            price_cents: 0,
            tag0_text: tag0.to_owned(),
            tag0_color: None,
            tag1_text: tag1.to_owned(),
            tag1_color: None,
            time: String::new(),
        }
    }

    #[test]
    fn blank_detection_matches_null_and_whitespace() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::text("   ").is_blank());
        assert!(!CellValue::text("x").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn price_coercion_falls_back_to_zero() {
        assert_eq!(CellValue::Number(250.0).price_cents(), 25_000);
        assert_eq!(CellValue::text("99.9").price_cents(), 9_990);
        assert_eq!(CellValue::text("по запросу").price_cents(), 0);
        assert_eq!(CellValue::Bool(true).price_cents(), 0);
        assert_eq!(CellValue::Number(f64::NAN).price_cents(), 0);
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(42.0).display_text(), "42");
        assert_eq!(CellValue::Number(1.5).display_text(), "1.5");
        assert_eq!(CellValue::text("  CBC ").display_text(), "CBC");
    }

    #[test]
    fn full_title_joins_non_empty_tags() {
        assert_eq!(item("CBC", "", "").full_title(), "CBC");
        assert_eq!(item("CBC", "urgent", "").full_title(), "CBC (urgent)");
        assert_eq!(
            item("CBC", "urgent", "fasting").full_title(),
            "CBC (urgent, fasting)"
        );
        assert_eq!(item("CBC", " ", "fasting").full_title(), "CBC (fasting)");
    }

    #[test]
    fn tag_color_normalizes_and_splits_channels() {
        let color = TagColor::from_hex("A1B2C3").expect("valid hex");
        assert_eq!(color.as_str(), "#a1b2c3");
        assert_eq!(color.rgb(), (0xa1, 0xb2, 0xc3));
        assert!(TagColor::from_hex("#12345").is_none());
        assert!(TagColor::from_hex("zzzzzz").is_none());
    }
}
