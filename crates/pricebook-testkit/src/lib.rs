// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod workbook;

use anyhow::{Context, Result};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::macros::datetime;

pub use workbook::{HEADER, WorkbookBuilder, empty, number, text};

const GROUPS: [&str; 8] = [
    "Biochemistry",
    "Hematology",
    "Hormones",
    "Immunology",
    "Infections",
    "Urinalysis",
    "Vitamins",
    "Allergy",
];

const ANALYTES: [&str; 24] = [
    "Glucose",
    "ALT",
    "AST",
    "Creatinine",
    "Urea",
    "Bilirubin",
    "Cholesterol",
    "Triglycerides",
    "CBC",
    "ESR",
    "Ferritin",
    "TSH",
    "Free T4",
    "Cortisol",
    "Prolactin",
    "Vitamin D",
    "Vitamin B12",
    "HbA1c",
    "CRP",
    "IgE",
    "Hepatitis B antigen",
    "HIV antibodies",
    "Urine culture",
    "Coagulogram",
];

const QUALIFIERS: [&str; 6] = [
    "",
    "total",
    "free",
    "extended panel",
    "with differential",
    "quantitative",
];

const TURNAROUND: [&str; 5] = ["1 day", "1-2 days", "3 days", "5-7 days", "same day"];

const TAGS: [(&str, &str); 4] = [
    ("cito", "FFFF0000"),
    ("fasting", "FF00B050"),
    ("partner lab", "FF0070C0"),
    ("home visit", "FFFFC000"),
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeItem {
    pub title: String,
    pub price_cents: i64,
    pub tag: Option<(String, String)>,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeSection {
    pub group: String,
    pub items: Vec<FakeItem>,
}

#[derive(Debug, Clone)]
pub struct PriceListFaker {
    rng: DeterministicRng,
}

impl PriceListFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// Prices are whole som between 100 and 9,990 in steps of 10.
    pub fn item(&mut self) -> FakeItem {
        let analyte = self.pick(&ANALYTES);
        let qualifier = self.pick(&QUALIFIERS);
        let title = if qualifier.is_empty() {
            analyte.to_owned()
        } else {
            format!("{analyte}, {qualifier}")
        };
        let price_cents = (10 + self.rng.int_n(990) as i64) * 1_000;
        let tag = if self.rng.int_n(4) == 0 {
            let (label, rgb) = TAGS[self.rng.int_n(TAGS.len())];
            Some((label.to_owned(), rgb.to_owned()))
        } else {
            None
        };
        FakeItem {
            title,
            price_cents,
            tag,
            time: self.pick(&TURNAROUND).to_owned(),
        }
    }

    /// `sections` distinct groups with one to `max_items` items each.
    pub fn price_list(&mut self, sections: usize, max_items: usize) -> Vec<FakeSection> {
        let first = self.rng.int_n(GROUPS.len());
        (0..sections.min(GROUPS.len()))
            .map(|offset| {
                let group = GROUPS[(first + offset) % GROUPS.len()].to_owned();
                let count = 1 + self.rng.int_n(max_items.max(1));
                let items = (0..count).map(|_| self.item()).collect();
                FakeSection { group, items }
            })
            .collect()
    }

    /// Lays sections out as a sheet, with a header row and an occasional
    /// blank spacer row between sections.
    pub fn workbook(&mut self, sections: &[FakeSection]) -> WorkbookBuilder {
        let mut builder = WorkbookBuilder::new().header();
        for section in sections {
            if self.rng.bool() {
                builder = builder.blank_row();
            }
            builder = builder.group(&section.group);
            for item in &section.items {
                let price = item.price_cents as f64 / 100.0;
                builder = match &item.tag {
                    Some((label, rgb)) => builder.row(vec![
                        text(&item.title),
                        text(label).with_fill(pricebook_app::CellFill::solid(rgb.as_str())),
                        empty(),
                        number(price),
                        text(&item.time),
                    ]),
                    None => builder.item(&item.title, price, &item.time),
                };
            }
        }
        builder
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn temp_data_dir() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let data_dir = dir.path().join("uploaded_files");
    Ok((dir, data_dir))
}

pub fn fixture_printed_at() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

#[cfg(test)]
mod tests {
    use super::{PriceListFaker, WorkbookBuilder};

    #[test]
    fn new_deterministic_seed() {
        let mut left = PriceListFaker::new(42);
        let mut right = PriceListFaker::new(42);
        assert_eq!(left.price_list(3, 4), right.price_list(3, 4));
    }

    #[test]
    fn price_list_sections_are_distinct_and_non_empty() {
        let mut faker = PriceListFaker::new(7);
        let sections = faker.price_list(5, 6);
        assert_eq!(sections.len(), 5);
        let mut groups = sections
            .iter()
            .map(|section| section.group.clone())
            .collect::<Vec<_>>();
        groups.sort();
        groups.dedup();
        assert_eq!(groups.len(), 5);
        for section in &sections {
            assert!((1..=6).contains(&section.items.len()));
            for item in &section.items {
                assert!((10_000..=999_000).contains(&item.price_cents));
                assert_eq!(item.price_cents % 1_000, 0);
            }
        }
    }

    #[test]
    fn builder_produces_a_zip_archive() -> anyhow::Result<()> {
        let bytes = WorkbookBuilder::new().header().item("CBC", 500.0, "1 day").build()?;
        assert_eq!(&bytes[..2], b"PK");
        Ok(())
    }
}
