// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::money::parse_decimal_cents;

/// Inline price edit for one line item, keyed by its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceEditInput {
    pub title: String,
    pub raw_price: String,
}

impl PriceEditInput {
    pub fn new(title: impl Into<String>, raw_price: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            raw_price: raw_price.into(),
        }
    }

    /// Returns the new price in cents.
    pub fn validate(&self) -> Result<i64> {
        if self.title.trim().is_empty() {
            bail!("item title is required -- only titled rows can be repriced");
        }
        let raw = self.raw_price.trim();
        if raw.is_empty() {
            bail!("price is required -- enter a number like 250 or 249.50 and retry");
        }
        let Some(cents) = parse_decimal_cents(raw) else {
            bail!("price {raw:?} is not a number -- enter a number like 250 or 249.50 and retry");
        };
        if cents < 0 {
            bail!("price cannot be negative");
        }
        Ok(cents)
    }
}

/// Pending price edits for one workbook, keyed by item title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceEdits {
    edits: BTreeMap<String, i64>,
}

impl PriceEdits {
    /// Validates and records an edit. A later edit of the same title wins.
    pub fn apply(&mut self, input: &PriceEditInput) -> Result<i64> {
        let cents = input.validate()?;
        self.edits.insert(input.title.trim().to_owned(), cents);
        Ok(cents)
    }

    pub fn get(&self, title: &str) -> Option<i64> {
        self.edits.get(title).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn as_map(&self) -> &BTreeMap<String, i64> {
        &self.edits
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{PriceEditInput, PriceEdits};

    #[test]
    fn validation_accepts_decimal_comma() -> anyhow::Result<()> {
        assert_eq!(PriceEditInput::new("CBC", "512,5").validate()?, 51_250);
        assert_eq!(PriceEditInput::new("CBC", " 0 ").validate()?, 0);
        Ok(())
    }

    #[test]
    fn validation_rejects_empty_title() {
        assert!(PriceEditInput::new("  ", "100").validate().is_err());
    }

    #[test]
    fn validation_rejects_garbage_and_negative_prices() {
        let error = PriceEditInput::new("CBC", "cheap")
            .validate()
            .expect_err("non-numeric price should fail");
        assert!(error.to_string().contains("not a number"));
        assert!(PriceEditInput::new("CBC", "").validate().is_err());
        assert!(PriceEditInput::new("CBC", "-5").validate().is_err());
    }

    #[test]
    fn later_edit_of_same_title_wins() -> anyhow::Result<()> {
        let mut edits = PriceEdits::default();
        edits.apply(&PriceEditInput::new("CBC", "500"))?;
        edits.apply(&PriceEditInput::new(" CBC ", "550"))?;
        assert!(edits.apply(&PriceEditInput::new("TSH", "x")).is_err());
        assert_eq!(edits.len(), 1);
        assert_eq!(edits.get("CBC"), Some(55_000));
        Ok(())
    }
}
