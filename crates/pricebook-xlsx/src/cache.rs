// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::Result;
use pricebook_app::LineItem;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::read::{SheetOptions, parse_workbook};

type CacheKey = (String, SheetOptions);

/// Parsed items memoized by workbook content and parse options. Each
/// workbook name pins one entry; an entry no name pins is dropped.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: HashMap<CacheKey, Vec<LineItem>>,
    owners: HashMap<String, CacheKey>,
    hits: usize,
    misses: usize,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items for `bytes` stored under `name`. A changed digest for `name`
    /// evicts the entry its previous bytes produced.
    pub fn get_or_parse(
        &mut self,
        name: &str,
        bytes: &[u8],
        options: &SheetOptions,
    ) -> Result<Vec<LineItem>> {
        let key = (checksum_sha256(bytes), *options);
        let previous = self.owners.insert(name.to_owned(), key.clone());
        if let Some(previous) = previous.filter(|previous| *previous != key) {
            self.evict_unowned(&previous);
        }
        if let Some(items) = self.entries.get(&key) {
            self.hits += 1;
            debug!(%name, digest = %key.0, "parse cache hit");
            return Ok(items.clone());
        }
        let items = parse_workbook(bytes, options)?;
        self.misses += 1;
        self.entries.insert(key, items.clone());
        Ok(items)
    }

    fn evict_unowned(&mut self, key: &CacheKey) {
        if self.owners.values().any(|owned| owned == key) {
            return;
        }
        if self.entries.remove(key).is_some() {
            debug!(digest = %key.0, "evicted stale parse");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

pub fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::checksum_sha256;

    #[test]
    fn checksum_is_lowercase_hex() {
        assert_eq!(
            checksum_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
