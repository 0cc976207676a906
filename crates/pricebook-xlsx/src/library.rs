// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use pricebook_app::Workbook;
use tracing::{info, warn};

use crate::cache::ParseCache;
use crate::patch::patch_prices;
use crate::read::SheetOptions;

pub const APP_NAME: &str = "pricebook";
pub const DATA_DIR_ENV: &str = "PRICEBOOK_DATA_DIR";
const WORKBOOK_EXTENSION: &str = "xlsx";

/// `$PRICEBOOK_DATA_DIR`, else `<data dir>/pricebook/uploaded_files`.
pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(override_dir) = env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {DATA_DIR_ENV} to a writable directory")
    })?;
    Ok(data_root.join(APP_NAME).join("uploaded_files"))
}

/// A workbook that could not be loaded, kept next to the ones that could.
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub workbooks: Vec<Workbook>,
    pub failures: Vec<LoadFailure>,
}

/// Directory of stored workbooks.
#[derive(Debug)]
pub struct Library {
    dir: PathBuf,
    options: SheetOptions,
    cache: ParseCache,
}

impl Library {
    pub fn open(dir: impl Into<PathBuf>, options: SheetOptions) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create library directory {}", dir.display()))?;
        Ok(Self {
            dir,
            options,
            cache: ParseCache::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    /// Stored workbook names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("read library directory {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if has_workbook_extension(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Stores `bytes` under the final path component of `name`, replacing
    /// any workbook with the same name. Unreadable workbooks are rejected
    /// before anything is written.
    pub fn import(&mut self, name: &str, bytes: &[u8]) -> Result<String> {
        let name = sanitize_name(name)?;
        self.cache
            .get_or_parse(&name, bytes, &self.options)
            .with_context(|| format!("{name} is not a readable price list"))?;
        let path = self.dir.join(&name);
        write_replacing(&path, bytes)?;
        info!(%name, bytes = bytes.len(), "imported workbook");
        Ok(name)
    }

    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        fs::read(&path).with_context(|| {
            format!(
                "read workbook {} -- list stored workbooks with --check",
                path.display()
            )
        })
    }

    pub fn load(&mut self, name: &str) -> Result<Workbook> {
        let bytes = self.read_bytes(name)?;
        let items = self
            .cache
            .get_or_parse(name, &bytes, &self.options)
            .with_context(|| format!("parse workbook {name}"))?;
        Ok(Workbook::new(name, items))
    }

    /// Loads every stored workbook. One bad file never hides the others.
    pub fn load_all(&mut self) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        for name in self.list()? {
            match self.load(&name) {
                Ok(workbook) => report.workbooks.push(workbook),
                Err(error) => {
                    warn!(%name, error = %format!("{error:#}"), "skipping unreadable workbook");
                    report.failures.push(LoadFailure { name, error });
                }
            }
        }
        info!(
            loaded = report.workbooks.len(),
            failed = report.failures.len(),
            cache_hits = self.cache.hits(),
            "loaded library"
        );
        Ok(report)
    }

    /// Writes price edits into the stored workbook and returns the number
    /// of cells changed.
    pub fn save_prices(&mut self, name: &str, edits: &BTreeMap<String, i64>) -> Result<usize> {
        if edits.is_empty() {
            return Ok(0);
        }
        let path = self.path_of(name)?;
        let bytes = self.read_bytes(name)?;
        let outcome = patch_prices(&bytes, edits, self.options.header_rows)
            .with_context(|| format!("apply price edits to {name}"))?;
        write_replacing(&path, &outcome.bytes)?;
        info!(%name, cells = outcome.patched_cells, "saved prices");
        Ok(outcome.patched_cells)
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        let sanitized = sanitize_name(name)?;
        if sanitized != name {
            bail!("workbook name {name:?} must be a plain file name");
        }
        Ok(self.dir.join(sanitized))
    }
}

/// Final path component, required to end in `.xlsx`.
fn sanitize_name(name: &str) -> Result<String> {
    let file_name = Path::new(name.trim())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .ok_or_else(|| anyhow!("invalid workbook name {name:?} -- use a name like prices.xlsx"))?;
    if !has_workbook_extension(&file_name) {
        bail!("{file_name} is not an .xlsx workbook -- save it as .xlsx and retry");
    }
    Ok(file_name)
}

fn has_workbook_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case(WORKBOOK_EXTENSION))
}

/// Writes next to the target and renames over it.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);
    fs::write(&staging, bytes).with_context(|| format!("write {}", staging.display()))?;
    fs::rename(&staging, path).with_context(|| format!("replace {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{has_workbook_extension, sanitize_name};

    #[test]
    fn names_are_reduced_to_their_file_component() -> anyhow::Result<()> {
        assert_eq!(sanitize_name("prices.xlsx")?, "prices.xlsx");
        assert_eq!(sanitize_name("../../etc/prices.xlsx")?, "prices.xlsx");
        assert_eq!(sanitize_name(" Lab.XLSX ")?, "Lab.XLSX");
        Ok(())
    }

    #[test]
    fn non_workbook_names_are_rejected() {
        assert!(sanitize_name("notes.txt").is_err());
        assert!(sanitize_name("..").is_err());
        assert!(sanitize_name(".xlsx").is_err());
        assert!(sanitize_name("").is_err());
    }

    #[test]
    fn staging_files_are_not_workbooks() {
        assert!(has_workbook_extension("a.xlsx"));
        assert!(!has_workbook_extension("a.xlsx.partial"));
    }
}
