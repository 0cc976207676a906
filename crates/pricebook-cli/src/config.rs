// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use pricebook_app::{DEFAULT_LINE_HEIGHT, DEFAULT_PAGE_WIDTH, Locale, PageSpec};
use pricebook_tui::{DEFAULT_RECEIPT_COLUMNS, ReceiptSettings};
use pricebook_xlsx::{APP_NAME, SheetOptions};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
pub const CONFIG_PATH_ENV: &str = "PRICEBOOK_CONFIG_PATH";
const DEFAULT_FETCH_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_FILE_NAME: &str = "pricebook.log";
// Title, two tags and the price must be present.
const MIN_SHEET_COLUMNS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub sheet: Sheet,
    #[serde(default)]
    pub receipt: Receipt,
    #[serde(default)]
    pub fetch: Fetch,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            sheet: Sheet::default(),
            receipt: Receipt::default(),
            fetch: Fetch::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    pub header_rows: Option<usize>,
    pub min_columns: Option<usize>,
    pub tag_colors: Option<bool>,
}

impl Default for Sheet {
    fn default() -> Self {
        let defaults = SheetOptions::default();
        Self {
            header_rows: Some(defaults.header_rows),
            min_columns: Some(defaults.min_columns),
            tag_colors: Some(defaults.tag_colors),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    pub page_width: Option<f64>,
    pub line_height: Option<f64>,
    pub columns: Option<usize>,
    pub locale: Option<String>,
    pub title: Option<String>,
}

impl Default for Receipt {
    fn default() -> Self {
        Self {
            page_width: Some(DEFAULT_PAGE_WIDTH),
            line_height: Some(DEFAULT_LINE_HEIGHT),
            columns: Some(DEFAULT_RECEIPT_COLUMNS),
            locale: Some(Locale::default().as_str().to_owned()),
            title: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fetch {
    pub timeout: Option<String>,
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_FETCH_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and keep values under [storage], [sheet], [receipt], [fetch], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(data_dir) = &self.storage.data_dir
            && data_dir.trim().is_empty()
        {
            bail!(
                "storage.data_dir in {} is empty; remove it to use the default",
                path.display()
            );
        }

        if let Some(min_columns) = self.sheet.min_columns
            && min_columns < MIN_SHEET_COLUMNS
        {
            bail!(
                "sheet.min_columns in {} must be at least {MIN_SHEET_COLUMNS}, got {min_columns}",
                path.display()
            );
        }

        for (key, value) in [
            ("receipt.page_width", self.receipt.page_width),
            ("receipt.line_height", self.receipt.line_height),
        ] {
            if let Some(value) = value
                && !(value.is_finite() && value > 0.0)
            {
                bail!("{key} in {} must be positive, got {value}", path.display());
            }
        }

        if self.receipt.columns == Some(0) {
            bail!("receipt.columns in {} must be positive, got 0", path.display());
        }

        if let Some(locale) = &self.receipt.locale
            && Locale::parse(locale).is_none()
        {
            bail!(
                "receipt.locale in {} must be one of: ru, en; got {locale:?}",
                path.display()
            );
        }

        if let Some(timeout) = &self.fetch.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "fetch.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level in {} is not a valid filter; use a level like info or debug",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    /// `[storage].data_dir`, else `PRICEBOOK_DATA_DIR`, else the platform default.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(path) => Ok(PathBuf::from(path)),
            None => pricebook_xlsx::default_data_dir(),
        }
    }

    pub fn sheet_options(&self) -> SheetOptions {
        let defaults = SheetOptions::default();
        SheetOptions {
            header_rows: self.sheet.header_rows.unwrap_or(defaults.header_rows),
            min_columns: self.sheet.min_columns.unwrap_or(defaults.min_columns),
            tag_colors: self.sheet.tag_colors.unwrap_or(defaults.tag_colors),
        }
    }

    pub fn locale(&self) -> Locale {
        self.receipt
            .locale
            .as_deref()
            .and_then(Locale::parse)
            .unwrap_or_default()
    }

    pub fn receipt_settings(&self) -> ReceiptSettings {
        ReceiptSettings {
            page: PageSpec {
                page_width: self.receipt.page_width.unwrap_or(DEFAULT_PAGE_WIDTH),
                line_height: self.receipt.line_height.unwrap_or(DEFAULT_LINE_HEIGHT),
                locale: self.locale(),
            },
            columns: self.receipt.columns.unwrap_or(DEFAULT_RECEIPT_COLUMNS),
            default_title: self
                .receipt
                .title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .map(str::to_owned),
        }
    }

    pub fn fetch_timeout(&self) -> Result<Duration> {
        parse_duration(self.fetch.timeout.as_deref().unwrap_or(DEFAULT_FETCH_TIMEOUT))
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self, data_dir: &Path) -> PathBuf {
        match &self.log.file {
            Some(path) => PathBuf::from(path),
            None => data_dir.join(LOG_FILE_NAME),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# pricebook config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is the platform data dir (for example ~/.local/share/pricebook/uploaded_files)\n# data_dir = \"/absolute/path/to/uploaded_files\"\n\n[sheet]\n# Rows dropped from the top of every sheet before parsing.\nheader_rows = 1\nmin_columns = 5\ntag_colors = true\n\n[receipt]\npage_width = {}\nline_height = {}\ncolumns = {}\n# ru or en\nlocale = \"ru\"\n# title = \"Clinic\"\n\n[fetch]\ntimeout = \"{}\"\n\n[log]\nlevel = \"{}\"\n# file = \"/absolute/path/to/pricebook.log\"\n",
            path.display(),
            DEFAULT_PAGE_WIDTH,
            DEFAULT_LINE_HEIGHT,
            DEFAULT_RECEIPT_COLUMNS,
            DEFAULT_FETCH_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}
