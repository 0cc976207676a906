// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::info;
use url::Url;

const FALLBACK_NAME: &str = "workbook.xlsx";

/// Where an imported workbook comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkbookSource {
    Url(Url),
    Path(PathBuf),
}

impl WorkbookSource {
    /// `http://` and `https://` arguments are URLs; anything else is a path.
    pub fn parse(arg: &str) -> Result<Self> {
        let trimmed = arg.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("workbook source is empty -- pass a file path or URL"));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url =
                Url::parse(trimmed).with_context(|| format!("invalid workbook URL {trimmed}"))?;
            return Ok(Self::Url(url));
        }
        Ok(Self::Path(PathBuf::from(trimmed)))
    }

    /// File name the workbook is stored under.
    pub fn file_name(&self) -> String {
        let name = match self {
            Self::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(str::to_owned),
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        };
        name.filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_NAME.to_owned())
    }

    pub fn read(&self, timeout: Duration) -> Result<Vec<u8>> {
        match self {
            Self::Url(url) => fetch_url(url, timeout),
            Self::Path(path) => read_path(path),
        }
    }
}

impl std::fmt::Display for WorkbookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn read_path(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| {
        format!(
            "read workbook {} -- check the path and retry",
            path.display()
        )
    })
}

/// Downloads a workbook with a blocking client.
pub fn fetch_url(url: &Url, timeout: Duration) -> Result<Vec<u8>> {
    let http = Client::builder()
        .timeout(timeout)
        .build()
        .context("build HTTP client")?;
    let response = http
        .get(url.clone())
        .send()
        .map_err(|error| connection_error(url, error))?;

    let status = response.status();
    if !status.is_success() {
        return Err(status_error(url, status));
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("read response body from {url}"))?;
    info!(%url, bytes = bytes.len(), "fetched workbook");
    Ok(bytes.to_vec())
}

fn connection_error(url: &Url, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("timed out fetching {url} -- raise [fetch] timeout or retry later");
    }
    anyhow!("cannot reach {url} -- check the address and your network ({error})")
}

fn status_error(url: &Url, status: StatusCode) -> anyhow::Error {
    anyhow!(
        "fetching {url} failed with status {} -- check the link and retry",
        status.as_u16()
    )
}
