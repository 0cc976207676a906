// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Spreadsheet I/O for price lists: reads `.xlsx` workbooks into raw rows,
//! writes price edits back, and manages the directory of stored workbooks.

mod package;

pub mod cache;
pub mod library;
pub mod patch;
pub mod read;
pub mod source;

pub use cache::ParseCache;
pub use library::{APP_NAME, DATA_DIR_ENV, Library, LoadFailure, LoadReport, default_data_dir};
pub use patch::{PatchOutcome, patch_prices};
pub use read::{SheetOptions, parse_workbook, read_rows};
pub use source::{WorkbookSource, fetch_url};
