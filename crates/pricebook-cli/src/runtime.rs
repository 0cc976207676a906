// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use pricebook_app::PriceEdits;
use pricebook_tui::{LibrarySnapshot, ReceiptSettings, WorkbookFailure};
use pricebook_xlsx::Library;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

use crate::commands;

pub struct LibraryRuntime<'a> {
    library: &'a mut Library,
    receipt: ReceiptSettings,
    fetch_timeout: Duration,
    local_offset: UtcOffset,
}

impl<'a> LibraryRuntime<'a> {
    pub fn new(
        library: &'a mut Library,
        receipt: ReceiptSettings,
        fetch_timeout: Duration,
        local_offset: UtcOffset,
    ) -> Self {
        Self {
            library,
            receipt,
            fetch_timeout,
            local_offset,
        }
    }
}

impl pricebook_tui::AppRuntime for LibraryRuntime<'_> {
    fn load_workbooks(&mut self) -> Result<LibrarySnapshot> {
        let report = self.library.load_all()?;
        Ok(LibrarySnapshot {
            workbooks: report.workbooks,
            failures: report
                .failures
                .into_iter()
                .map(|failure| WorkbookFailure {
                    name: failure.name,
                    message: format!("{:#}", failure.error),
                })
                .collect(),
        })
    }

    fn import_workbook(&mut self, source: &str) -> Result<String> {
        commands::import(self.library, source, self.fetch_timeout)
    }

    fn save_prices(&mut self, workbook: &str, edits: &PriceEdits) -> Result<usize> {
        self.library.save_prices(workbook, edits.as_map())
    }

    fn receipt_settings(&self) -> ReceiptSettings {
        self.receipt.clone()
    }

    fn printed_at(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.local_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::LibraryRuntime;
    use anyhow::Result;
    use pricebook_app::{PriceEditInput, PriceEdits};
    use pricebook_testkit::{WorkbookBuilder, temp_data_dir};
    use pricebook_tui::{AppRuntime, ReceiptSettings};
    use pricebook_xlsx::{Library, SheetOptions};
    use std::time::Duration;
    use time::UtcOffset;
    use time::macros::offset;

    fn runtime(library: &mut Library) -> LibraryRuntime<'_> {
        LibraryRuntime::new(
            library,
            ReceiptSettings::default(),
            Duration::from_secs(1),
            offset!(+6),
        )
    }

    #[test]
    fn snapshot_keeps_failures_next_to_loaded_workbooks() -> Result<()> {
        let (_guard, data_dir) = temp_data_dir()?;
        let mut library = Library::open(&data_dir, SheetOptions::default())?;
        library.import(
            "clinic.xlsx",
            &WorkbookBuilder::new()
                .header()
                .item("Visit", 125.5, "")
                .build()?,
        )?;
        std::fs::write(data_dir.join("broken.xlsx"), b"garbage")?;

        let snapshot = runtime(&mut library).load_workbooks()?;
        assert_eq!(snapshot.workbooks.len(), 1);
        assert_eq!(snapshot.workbooks[0].items[0].price_cents, 12_550);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].name, "broken.xlsx");
        assert!(snapshot.failures[0].message.contains("broken.xlsx"));
        Ok(())
    }

    #[test]
    fn saved_prices_are_visible_on_reload() -> Result<()> {
        let (_guard, data_dir) = temp_data_dir()?;
        let mut library = Library::open(&data_dir, SheetOptions::default())?;
        library.import(
            "clinic.xlsx",
            &WorkbookBuilder::new()
                .header()
                .item("Visit", 125.5, "")
                .build()?,
        )?;

        let mut runtime = runtime(&mut library);
        let mut edits = PriceEdits::default();
        edits.apply(&PriceEditInput::new("Visit", "140"))?;
        assert_eq!(runtime.save_prices("clinic.xlsx", &edits)?, 1);
        let snapshot = runtime.load_workbooks()?;
        assert_eq!(snapshot.workbooks[0].items[0].price_cents, 14_000);
        Ok(())
    }

    #[test]
    fn printed_at_uses_the_captured_offset() -> Result<()> {
        let (_guard, data_dir) = temp_data_dir()?;
        let mut library = Library::open(&data_dir, SheetOptions::default())?;
        let printed_at = runtime(&mut library).printed_at();
        assert_eq!(printed_at.offset(), UtcOffset::from_hms(6, 0, 0)?);
        Ok(())
    }
}
