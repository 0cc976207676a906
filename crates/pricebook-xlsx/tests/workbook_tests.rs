// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use anyhow::Result;
use pricebook_app::{CellFill, CellValue};
use pricebook_testkit::{HEADER, PriceListFaker, WorkbookBuilder, empty, number, temp_data_dir, text};
use pricebook_xlsx::{Library, SheetOptions, parse_workbook, patch_prices, read_rows};

fn lab_workbook() -> WorkbookBuilder {
    WorkbookBuilder::new()
        .header()
        .item("Consultation", 1000.0, "")
        .group("Biochemistry")
        .item("Glucose", 250.0, "1 day")
        .tagged_item("Ferritin", ("cito", "FFFF0000"), ("lab", "FFFFFFFF"), 900.0)
        .blank_row()
        .group("Hormones")
        .item("TSH", 700.0, "2 days")
}

fn zip_part(bytes: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(name)?;
    let mut out = Vec::new();
    file.read_to_end(&mut out)?;
    Ok(out)
}

#[test]
fn reader_drops_header_and_pads_rows() -> Result<()> {
    let bytes = lab_workbook().build()?;
    let rows = read_rows(&bytes, &SheetOptions::default())?;
    assert_eq!(rows.len(), 7);
    assert!(rows.iter().all(|row| row.len() == 5));
    assert_eq!(rows[0].sheet_row.get(), 2);
    assert_eq!(rows[0].cells[0].value, CellValue::text("Consultation"));
    assert_eq!(rows[1].cells[3].value, CellValue::Empty);
    Ok(())
}

#[test]
fn parsed_workbook_matches_sheet_layout() -> Result<()> {
    let bytes = lab_workbook().build()?;
    let items = parse_workbook(&bytes, &SheetOptions::default())?;

    let summary = items
        .iter()
        .map(|item| {
            (
                item.group.as_deref().unwrap_or("-"),
                item.title.as_str(),
                item.price_cents,
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            ("-", "Consultation", 100_000),
            ("Biochemistry", "Glucose", 25_000),
            ("Biochemistry", "Ferritin", 90_000),
            ("Hormones", "TSH", 70_000),
        ]
    );

    let ferritin = &items[2];
    assert_eq!(ferritin.tag0_text, "cito");
    assert_eq!(
        ferritin.tag0_color.as_ref().map(|color| color.as_str()),
        Some("#ff0000")
    );
    assert_eq!(ferritin.tag1_text, "lab");
    assert_eq!(ferritin.tag1_color, None);
    assert_eq!(items[1].time, "1 day");
    Ok(())
}

#[test]
fn inline_strings_read_the_same_as_shared_strings() -> Result<()> {
    let shared = parse_workbook(&lab_workbook().build()?, &SheetOptions::default())?;
    let inline = parse_workbook(
        &lab_workbook().inline_strings(true).build()?,
        &SheetOptions::default(),
    )?;
    assert_eq!(shared, inline);
    Ok(())
}

#[test]
fn non_numeric_price_text_becomes_zero() -> Result<()> {
    let bytes = WorkbookBuilder::new()
        .header()
        .row(vec![
            text("Consultation"),
            empty(),
            empty(),
            text("by arrangement"),
            empty(),
        ])
        .build()?;
    let items = parse_workbook(&bytes, &SheetOptions::default())?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].price_cents, 0);
    Ok(())
}

#[test]
fn tag_colors_can_be_disabled() -> Result<()> {
    let bytes = lab_workbook().build()?;
    let options = SheetOptions {
        tag_colors: false,
        ..SheetOptions::default()
    };
    let items = parse_workbook(&bytes, &options)?;
    assert!(items.iter().all(|item| item.tag0_color.is_none()));
    Ok(())
}

#[test]
fn theme_colored_fill_has_no_tag_color() -> Result<()> {
    let themed = CellFill {
        pattern: pricebook_app::FillPattern::Solid,
        fg_rgb: None,
    };
    let bytes = WorkbookBuilder::new()
        .header()
        .row(vec![
            text("CBC"),
            text("urgent").with_fill(themed),
            empty(),
            number(500.0),
            empty(),
        ])
        .build()?;
    let items = parse_workbook(&bytes, &SheetOptions::default())?;
    assert_eq!(items[0].tag0_text, "urgent");
    assert_eq!(items[0].tag0_color, None);
    Ok(())
}

#[test]
fn garbage_bytes_are_an_error() {
    let error = parse_workbook(b"not a zip", &SheetOptions::default())
        .expect_err("garbage should not parse");
    assert!(format!("{error:#}").contains("not a valid .xlsx"));
}

#[test]
fn patch_rewrites_only_matching_prices_and_keeps_other_parts() -> Result<()> {
    let bytes = lab_workbook().extra_sheet("Notes").build()?;
    let mut edits = BTreeMap::new();
    edits.insert("Glucose".to_owned(), 27_550);
    edits.insert("Biochemistry".to_owned(), 1);
    edits.insert("Missing".to_owned(), 5);

    let outcome = patch_prices(&bytes, &edits, 1)?;
    assert_eq!(outcome.patched_cells, 1);

    let items = parse_workbook(&outcome.bytes, &SheetOptions::default())?;
    let prices = items
        .iter()
        .map(|item| (item.title.as_str(), item.price_cents))
        .collect::<Vec<_>>();
    assert_eq!(
        prices,
        vec![
            ("Consultation", 100_000),
            ("Glucose", 27_550),
            ("Ferritin", 90_000),
            ("TSH", 70_000),
        ]
    );
    // The group header keeps its blank price.
    assert_eq!(items[1].group.as_deref(), Some("Biochemistry"));

    for part in ["xl/styles.xml", "xl/sharedStrings.xml", "xl/worksheets/sheet2.xml"] {
        assert_eq!(zip_part(&bytes, part)?, zip_part(&outcome.bytes, part)?, "{part}");
    }
    Ok(())
}

#[test]
fn saving_a_header_title_leaves_the_header_row_alone() -> Result<()> {
    let (_guard, data_dir) = temp_data_dir()?;
    let mut library = Library::open(&data_dir, SheetOptions::default())?;
    let bytes = lab_workbook().item("title", 10.0, "").build()?;
    library.import("lab.xlsx", &bytes)?;

    let mut edits = BTreeMap::new();
    edits.insert(HEADER[0].to_owned(), 2_000);
    assert_eq!(library.save_prices("lab.xlsx", &edits)?, 1);

    let stored = library.read_bytes("lab.xlsx")?;
    let header_options = SheetOptions {
        header_rows: 0,
        ..SheetOptions::default()
    };
    let rows = read_rows(&stored, &header_options)?;
    assert_eq!(rows[0].cells[3].value, CellValue::text(HEADER[3]));
    let last = rows.last().expect("item row should be stored");
    assert_eq!(last.cells[3].value, CellValue::Number(20.0));
    Ok(())
}

#[test]
fn library_round_trip_import_list_load_and_save() -> Result<()> {
    let (_guard, data_dir) = temp_data_dir()?;
    let mut library = Library::open(&data_dir, SheetOptions::default())?;

    let stored = library.import("../incoming/lab.xlsx", &lab_workbook().build()?)?;
    assert_eq!(stored, "lab.xlsx");
    library.import("clinic.xlsx", &WorkbookBuilder::new().header().item("Visit", 125.5, "").build()?)?;
    assert_eq!(library.list()?, vec!["clinic.xlsx", "lab.xlsx"]);

    let mut edits = BTreeMap::new();
    edits.insert("TSH".to_owned(), 75_000);
    assert_eq!(library.save_prices("lab.xlsx", &edits)?, 1);

    let report = library.load_all()?;
    assert!(report.failures.is_empty());
    let lab = report
        .workbooks
        .iter()
        .find(|workbook| workbook.name == "lab.xlsx")
        .expect("lab workbook should load");
    let tsh = lab
        .items
        .iter()
        .find(|item| item.title == "TSH")
        .expect("TSH should be listed");
    assert_eq!(tsh.price_cents, 75_000);
    Ok(())
}

#[test]
fn library_reports_bad_files_without_dropping_good_ones() -> Result<()> {
    let (_guard, data_dir) = temp_data_dir()?;
    let mut library = Library::open(&data_dir, SheetOptions::default())?;
    library.import("good.xlsx", &lab_workbook().build()?)?;
    std::fs::write(data_dir.join("broken.xlsx"), b"definitely not a workbook")?;
    std::fs::write(data_dir.join("readme.txt"), b"ignored")?;

    let report = library.load_all()?;
    assert_eq!(report.workbooks.len(), 1);
    assert_eq!(report.workbooks[0].name, "good.xlsx");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "broken.xlsx");
    Ok(())
}

#[test]
fn library_rejects_unreadable_imports() -> Result<()> {
    let (_guard, data_dir) = temp_data_dir()?;
    let mut library = Library::open(&data_dir, SheetOptions::default())?;
    assert!(library.import("bad.xlsx", b"nope").is_err());
    assert!(library.import("notes.csv", &lab_workbook().build()?).is_err());
    assert!(library.list()?.is_empty());
    Ok(())
}

#[test]
fn identical_bytes_are_parsed_once() -> Result<()> {
    let (_guard, data_dir) = temp_data_dir()?;
    let mut library = Library::open(&data_dir, SheetOptions::default())?;
    let bytes = lab_workbook().build()?;
    library.import("a.xlsx", &bytes)?;
    library.import("b.xlsx", &bytes)?;
    library.load_all()?;
    assert_eq!(library.cache().misses(), 1);
    assert_eq!(library.cache().hits(), 3);
    assert_eq!(library.cache().len(), 1);

    let mut edits = BTreeMap::new();
    edits.insert("TSH".to_owned(), 75_000);
    library.save_prices("a.xlsx", &edits)?;
    library.load_all()?;
    // b.xlsx still pins the original parse.
    assert_eq!(library.cache().len(), 2);
    assert_eq!(library.cache().misses(), 2);
    assert_eq!(library.cache().hits(), 4);
    Ok(())
}

#[test]
fn saving_prices_replaces_the_cached_parse() -> Result<()> {
    let (_guard, data_dir) = temp_data_dir()?;
    let mut library = Library::open(&data_dir, SheetOptions::default())?;
    assert!(library.cache().is_empty());
    library.import("lab.xlsx", &lab_workbook().build()?)?;
    assert_eq!(library.cache().len(), 1);

    for price in [75_000, 76_000, 77_000] {
        let mut edits = BTreeMap::new();
        edits.insert("TSH".to_owned(), price);
        library.save_prices("lab.xlsx", &edits)?;
        let lab = library.load("lab.xlsx")?;
        let tsh = lab
            .items
            .iter()
            .find(|item| item.title == "TSH")
            .expect("TSH should be listed");
        assert_eq!(tsh.price_cents, price);
        assert_eq!(library.cache().len(), 1);
    }

    library.load_all()?;
    assert_eq!(library.cache().len(), 1);
    assert_eq!(library.cache().misses(), 4);
    Ok(())
}

#[test]
fn faker_workbooks_keep_every_item() -> Result<()> {
    let mut faker = PriceListFaker::new(11);
    let sections = faker.price_list(4, 5);
    let bytes = faker.workbook(&sections).build()?;
    let items = parse_workbook(&bytes, &SheetOptions::default())?;

    let expected = sections
        .iter()
        .flat_map(|section| {
            section
                .items
                .iter()
                .map(move |item| (section.group.clone(), item.title.clone(), item.price_cents))
        })
        .collect::<Vec<_>>();
    let actual = items
        .iter()
        .map(|item| {
            (
                item.group.clone().unwrap_or_default(),
                item.title.clone(),
                item.price_cents,
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(actual, expected);
    for (position, item) in items.iter().enumerate() {
        assert_eq!(item.source_row_index.get(), position);
    }
    Ok(())
}
