// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod commands;
mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use logging::LogTarget;
use pricebook_app::AppState;
use pricebook_xlsx::Library;
use runtime::LibraryRuntime;
use std::env;
use std::path::PathBuf;
use time::{OffsetDateTime, UtcOffset};
use tracing::info;

fn main() {
    // Must run before any thread exists or the offset lookup refuses.
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    if let Err(error) = run(local_offset) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run(local_offset: UtcOffset) -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `pricebook --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let data_dir = config.data_dir()?;
    if options.print_data_dir {
        println!("{}", data_dir.display());
        return Ok(());
    }

    let log_target = if options.launches_tui() {
        LogTarget::File(config.log_file(&data_dir))
    } else {
        LogTarget::Stderr
    };
    logging::init(config.log_level(), &log_target)?;
    info!(
        config = %options.config_path.display(),
        data_dir = %data_dir.display(),
        "resolved configuration"
    );

    let mut library = Library::open(&data_dir, config.sheet_options()).with_context(|| {
        format!(
            "open workbook library {} -- if this path is wrong, set [storage].data_dir or PRICEBOOK_DATA_DIR",
            data_dir.display()
        )
    })?;
    let fetch_timeout = config.fetch_timeout()?;

    for source in &options.imports {
        let name = commands::import(&mut library, source, fetch_timeout)?;
        println!("imported {name}");
    }

    if let Some(name) = &options.dump {
        println!("{}", commands::dump_json(&mut library, name, config.locale())?);
    }

    if let Some(name) = &options.receipt {
        let printed_at = OffsetDateTime::now_utc().to_offset(local_offset);
        let text = commands::receipt(
            &mut library,
            name,
            &options.select,
            options.title.as_deref(),
            &config.receipt_settings(),
            printed_at,
        )?;
        print!("{text}");
    }

    if options.check_only {
        let (report, failed) = commands::check(&mut library)?;
        print!("{report}");
        if failed > 0 {
            bail!("{failed} workbook(s) failed to load");
        }
    }

    if !options.launches_tui() {
        return Ok(());
    }

    let mut state = AppState::default();
    let mut runtime = LibraryRuntime::new(
        &mut library,
        config.receipt_settings(),
        fetch_timeout,
        local_offset,
    );
    pricebook_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_data_dir: bool,
    print_example: bool,
    imports: Vec<String>,
    dump: Option<String>,
    receipt: Option<String>,
    select: Vec<usize>,
    title: Option<String>,
    check_only: bool,
    show_help: bool,
}

impl CliOptions {
    fn launches_tui(&self) -> bool {
        self.imports.is_empty()
            && self.dump.is_none()
            && self.receipt.is_none()
            && !self.check_only
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_data_dir: false,
        print_example: false,
        imports: Vec::new(),
        dump: None,
        receipt: None,
        select: Vec::new(),
        title: None,
        check_only: false,
        show_help: false,
    };
    let mut saw_select = false;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-data-dir" => {
                options.print_data_dir = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--import" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--import requires a file path or URL"))?;
                options.imports.push(value.as_ref().to_owned());
            }
            "--dump" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--dump requires a workbook name"))?;
                options.dump = Some(value.as_ref().to_owned());
            }
            "--receipt" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--receipt requires a workbook name"))?;
                options.receipt = Some(value.as_ref().to_owned());
            }
            "--select" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--select requires item indexes like 0,2,5"))?;
                options.select.extend(parse_select(value.as_ref())?);
                saw_select = true;
            }
            "--title" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--title requires a receipt header"))?;
                options.title = Some(value.as_ref().to_owned());
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.receipt.is_none() && (saw_select || options.title.is_some()) {
        bail!("--select and --title only apply with --receipt <workbook>");
    }

    Ok(options)
}

fn parse_select(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>().map_err(|_| {
                anyhow!("--select expects comma-separated item indexes like 0,2,5; got {part:?}")
            })
        })
        .collect()
}

fn print_help() {
    println!("pricebook");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-data-dir         Print resolved workbook directory");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --import <path|url>      Store a workbook in the library (repeatable)");
    println!("  --dump <name>            Print a stored workbook's items as JSON");
    println!("  --receipt <name>         Print a receipt for a stored workbook");
    println!("    --select <i,j,..>      Item indexes to include (default: all)");
    println!("    --title <text>         Receipt header");
    println!("  --check                  Load every stored workbook and report failures");
    println!("  --help                   Show this help");
    println!("With no command flags, opens the interactive viewer.");
}
