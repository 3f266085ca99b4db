//! CLI entry point for powermeter.
//!
//! Loads the configuration, bootstraps file logging, and either lists the
//! host's serial ports (`powermeter ports`) or drops into the interactive
//! menu. Exit code 0 on normal exit, 1 when configuration or logging
//! bootstrap fails.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use powermeter::cancel::CancelToken;
use powermeter::channel::serial::{self, SerialLink};
use powermeter::config::{LoggingSettings, Settings, TestEntry};
use powermeter::menu::{self, MenuChoice, ProgressRenderer};
use powermeter::report::calc;
use powermeter::report::store::ReportStore;
use powermeter::scheduler::{Scheduler, StdinPrompt};
use std::path::Path;

#[derive(Parser)]
#[command(name = "powermeter")]
#[command(about = "Serial power-meter test automation with spreadsheet reporting", long_about = None)]
struct Cli {
    /// Configuration name under config/ (default: "default")
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports visible to the host
    Ports,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&settings.logging).context("initialising logging")?;

    if let Some(Commands::Ports) = cli.command {
        for line in serial::list_ports().context("listing serial ports")? {
            println!("{line}");
        }
        return Ok(());
    }

    println!("{}", menu::BANNER);

    let cancel = CancelToken::new();
    {
        let token = cancel.clone();
        ctrlc::set_handler(move || token.cancel()).context("installing interrupt handler")?;
    }

    loop {
        match menu::display_menu() {
            MenuChoice::RunTests => {
                run_sequence(&settings, &settings.tests, &cancel);
                cancel.reset();
            }
            MenuChoice::AddCalculations => {
                let workbook = Path::new(&settings.report.workbook);
                let result = calc::add_averages(workbook, &settings.report.sheet).and_then(|()| {
                    calc::add_total_annual_power(workbook, &settings.report.sheet)
                });
                match result {
                    Ok(()) => println!("Calculations added to {}", workbook.display()),
                    Err(e) => {
                        error!("adding calculations failed: {e}");
                        eprintln!("ERROR: {e}");
                    }
                }
            }
            MenuChoice::RerunTest => {
                let name = menu::prompt_line("Test name to rerun: ");
                match find_test(&settings.tests, &name) {
                    Some(entry) => {
                        // Rerun immediately; the original start offset would
                        // force a pointless wait on a fresh clock.
                        let entry = TestEntry {
                            start: None,
                            ..entry.clone()
                        };
                        run_sequence(&settings, &[entry], &cancel);
                        cancel.reset();
                    }
                    None => println!("No configured test named '{name}'"),
                }
            }
            MenuChoice::Exit => break,
        }
    }

    Ok(())
}

fn run_sequence(settings: &Settings, tests: &[TestEntry], cancel: &CancelToken) {
    let store = ReportStore::new(&settings.report.workbook, &settings.report.sheet);
    let opener = SerialLink::new(settings.serial.clone());
    let mut scheduler = Scheduler::new(opener, StdinPrompt);

    let mut renderer = ProgressRenderer::new();
    let summary = scheduler.run_sequence(tests, &store, cancel, |progress| {
        renderer.render(progress);
    });
    renderer.finish();

    println!(
        "Sequence finished: {} completed, {} skipped",
        summary.completed.len(),
        summary.skipped
    );
    if !summary.persist_failures.is_empty() {
        eprintln!(
            "WARNING: results could not be persisted for: {}",
            summary.persist_failures.join(", ")
        );
    }
}

fn find_test<'a>(tests: &'a [TestEntry], name: &str) -> Option<&'a TestEntry> {
    tests.iter().find(|entry| {
        entry
            .header
            .as_deref()
            .is_some_and(|header| header.eq_ignore_ascii_case(name))
    })
}

fn init_logging(cfg: &LoggingSettings) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)
        .with_context(|| format!("opening log file '{}'", cfg.log_file))?;

    let level = cfg
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("installing logger")?;
    Ok(())
}
