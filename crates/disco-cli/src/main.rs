use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use disco_journal::{ImportReport, JournalImporter, Reconciler};
use disco_plugin::config::PluginConfig;
use disco_plugin::view::{not_found_message, SystemView};
use disco_storage::DiscoStore;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "disco")]
#[command(about = "Local discovery database for journal events", long_about = None)]
struct Cli {
    /// Database file; defaults to the plugin data directory
    #[arg(long, global = true, env = "DISCO_DB")]
    db: Option<PathBuf>,
    #[arg(long, global = true, env = "DISCO_LOG_LEVEL", default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile journal lines from files, or stdin when none are given
    Import { files: Vec<PathBuf> },
    /// Reconcile new lines of a journal file since the last ingest
    Ingest { file: PathBuf },
    /// Print a stored system
    Show {
        name: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PluginConfig::from_env().db_path());
    let store = DiscoStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let mut reconciler = Reconciler::new(store);

    match cli.command {
        Commands::Import { files } => import(&mut reconciler, &files)?,
        Commands::Ingest { file } => {
            let report = JournalImporter::new()
                .ingest_file(&mut reconciler, &file, print_system_line(0))
                .with_context(|| format!("Failed to ingest {}", file.display()))?;
            print_report(&report);
        }
        Commands::Show { name, json } => match reconciler
            .find_system_by_name(&name)
            .context("Failed to look up system")?
        {
            Some(system) if json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&system).context("Failed to encode system")?
                );
            }
            Some(system) => print!("{}", SystemView::build(&system).render_text()),
            None => println!("{}", not_found_message(&name)),
        },
    }

    reconciler.close().context("Failed to close database")?;
    Ok(())
}

fn import(reconciler: &mut Reconciler, files: &[PathBuf]) -> Result<()> {
    let importer = JournalImporter::new();
    if files.is_empty() {
        let report = importer
            .import_reader(reconciler, io::stdin().lock(), print_system_line(0))
            .context("Failed to import stdin")?;
        print_report(&report);
        return Ok(());
    }

    let mut offset = 0;
    for path in files {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let report = importer
            .import_reader(reconciler, BufReader::new(file), print_system_line(offset))
            .with_context(|| format!("Failed to import {}", path.display()))?;
        offset += report.lines;
        print_report(&report);
    }
    Ok(())
}

fn print_system_line(offset: usize) -> impl FnMut(usize, &disco_core::System) {
    move |line, system| {
        println!(
            "[{}]: id:{}, name:{}",
            offset + line,
            system.system_address,
            system.name
        );
    }
}

fn print_report(report: &ImportReport) {
    eprintln!(
        "lines={} handled={} ignored={} corrupt={} cursor={}{}{}",
        report.lines,
        report.handled,
        report.ignored,
        report.skipped_corrupt_lines,
        report.cursor,
        if report.deferred_partial_line {
            " partial_line_deferred"
        } else {
            ""
        },
        if report.reset_due_to_truncation {
            " reset_after_truncation"
        } else {
            ""
        },
    );
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("log_init_error: a global subscriber is already set");
    }
}
