use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use price_ledger::{export_archive, ingest_archive, Config, PriceStore, SqliteStore};

/// Load and unload price archives without running the server.
#[derive(Parser, Debug)]
#[command(name = "price-ledger", version, about)]
struct Cli {
    /// SQLite database file (overrides PRICES_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a ZIP archive holding the price CSV.
    Import { archive: PathBuf },
    /// Write every stored price into a ZIP archive.
    Export { output: PathBuf },
    /// Print statistics for the whole store.
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let store = SqliteStore::open(&config.db_path)?;

    match cli.command {
        Command::Import { archive } => run_import(&store, &config, &archive),
        Command::Export { output } => run_export(&store, &config, &output),
        Command::Stats => run_stats(&store),
    }
}

fn run_import(store: &SqliteStore, config: &Config, archive: &Path) -> Result<()> {
    println!("📦 Importing {}", archive.display());

    let bytes = fs::read(archive)
        .with_context(|| format!("Failed to read archive: {}", archive.display()))?;
    let commit = ingest_archive(store, &bytes, &config.archive_layout())?;

    println!("✓ Inserted: {} rows", commit.inserted);
    println!("✓ Store now holds {} rows", commit.stats.total_items);
    println!("✓ Categories: {}", commit.stats.total_categories);
    println!("✓ Total price: {:.2}", commit.stats.total_price);

    Ok(())
}

fn run_export(store: &SqliteStore, config: &Config, output: &Path) -> Result<()> {
    let artifact = export_archive(store, &config.archive_layout())?;

    fs::write(output, &artifact.archive)
        .with_context(|| format!("Failed to write archive: {}", output.display()))?;

    println!("✓ Exported {} rows to {}", artifact.rows, output.display());
    println!("✓ {} sha256: {}", artifact.entry_name, artifact.digest);

    Ok(())
}

fn run_stats(store: &SqliteStore) -> Result<()> {
    let stats = store.current_stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
