//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the
//! execution logic for each subcommand and rayon configuration.

use anyhow::{Context, Result};
use carbonledger::api::{self, AppState};
use carbonledger::db::Database;
use carbonledger::emissions::{
    calculate, compute_aggregate, compute_history, history, ActivityRecord, CarbonSinkRecord,
    FactorTable,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::Cli;

fn require_database_url(cli: &Cli) -> Result<&str> {
    cli.database_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)")
    })
}

/// Standard table, or the validated table from `path`.
pub fn load_factors(path: Option<&Path>) -> Result<FactorTable> {
    match path {
        Some(p) => {
            let table = FactorTable::from_file(p)?;
            info!(path = %p.display(), "loaded custom factor table");
            Ok(table)
        }
        None => Ok(FactorTable::standard()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_serve(
    cli: &Cli,
    factors: FactorTable,
    port: u16,
    jwt_secret: &str,
    cors_origin: Option<&str>,
) -> Result<()> {
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let database = Database::connect(database_url).await?;
        database.run_migrations().await?;
        info!("schema up to date");
        let state = AppState::new(Arc::new(database), Arc::new(factors), jwt_secret);
        api::run(port, state, cors_origin).await
    })
}

pub fn run_calculate(cli: &Cli, factors: &FactorTable, user_id: i64) -> Result<()> {
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let database = Database::connect(database_url).await?;
        compute_aggregate(&database, factors, user_id).await
    })?;
    print_json(&report)
}

pub fn run_history(cli: &Cli, factors: &FactorTable, user_id: i64) -> Result<()> {
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    let entries = rt.block_on(async {
        let database = Database::connect(database_url).await?;
        compute_history(&database, factors, user_id).await
    })?;
    print_json(&entries)
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Compute from JSON files: an array of activity records and, optionally, an
/// array of carbon sinks. Sinks are ignored in history mode.
pub fn run_offline(
    factors: &FactorTable,
    records_path: &Path,
    sinks_path: Option<&Path>,
    show_history: bool,
) -> Result<()> {
    let records: Vec<ActivityRecord> = read_json_array(records_path)?;
    if show_history {
        if sinks_path.is_some() {
            warn!("--sinks has no effect with --history");
        }
        return print_json(&history(&records, factors));
    }
    let sinks: Vec<CarbonSinkRecord> = match sinks_path {
        Some(p) => read_json_array(p)?,
        None => Vec::new(),
    };
    info!(
        records = records.len(),
        sinks = sinks.len(),
        "offline calculation"
    );
    print_json(&calculate(&records, &sinks, factors).report())
}

pub fn run_factors(factors: &FactorTable) -> Result<()> {
    print!("{}", factors.to_toml()?);
    Ok(())
}

pub fn configure_rayon(threads: Option<usize>) {
    let num_threads = threads.unwrap_or(0);
    if num_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            warn!(error = %e, "Could not configure rayon thread pool");
        }
    }
}
