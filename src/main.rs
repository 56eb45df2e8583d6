//! # Main: CLI Entry Point
//!
//! Routes CLI subcommands to the HTTP server, database-backed calculations,
//! offline calculations over JSON files, and factor table inspection.
//!
//! ## Subcommands
//!
//! - `serve`: apply the schema and run the HTTP API.
//! - `calculate` / `history`: print one user's payloads from the database.
//! - `offline`: compute from JSON record files, no database required.
//! - `factors`: print the effective factor table as TOML.
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection.
//! - `--factors` / `CARBONLEDGER_FACTORS`: custom factor table (TOML).
//! - `--threads`: Rayon thread pool size (0 = all cores).

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "carbonledger",
    about = "Track mining emissions and carbon sinks, and compute net emissions"
)]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// TOML file overriding the standard emission factor table
    #[arg(long, env = "CARBONLEDGER_FACTORS", global = true)]
    factors: Option<PathBuf>,

    /// Number of rayon worker threads (defaults to all logical cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 5001)]
        port: u16,
        /// HS256 secret used to verify bearer tokens
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
        /// Allowed CORS origin (any origin when unset)
        #[arg(long, env = "CORS_ORIGIN")]
        cors_origin: Option<String>,
    },
    /// Print a user's aggregate emissions from the database
    Calculate {
        #[arg(long)]
        user_id: i64,
    },
    /// Print a user's per-record emission history from the database
    History {
        #[arg(long)]
        user_id: i64,
    },
    /// Compute from JSON files without a database
    Offline {
        /// JSON array of activity records
        #[arg(long)]
        records: PathBuf,
        /// JSON array of carbon sinks
        #[arg(long)]
        sinks: Option<PathBuf>,
        /// Print per-record history instead of the aggregate
        #[arg(long)]
        history: bool,
    },
    /// Print the effective factor table as TOML
    Factors,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for containers, human-readable on stderr otherwise
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    cli::configure_rayon(cli.threads);
    let factors = cli::load_factors(cli.factors.as_deref())?;

    match &cli.command {
        Commands::Serve {
            port,
            jwt_secret,
            cors_origin,
        } => cli::run_serve(&cli, factors, *port, jwt_secret, cors_origin.as_deref()),
        Commands::Calculate { user_id } => cli::run_calculate(&cli, &factors, *user_id),
        Commands::History { user_id } => cli::run_history(&cli, &factors, *user_id),
        Commands::Offline {
            records,
            sinks,
            history,
        } => cli::run_offline(&factors, records, sinks.as_deref(), *history),
        Commands::Factors => cli::run_factors(&factors),
    }
}
