//! # cantina: Operator CLI for Cantina POS
//!
//! Every subcommand prints one JSON document on stdout. Failures print
//! `{"code": ..., "message": ...}` on stderr and exit with status 1.
//! Logs go to stderr and are filtered with `RUST_LOG`.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()          EnvFilter, default "info,sqlx=warn"          │
//! │  2. Cli::parse()            clap                                         │
//! │  3. Settings::load()        defaults → cantina.toml → CANTINA_* → flags  │
//! │  4. Database::new()         pool + embedded migrations                   │
//! │  5. dispatch                commands::* → serde_json::Value              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//! ```bash
//! cantina migrate
//! cantina search-card "lucía"
//! cantina --operator cajero1 sell --card 5555-1234-5678-9012 --item EMP-01:2
//! cantina --operator cajero1 sell --item AGUA --pay cash --received 5000 --invoice boleta
//! cantina --operator familia001 recharge --card 5555123456789012 --amount 20000
//! cantina --operator admin invoice void BOL-000012 --reason "Error de carga"
//! cantina --operator admin report best-sellers --from 2026-03-01 --to 2026-03-31
//! ```

mod commands;
mod config;
mod error;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use cantina_db::Database;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::card::{CardCommand, RechargeArgs};
use commands::invoice::InvoiceCommand;
use commands::report::ReportKind;
use commands::sale::{CancelArgs, SellArgs};
use commands::{output, CommandResult, Session};
use config::Settings;
use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "cantina", version, about = "School cantina point of sale", long_about = None)]
struct Cli {
    /// Settings file (default: ./cantina.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides settings
    #[arg(long, global = true)]
    db: Option<String>,

    /// Cashier station code, overrides settings
    #[arg(long, global = true)]
    station: Option<String>,

    /// Acting operator (id or username), overrides settings
    #[arg(long, global = true)]
    operator: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply migrations and report schema status
    Migrate,
    /// Find active cards by number or holder name
    SearchCard {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Find available products by code or name
    SearchProduct {
        query: String,

        #[arg(long, default_value_t = 15)]
        limit: u32,
    },
    /// Ring up a sale
    Sell(SellArgs),
    /// Look up or cancel a sale
    #[command(subcommand)]
    Sale(SaleCommand),
    /// Top up a card balance
    Recharge(RechargeArgs),
    /// Card administration and history
    #[command(subcommand)]
    Card(CardCommand),
    /// Receipts and invoices
    #[command(subcommand)]
    Invoice(InvoiceCommand),
    /// Sales, consumption and stock reports
    #[command(subcommand)]
    Report(ReportKind),
}

#[derive(Subcommand, Debug)]
enum SaleCommand {
    /// Sale with its lines and payments
    Show {
        /// Sale id or sale number
        sale: String,
    },
    /// Cancel a paid sale: restock, refund the card, void the invoice (admin)
    Cancel(CancelArgs),
}

#[derive(Serialize)]
struct MigrateOutput {
    database: String,
    migrations_total: usize,
    migrations_applied: usize,
    healthy: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(value) => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &value).context("writing result")?;
            writeln!(stdout).context("writing result")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            debug!(code = ?err.code, "Command failed");
            eprintln!("{}", err.to_json());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> CommandResult {
    let mut settings = Settings::load(cli.config.as_ref())?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }
    if let Some(station) = cli.station {
        settings.station_code = station;
    }
    if cli.operator.is_some() {
        settings.operator = cli.operator;
    }

    let db = Database::new(settings.db_config()).await?;
    let session = Session { db, settings };

    match cli.command {
        Command::Migrate => migrate(&session).await,
        Command::SearchCard { query, limit } => {
            commands::search::search_card(&session, &query, limit).await
        }
        Command::SearchProduct { query, limit } => {
            commands::search::search_product(&session, &query, limit).await
        }
        Command::Sell(args) => commands::sale::sell(&session, args).await,
        Command::Sale(SaleCommand::Show { sale }) => commands::sale::show(&session, &sale).await,
        Command::Sale(SaleCommand::Cancel(args)) => commands::sale::cancel(&session, args).await,
        Command::Recharge(args) => commands::card::recharge(&session, args).await,
        Command::Card(command) => commands::card::run(&session, command).await,
        Command::Invoice(command) => commands::invoice::run(&session, command).await,
        Command::Report(kind) => commands::report::run(&session, kind).await,
    }
}

async fn migrate(session: &Session) -> Result<Value, CliError> {
    session.db.stations().ensure_builtin_methods().await?;
    let status = session.db.migration_status().await?;
    info!(
        applied = status.applied,
        total = status.total,
        "Schema is current"
    );

    output(&MigrateOutput {
        database: session.settings.database_path.clone(),
        migrations_total: status.total,
        migrations_applied: status.applied,
        healthy: session.db.health_check().await,
    })
}

/// Logs go to stderr so stdout stays machine readable.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=cantina_db=trace` - Trace the database layer only
/// - Default: INFO, sqlx at WARN
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
