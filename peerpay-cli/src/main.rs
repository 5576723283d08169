//! Peerpay CLI - peer-to-peer balance transfers from your terminal

use std::process::ExitCode;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use peerpay_core::services::LoggingService;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{balance, history, logs, open, pay};

/// Peerpay - peer-to-peer balance ledger
#[derive(Parser)]
#[command(name = "pp", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account
    Open {
        /// Account identity (e.g. an email address)
        identity: String,
        /// Display name (defaults to the identity)
        #[arg(long)]
        name: Option<String>,
        /// Opening balance (defaults to the configured opening balance)
        #[arg(long)]
        balance: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money to a recipient handle
    Pay {
        /// Sender identity
        #[arg(long)]
        from: String,
        /// Recipient handle; internal accounts are credited, anything else is external
        #[arg(long)]
        to: String,
        /// Amount with at most two decimal places
        #[arg(long)]
        amount: String,
        /// Recipient display name (defaults to the handle)
        #[arg(long)]
        name: Option<String>,
        /// Output the gateway response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an account balance
    Balance {
        /// Account identity
        identity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transfers sent or received by an account
    History {
        /// Account identity
        identity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Open { .. } => "open",
            Commands::Pay { .. } => "pay",
            Commands::Balance { .. } => "balance",
            Commands::History { .. } => "history",
            Commands::Logs { .. } => "logs",
        }
    }
}

/// Diagnostics go to stderr, filtered by RUST_LOG (default `warn`)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let json = std::env::var("PEERPAY_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let logger = commands::get_logger();
    commands::log_command(&logger, cli.command.name());

    match run(cli, logger) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, logger: Option<Arc<LoggingService>>) -> Result<ExitCode> {
    match cli.command {
        Commands::Open {
            identity,
            name,
            balance,
            json,
        } => open::run(&identity, name.as_deref(), balance.as_deref(), json, &logger)?,
        Commands::Pay {
            from,
            to,
            amount,
            name,
            json,
        } => return pay::run(&from, &to, &amount, name, json, logger),
        Commands::Balance { identity, json } => balance::run(&identity, json)?,
        Commands::History { identity, json } => history::run(&identity, json)?,
        Commands::Logs { command } => logs::run(command, logger)?,
    }
    Ok(ExitCode::SUCCESS)
}
