//! Tally CLI - double-entry ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{account, config, demo, history, status, stress, transfer};
use tally_core::logging::{self, LogFormat};

/// Tally - double-entry ledger in your terminal
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account ID
        #[arg(long)]
        from: i64,
        /// Destination account ID
        #[arg(long)]
        to: i64,
        /// Amount in major units, e.g. 12.34
        #[arg(long)]
        amount: String,
        /// Currency both accounts must hold
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List transfers
    History {
        /// Only transfers out of this account
        #[arg(long)]
        from: Option<i64>,
        /// Only transfers into this account
        #[arg(long)]
        to: Option<i64>,
        /// Maximum number of transfers
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Number of transfers to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show ledger status and currency totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect and change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// Seed demo data
    Demo {
        #[command(subcommand)]
        command: demo::DemoCommands,
    },

    /// Run random concurrent transfers and verify the ledger afterwards
    Stress {
        /// Accounts to create for the run
        #[arg(long, default_value_t = 10)]
        accounts: usize,
        /// Total transfers to execute
        #[arg(long, default_value_t = 1000)]
        transfers: usize,
        /// Worker threads
        #[arg(long, default_value_t = 8)]
        threads: usize,
        /// Run against a throwaway in-memory ledger
        #[arg(long)]
        memory: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Whether the command asked for machine-readable output
    fn json(&self) -> bool {
        match self {
            Commands::Account { command } => command.json(),
            Commands::Config { command } => command.json(),
            Commands::Demo { command } => command.json(),
            Commands::Transfer { json, .. }
            | Commands::History { json, .. }
            | Commands::Status { json }
            | Commands::Stress { json, .. } => *json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init(format);

    let json = cli.command.json();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = commands::exit_code(&e);
            if json {
                output::json_error(&e, commands::error_kind(&e), code);
            } else {
                output::error(&format!("{:#}", e));
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Account { command } => account::run(command),
        Commands::Transfer { from, to, amount, currency, json } => {
            transfer::run(from, to, &amount, &currency, json)
        }
        Commands::History { from, to, limit, offset, json } => {
            history::run(from, to, limit, offset, json)
        }
        Commands::Status { json } => status::run(json),
        Commands::Config { command } => config::run(command),
        Commands::Demo { command } => demo::run(command),
        Commands::Stress { accounts, transfers, threads, memory, json } => {
            stress::run(accounts, transfers, threads, memory, json)
        }
    }
}
