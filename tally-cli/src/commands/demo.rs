//! Demo command - seed sample accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Create random accounts
    Seed {
        /// Number of accounts to create
        #[arg(default_value_t = 10)]
        count: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl DemoCommands {
    pub fn json(&self) -> bool {
        match self {
            DemoCommands::Seed { json, .. } => *json,
        }
    }
}

pub fn run(command: DemoCommands) -> Result<()> {
    match command {
        DemoCommands::Seed { count, json } => {
            let ctx = get_context()?;
            let accounts = ctx.demo_service.seed(count)?;
            if json {
                output::json(&accounts)?;
            } else {
                println!("{}", format!("Created {} demo accounts", accounts.len()).green());
                println!("Run 'tally account list' to see them.");
            }
            Ok(())
        }
    }
}
