//! Config command - inspect and change settings.json

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tally_core::config::{Config, OverdraftPolicy};

use super::get_tally_dir;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the overdraft policy in settings.json
    Overdraft {
        #[arg(value_enum)]
        policy: PolicyArg,
    },
}

impl ConfigCommands {
    pub fn json(&self) -> bool {
        matches!(self, ConfigCommands::Show { json: true })
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Allow,
    Reject,
}

impl From<PolicyArg> for OverdraftPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Allow => OverdraftPolicy::Allow,
            PolicyArg::Reject => OverdraftPolicy::Reject,
        }
    }
}

#[derive(Serialize)]
struct ConfigView {
    tally_dir: PathBuf,
    overdraft_policy: OverdraftPolicy,
    database_file: String,
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let tally_dir = get_tally_dir()?;

    match command {
        ConfigCommands::Show { json } => {
            let config = Config::load(&tally_dir)?;
            let view = ConfigView {
                tally_dir,
                overdraft_policy: config.overdraft_policy,
                database_file: config.database_file,
            };
            if json {
                return output::json(&view);
            }
            println!("  Directory:  {}", view.tally_dir.display());
            println!("  Database:   {}", view.database_file);
            println!("  Overdraft:  {}", policy_name(view.overdraft_policy));
            Ok(())
        }
        ConfigCommands::Overdraft { policy } => {
            let policy = OverdraftPolicy::from(policy);
            set_overdraft(&tally_dir, policy)?;
            println!("Overdraft policy set to {}", policy_name(policy).green());
            if std::env::var_os("TALLY_OVERDRAFT").is_some() {
                output::warning("TALLY_OVERDRAFT is set and takes precedence over settings.json");
            }
            Ok(())
        }
    }
}

fn set_overdraft(tally_dir: &Path, policy: OverdraftPolicy) -> Result<()> {
    std::fs::create_dir_all(tally_dir)?;
    let mut config = Config::load(tally_dir)?;
    config.overdraft_policy = policy;
    config.save(tally_dir)?;
    Ok(())
}

fn policy_name(policy: OverdraftPolicy) -> &'static str {
    match policy {
        OverdraftPolicy::Allow => "allow",
        OverdraftPolicy::Reject => "reject",
    }
}
