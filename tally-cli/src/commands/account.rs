//! Account command - create and inspect accounts

use std::io::IsTerminal;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use comfy_table::Cell;
use dialoguer::Input;
use serde::Serialize;
use tally_core::domain::currency::is_supported_currency;
use tally_core::domain::money::format_amount;
use tally_core::ports::LedgerStore;
use tally_core::{Account, Entry, Error, NewAccount};

use super::{get_context, parse_amount};
use crate::output::{self, create_table, format_time, money_cell};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Account owner (prompted when omitted)
        #[arg(long)]
        owner: Option<String>,
        /// Opening balance in major units
        #[arg(long, default_value = "0")]
        balance: String,
        /// Currency code (USD, EUR, CAD)
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List accounts
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one account with its latest entries
    Show {
        /// Account ID
        id: i64,
        /// Number of entries to show
        #[arg(long, default_value_t = 20)]
        entries: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct AccountDetail {
    account: Account,
    entries: Vec<Entry>,
}

impl AccountCommands {
    pub fn json(&self) -> bool {
        match self {
            AccountCommands::Create { json, .. }
            | AccountCommands::List { json, .. }
            | AccountCommands::Show { json, .. } => *json,
        }
    }
}

pub fn run(command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::Create { owner, balance, currency, json } => {
            run_create(owner, &balance, &currency, json)
        }
        AccountCommands::List { limit, offset, json } => run_list(limit, offset, json),
        AccountCommands::Show { id, entries, json } => run_show(id, entries, json),
    }
}

fn run_create(owner: Option<String>, balance: &str, currency: &str, json: bool) -> Result<()> {
    let owner = match owner {
        Some(owner) => owner,
        None if std::io::stdin().is_terminal() => {
            Input::new().with_prompt("Owner").interact_text()?
        }
        None => bail!(Error::validation("--owner is required")),
    };

    let new_account = NewAccount::new(owner, parse_amount(balance)?, currency);
    if !is_supported_currency(&new_account.currency) {
        bail!(Error::validation(format!(
            "unsupported currency: {}",
            new_account.currency
        )));
    }

    let ctx = get_context()?;
    let account = ctx.store.create_account(&new_account)?;

    if json {
        output::json(&account)?;
    } else {
        output::success("Account created");
        println!("  ID:       {}", account.id);
        println!("  Owner:    {}", account.owner);
        println!("  Balance:  {}", format_amount(account.balance, &account.currency));
    }
    Ok(())
}

fn run_list(limit: usize, offset: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let accounts = ctx.store.list_accounts(limit, offset)?;

    if json {
        output::json(&accounts)?;
        return Ok(());
    }

    if accounts.is_empty() {
        output::warning("No accounts yet. Create one with 'tally account create'.");
        return Ok(());
    }

    let mut table = create_table(&["ID", "Owner", "Balance", "Currency", "Created"]);
    for account in &accounts {
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(&account.owner),
            money_cell(account.balance),
            Cell::new(&account.currency),
            Cell::new(format_time(&account.created_at)),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn run_show(id: i64, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let account = ctx
        .store
        .get_account(id)?
        .ok_or_else(|| Error::account_not_found(id))?;
    let entries = ctx.store.list_entries(id, limit, 0)?;

    if json {
        let detail = AccountDetail { account, entries };
        output::json(&detail)?;
        return Ok(());
    }

    println!("{}", format!("Account {}", account.id).bold());
    println!("  Owner:    {}", account.owner);
    println!("  Balance:  {}", format_amount(account.balance, &account.currency));
    println!("  Created:  {}", format_time(&account.created_at));
    println!();

    if entries.is_empty() {
        println!("No entries");
        return Ok(());
    }

    let mut table = create_table(&["Entry", "Amount", "Time"]);
    for entry in &entries {
        table.add_row(vec![
            Cell::new(entry.id),
            money_cell(entry.amount),
            Cell::new(format_time(&entry.created_at)),
        ]);
    }
    println!("{}", table);
    Ok(())
}
