//! Status command - show ledger status and currency totals

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table};

use super::get_context;
use crate::output::{self, create_table, money_cell};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        output::json(&status)?;
        return Ok(());
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Transfers", &status.total_transfers.to_string()]);
    table.add_row(vec!["Entries", &status.total_entries.to_string()]);
    println!("{}", table);
    println!();

    if status.currencies.is_empty() {
        return Ok(());
    }

    println!("{}", "Totals by Currency".bold());
    let mut totals = create_table(&["Currency", "Accounts", "Balance"]);
    for total in &status.currencies {
        totals.add_row(vec![
            Cell::new(&total.currency),
            Cell::new(total.accounts),
            money_cell(total.balance),
        ]);
    }
    println!("{}", totals);
    Ok(())
}
