//! History command - list transfers

use anyhow::Result;
use comfy_table::Cell;
use tally_core::ports::LedgerStore;
use tally_core::TransferFilter;

use super::get_context;
use crate::output::{self, create_table, format_time, money_cell};

pub fn run(
    from: Option<i64>,
    to: Option<i64>,
    limit: usize,
    offset: usize,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;

    let mut filter = TransferFilter::new(limit).offset(offset);
    if let Some(id) = from {
        filter = filter.from_account(id);
    }
    if let Some(id) = to {
        filter = filter.to_account(id);
    }
    let transfers = ctx.store.list_transfers(&filter)?;

    if json {
        output::json(&transfers)?;
        return Ok(());
    }

    if transfers.is_empty() {
        println!("No transfers");
        return Ok(());
    }

    let mut table = create_table(&["ID", "From", "To", "Amount", "Time"]);
    for transfer in &transfers {
        table.add_row(vec![
            Cell::new(transfer.id),
            Cell::new(transfer.from_account_id),
            Cell::new(transfer.to_account_id),
            money_cell(transfer.amount),
            Cell::new(format_time(&transfer.created_at)),
        ]);
    }
    println!("{}", table);
    Ok(())
}
