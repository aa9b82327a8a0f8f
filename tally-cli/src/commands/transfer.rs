//! Transfer command - move money between two accounts

use anyhow::{Context, Result};
use tally_core::domain::money::format_amount;
use tally_core::TransferRequest;

use super::{get_context, parse_amount};
use crate::output;

pub fn run(from: i64, to: i64, amount: &str, currency: &str, json: bool) -> Result<()> {
    let amount = parse_amount(amount)?;
    let ctx = get_context()?;

    let request = TransferRequest::new(from, to, currency, amount);
    let result = ctx
        .transfer_service
        .submit(&request)
        .with_context(|| format!("Transfer from {} to {} failed", from, to))?;

    if json {
        output::json(&result)?;
        return Ok(());
    }

    output::success(&format!(
        "Transferred {} (transfer {})",
        format_amount(result.transfer.amount, &request.currency),
        result.transfer.id
    ));
    println!(
        "  From {}: {}",
        result.from_account.id,
        format_amount(result.from_account.balance, &result.from_account.currency)
    );
    println!(
        "  To   {}: {}",
        result.to_account.id,
        format_amount(result.to_account.balance, &result.to_account.currency)
    );
    if result.from_account.balance < 0 {
        output::warning(&format!("Account {} is overdrawn", result.from_account.id));
    }
    Ok(())
}
