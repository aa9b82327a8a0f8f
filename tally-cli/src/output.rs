//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use comfy_table::{
    presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
};
use serde::Serialize;
use tally_core::domain::money::to_decimal;
use tally_core::{ErrorKind, OperationResult};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print `data` as a successful JSON result
pub fn json<T: Serialize>(data: T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
    Ok(())
}

/// Print a failed command as a JSON result on stdout
pub fn json_error(err: &anyhow::Error, kind: ErrorKind, exit_code: u8) {
    match serde_json::to_string_pretty(&failure(err, kind, exit_code)) {
        Ok(body) => println!("{}", body),
        Err(_) => error(&format!("{:#}", err)),
    }
}

fn failure(err: &anyhow::Error, kind: ErrorKind, exit_code: u8) -> OperationResult<()> {
    OperationResult::fail(format!("{:#}", err), kind)
        .with_context("exit_code", serde_json::json!(exit_code))
}

/// Create a styled table with bold headers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

/// Right-aligned money cell in major units
pub fn money_cell(minor_units: i64) -> Cell {
    let cell = Cell::new(to_decimal(minor_units)).set_alignment(CellAlignment::Right);
    if minor_units < 0 {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

/// Local-time rendering of a stored timestamp
pub fn format_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Error;

    #[test]
    fn test_failure_carries_kind_and_exit_code() {
        let err = anyhow::Error::new(Error::account_not_found(3)).context("Transfer failed");
        let value = serde_json::to_value(failure(&err, ErrorKind::NotFound, 3)).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Transfer failed: Not found: account 3");
        assert_eq!(value["error_kind"], "not_found");
        assert_eq!(value["context"]["exit_code"], 3);
    }
}
