//! CLI command implementations

pub mod account;
pub mod config;
pub mod demo;
pub mod history;
pub mod status;
pub mod stress;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tally_core::{Error, ErrorKind, TallyContext};

/// Get the tally directory from environment or default
pub fn get_tally_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tally"))
        .ok_or_else(|| anyhow!("Could not find home directory; set TALLY_DIR"))
}

/// Get or create tally context
pub fn get_context() -> Result<TallyContext> {
    let tally_dir = get_tally_dir()?;
    TallyContext::new(&tally_dir)
        .with_context(|| format!("Failed to open ledger in {}", tally_dir.display()))
}

/// Kind of the first core error in the chain; anything else is internal
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map_or(ErrorKind::Internal, Error::kind)
}

/// Process exit code for a failed command
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match error_kind(err) {
        ErrorKind::InvalidArgument => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::InsufficientFunds => 4,
        ErrorKind::Internal => 1,
    }
}

/// Parse a major-unit amount from the command line into minor units
pub fn parse_amount(input: &str) -> Result<i64> {
    tally_core::domain::money::parse_minor_units(input)
        .ok_or_else(|| Error::validation(format!("invalid amount: {}", input)).into())
}
