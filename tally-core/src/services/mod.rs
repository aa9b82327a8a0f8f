//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod demo;
pub mod migration;
mod status;
mod transfer;

pub use demo::{random_currency, random_money, random_owner, DemoService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{CurrencyTotal, StatusService, StatusSummary};
pub use transfer::TransferService;
