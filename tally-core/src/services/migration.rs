//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each applied migration
//! is recorded in sys_migrations so re-running is a no-op.

use duckdb::Connection;
use tracing::{debug, info, warn};

use crate::domain::result::Result;
use crate::migrations::MIGRATIONS;

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Service for managing database migrations
pub struct MigrationService<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Apply every pending migration in order.
    ///
    /// The bootstrap migration runs first when sys_migrations is missing.
    /// Each migration and its bookkeeping row are applied in one transaction.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let bootstrapped = !self.migrations_table_exists()?;
        let applied_before = if bootstrapped {
            Vec::new()
        } else {
            self.get_applied()?
        };

        let mut newly_applied = Vec::new();
        for (name, sql) in MIGRATIONS.iter() {
            if applied_before.iter().any(|applied| applied == name) {
                continue;
            }
            self.apply(name, sql)?;
            newly_applied.push(name.to_string());
        }

        if !newly_applied.is_empty() {
            info!(applied = ?newly_applied, "applied database migrations");
        }

        Ok(MigrationResult {
            applied: newly_applied,
            already_applied: applied_before.len(),
        })
    }

    fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        debug!(migration = name, "applying migration");
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let outcome = self.conn.execute_batch(sql).and_then(|_| {
            self.conn
                .execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
                .map(|_| ())
        });
        match outcome {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    warn!(migration = name, error = %rollback_err, "migration rollback failed");
                }
                Err(e.into())
            }
        }
    }

    fn migrations_table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
