//! SQLite dialect.
//!
//! A SQLite database is a file, so there are no server-level create/drop
//! statements; the lifecycle layer creates and removes the file instead.

use super::{MigrationDialect, LEDGER_COLUMN, LEDGER_TABLE};

/// SQLite migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn create_ledger_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT NOT NULL PRIMARY KEY)",
            self.quote_identifier(LEDGER_TABLE),
            self.quote_identifier(LEDGER_COLUMN)
        )
    }

    fn create_database_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn drop_database_sql(&self, _name: &str) -> Option<String> {
        None
    }
}
