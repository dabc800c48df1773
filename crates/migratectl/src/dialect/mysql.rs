//! MySQL dialect.
//!
//! MySQL commits DDL implicitly, so a migration made of DDL statements is
//! only as atomic as the engine allows; the ledger insert still shares the
//! migration's transaction.

use super::{MigrationDialect, LEDGER_COLUMN, LEDGER_TABLE};

/// MySQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn create_ledger_table_sql(&self) -> String {
        let column = self.quote_identifier(LEDGER_COLUMN);
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({column} VARCHAR(255) NOT NULL DEFAULT '', PRIMARY KEY ({column})) ENGINE=InnoDB",
            self.quote_identifier(LEDGER_TABLE)
        )
    }

    fn create_database_sql(&self, name: &str) -> Option<String> {
        Some(format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            self.quote_identifier(name)
        ))
    }
}
