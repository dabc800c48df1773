//! PostgreSQL dialect.

use super::{MigrationDialect, LEDGER_COLUMN, LEDGER_TABLE};

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn create_ledger_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) NOT NULL PRIMARY KEY)",
            self.quote_identifier(LEDGER_TABLE),
            self.quote_identifier(LEDGER_COLUMN)
        )
    }

    // CREATE DATABASE has no IF NOT EXISTS form.
    fn database_exists_sql(&self) -> Option<String> {
        Some(format!(
            "SELECT 1 FROM pg_database WHERE datname = {}",
            self.placeholder(1)
        ))
    }

    fn create_database_sql(&self, name: &str) -> Option<String> {
        Some(format!("CREATE DATABASE {}", self.quote_identifier(name)))
    }
}
