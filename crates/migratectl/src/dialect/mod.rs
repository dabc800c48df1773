//! Database dialect implementations.
//!
//! Each dialect knows the engine-specific SQL for the ledger table and for
//! the administrative create/drop statements. Migration files themselves
//! are executed verbatim and never pass through a dialect.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::config::DriverKind;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "schema_migrations";

/// Name of the ledger table's single column.
pub const LEDGER_COLUMN: &str = "migration";

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table name, database name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Bind placeholder for the `index`-th (1-based) parameter.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Idempotent DDL for the ledger table.
    fn create_ledger_table_sql(&self) -> String;

    /// Query listing every applied migration name.
    fn select_applied_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}",
            self.quote_identifier(LEDGER_COLUMN),
            self.quote_identifier(LEDGER_TABLE)
        )
    }

    /// Insert of one applied migration name, bound as the first parameter.
    fn insert_applied_sql(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(LEDGER_TABLE),
            self.quote_identifier(LEDGER_COLUMN),
            self.placeholder(1)
        )
    }

    /// Query returning a row when the database named by the first parameter
    /// exists. `None` when [`Self::create_database_sql`] is already idempotent.
    fn database_exists_sql(&self) -> Option<String> {
        None
    }

    /// Statement creating a database. `None` for file-based engines.
    fn create_database_sql(&self, name: &str) -> Option<String>;

    /// Statement dropping a database if it exists. `None` for file-based engines.
    fn drop_database_sql(&self, name: &str) -> Option<String> {
        Some(format!(
            "DROP DATABASE IF EXISTS {}",
            self.quote_identifier(name)
        ))
    }

    /// Statement dropping a table if it exists.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }
}

/// Returns the dialect for a driver kind.
#[must_use]
pub fn for_driver(driver: DriverKind) -> &'static dyn MigrationDialect {
    static MYSQL: MySqlDialect = MySqlDialect::new();
    static POSTGRES: PostgresDialect = PostgresDialect::new();
    static SQLITE: SqliteDialect = SqliteDialect::new();

    match driver {
        DriverKind::Mysql => &MYSQL,
        DriverKind::Postgres => &POSTGRES,
        DriverKind::Sqlite => &SQLITE,
    }
}
