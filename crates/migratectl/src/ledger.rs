//! Migration ledger.
//!
//! This module manages the `schema_migrations` table that records which
//! migrations have been applied to one physical database. The table is
//! append-only: names are inserted inside the migration's own transaction
//! and never updated or deleted.

use std::collections::HashSet;

use sqlx::AnyConnection;
use tracing::debug;

use crate::dialect::{MigrationDialect, LEDGER_TABLE};
use crate::error::{MigrateError, Result};

/// Ledger access for one physical database.
pub struct Ledger<'a> {
    dialect: &'a dyn MigrationDialect,
    database: &'a str,
}

impl<'a> Ledger<'a> {
    /// Creates a ledger handle for `database` using `dialect`'s SQL.
    pub fn new(dialect: &'a dyn MigrationDialect, database: &'a str) -> Self {
        Self { dialect, database }
    }

    /// Ensures the ledger table exists.
    pub async fn ensure_table(&self, conn: &mut AnyConnection) -> Result<()> {
        let sql = self.dialect.create_ledger_table_sql();
        debug!(database = %self.database, sql = %sql, "Ensuring ledger table");

        sqlx::query(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|source| MigrateError::Lifecycle {
                database: self.database.to_string(),
                operation: "create ledger table",
                source,
            })?;
        Ok(())
    }

    /// Gets the set of applied migration names.
    ///
    /// Fails with [`MigrateError::LedgerUnavailable`] when the table is
    /// missing, i.e. the database was never initialized.
    pub async fn applied(&self, conn: &mut AnyConnection) -> Result<HashSet<String>> {
        debug!(database = %self.database, table = LEDGER_TABLE, "Loading applied migrations");

        let names: Vec<String> = sqlx::query_scalar(&self.dialect.select_applied_sql())
            .fetch_all(&mut *conn)
            .await
            .map_err(|source| MigrateError::LedgerUnavailable {
                database: self.database.to_string(),
                source,
            })?;

        debug!(database = %self.database, count = names.len(), "Loaded applied migrations");
        Ok(names.into_iter().collect())
    }

    /// Records a migration as applied.
    ///
    /// `conn` must be the migration's open transaction so the record commits
    /// or rolls back together with the migration.
    pub async fn record(&self, conn: &mut AnyConnection, migration: &str) -> Result<()> {
        sqlx::query(&self.dialect.insert_applied_sql())
            .bind(migration)
            .execute(&mut *conn)
            .await
            .map_err(|source| MigrateError::LedgerWrite {
                database: self.database.to_string(),
                migration: migration.to_string(),
                source,
            })?;
        Ok(())
    }
}
