//! Administrative database operations.
//!
//! Create and drop databases, create the ledger table and drop tables.
//! None of these are transactional; the create operations are idempotent.

use std::path::Path;

use sqlx::AnyConnection;
use tracing::{debug, info};

use crate::config::DatabaseSpec;
use crate::connection;
use crate::dialect;
use crate::error::{MigrateError, Result};
use crate::ledger::Ledger;

/// Creates the database described by `spec` unless it already exists.
pub async fn create_database(spec: &DatabaseSpec) -> Result<()> {
    info!(target_db = %spec.describe(), "Creating database if absent");

    // File-based engines create the file on the admin connection.
    let mut conn = connection::connect_admin(spec).await?;
    let result = create_with(&mut conn, spec).await;
    connection::close(conn, &spec.name).await;
    result
}

async fn create_with(conn: &mut AnyConnection, spec: &DatabaseSpec) -> Result<()> {
    let dialect = dialect::for_driver(spec.driver);
    let Some(create_sql) = dialect.create_database_sql(&spec.name) else {
        return Ok(());
    };

    if let Some(exists_sql) = dialect.database_exists_sql() {
        let exists = sqlx::query(&exists_sql)
            .bind(spec.name.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|source| lifecycle_err(spec, "check database existence", source))?;
        if exists.is_some() {
            debug!(database = %spec.name, "Database already exists");
            return Ok(());
        }
    }

    sqlx::query(&create_sql)
        .execute(&mut *conn)
        .await
        .map_err(|source| lifecycle_err(spec, "create database", source))?;
    info!(database = %spec.name, "Database created");
    Ok(())
}

/// Creates the ledger table in `spec`'s database unless it already exists.
pub async fn create_ledger_table(spec: &DatabaseSpec) -> Result<()> {
    let dialect = dialect::for_driver(spec.driver);
    let mut conn = connection::connect(spec).await?;
    let result = Ledger::new(dialect, &spec.name).ensure_table(&mut conn).await;
    connection::close(conn, &spec.name).await;
    result
}

/// Drops the database described by `spec` if it exists.
pub async fn drop_database(spec: &DatabaseSpec) -> Result<()> {
    info!(target_db = %spec.describe(), "Dropping database");
    let dialect = dialect::for_driver(spec.driver);

    let Some(drop_sql) = dialect.drop_database_sql(&spec.name) else {
        return remove_database_file(Path::new(&spec.name)).await;
    };

    let mut conn = connection::connect_admin(spec).await?;
    let result = sqlx::query(&drop_sql)
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(|source| lifecycle_err(spec, "drop database", source));
    connection::close(conn, &spec.name).await;

    if result.is_ok() {
        info!(database = %spec.name, "Database dropped");
    }
    result
}

/// Drops `table` from `spec`'s database if it exists.
pub async fn drop_table(spec: &DatabaseSpec, table: &str) -> Result<()> {
    info!(target_db = %spec.describe(), table = %table, "Dropping table");
    let dialect = dialect::for_driver(spec.driver);

    let mut conn = connection::connect(spec).await?;
    let result = sqlx::query(&dialect.drop_table_sql(table))
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(|source| lifecycle_err(spec, "drop table", source));
    connection::close(conn, &spec.name).await;
    result
}

async fn remove_database_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "Database file removed");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Database file already absent");
            Ok(())
        }
        Err(source) => Err(MigrateError::RemoveDatabaseFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn lifecycle_err(spec: &DatabaseSpec, operation: &'static str, source: sqlx::Error) -> MigrateError {
    MigrateError::Lifecycle {
        database: spec.name.clone(),
        operation,
        source,
    }
}
