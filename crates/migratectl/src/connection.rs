//! Opening and closing database connections.
//!
//! Every spec is reached through sqlx's `Any` driver so one code path serves
//! MySQL, PostgreSQL and SQLite; the URL scheme picks the backend.

use sqlx::any::install_default_drivers;
use sqlx::AnyConnection;
use sqlx::Connection;
use tracing::{debug, warn};

use crate::config::DatabaseSpec;
use crate::error::{MigrateError, Result};

/// Opens a connection to the database described by `spec`.
pub async fn connect(spec: &DatabaseSpec) -> Result<AnyConnection> {
    open(spec, &spec.database_url()?).await
}

/// Opens a connection suitable for creating or dropping `spec`'s database.
///
/// See [`DatabaseSpec::admin_url`].
pub async fn connect_admin(spec: &DatabaseSpec) -> Result<AnyConnection> {
    open(spec, &spec.admin_url()?).await
}

async fn open(spec: &DatabaseSpec, url: &str) -> Result<AnyConnection> {
    install_default_drivers();
    debug!(target_db = %spec.describe(), "Opening connection");

    AnyConnection::connect(url)
        .await
        .map_err(|source| MigrateError::Connection {
            database: spec.name.clone(),
            source,
        })
}

/// Closes a connection, logging instead of failing when the close itself errors.
pub async fn close(conn: AnyConnection, database: &str) {
    if let Err(err) = conn.close().await {
        warn!(database = %database, error = %err, "Failed to close connection cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_missing_sqlite_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DatabaseSpec::sqlite(dir.path().join("absent.db"));

        let result = connect(&spec).await;
        assert!(matches!(result, Err(MigrateError::Connection { .. })));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[tokio::test]
    async fn test_connect_admin_creates_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DatabaseSpec::sqlite(dir.path().join("fresh.db"));

        let conn = connect_admin(&spec).await.unwrap();
        close(conn, &spec.name).await;
        assert!(dir.path().join("fresh.db").exists());

        let conn = connect(&spec).await.unwrap();
        close(conn, &spec.name).await;
    }

    #[tokio::test]
    async fn test_sqlite_file_name_with_url_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd?name#1%.db");
        let spec = DatabaseSpec::sqlite(&path);

        let conn = connect_admin(&spec).await.unwrap();
        close(conn, &spec.name).await;
        assert!(path.exists());
        assert!(!dir.path().join("odd").exists());
    }
}
