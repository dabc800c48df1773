//! Error types for the migration system.

use std::path::PathBuf;

/// Broad classification of a [`MigrateError`].
///
/// Callers use this to decide how a failure is reported; none of the kinds
/// are retried automatically. Rerunning the command is the retry mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid paths, aliases or settings. Needs operator action.
    Configuration,
    /// Reading migration files or removing database files failed.
    Io,
    /// A database connection could not be opened.
    Connection,
    /// The ledger table could not be read or written.
    Ledger,
    /// A migration or administrative statement failed.
    Execution,
    /// The run was interrupted between two migrations or two databases.
    Cancelled,
    /// Several independent databases failed.
    Multiple,
}

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The migrations root path was empty.
    #[error("Migrations directory path is not set")]
    MissingMigrationsPath,

    /// The migrations root could not be listed.
    #[error("Failed to read migrations directory '{path}': {source}")]
    ReadMigrationsDir {
        /// Root path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The migrations root holds no database directories.
    #[error("Migrations directory '{0}' has no database directories")]
    EmptyDirectory(PathBuf),

    /// No database is registered under the alias.
    #[error("Database '{alias}' is not registered in database settings")]
    DatabaseNotFound {
        /// Alias or database name that was looked up.
        alias: String,
    },

    /// The `shards` group was targeted but no shard databases are registered.
    #[error("No shard databases are registered in database settings")]
    NoShards,

    /// A settings file could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    ReadSettings {
        /// Settings file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A settings file is not valid JSON for its schema.
    #[error("Invalid settings file '{path}': {source}")]
    InvalidSettings {
        /// Settings file path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A connection URL could not be built from a database spec.
    #[error("Invalid connection settings for '{database}': {message}")]
    InvalidConnectionUrl {
        /// Physical database name.
        database: String,
        /// What was wrong.
        message: String,
    },

    /// A migration file could not be read.
    #[error("Failed to read migration '{path}': {source}")]
    ReadMigration {
        /// Migration file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file-backed database could not be removed.
    #[error("Failed to remove database file '{path}': {source}")]
    RemoveDatabaseFile {
        /// Database file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Opening a connection failed.
    #[error("Failed to connect to database '{database}': {source}")]
    Connection {
        /// Physical database name.
        database: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The applied-migrations table could not be read.
    #[error("Migration ledger of '{database}' is unavailable (was the database initialized?): {source}")]
    LedgerUnavailable {
        /// Physical database name.
        database: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Recording an applied migration failed.
    #[error("Failed to record migration '{migration}' in ledger of '{database}': {source}")]
    LedgerWrite {
        /// Physical database name.
        database: String,
        /// Migration file name.
        migration: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// A migration's SQL failed, or its transaction could not be opened or committed.
    #[error("Migration '{migration}' failed on '{database}': {source}")]
    Execution {
        /// Physical database name.
        database: String,
        /// Migration file name.
        migration: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// An administrative statement (create/drop) failed.
    #[error("Failed to {operation} on '{database}': {source}")]
    Lifecycle {
        /// Physical database name.
        database: String,
        /// Short description, e.g. "create database".
        operation: &'static str,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The run was cancelled before work on this database finished.
    #[error("Run cancelled before finishing '{database}'")]
    Cancelled {
        /// Physical database name.
        database: String,
    },

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<MigrateError>),
}

impl MigrateError {
    /// Returns the error's classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingMigrationsPath
            | Self::ReadMigrationsDir { .. }
            | Self::EmptyDirectory(_)
            | Self::DatabaseNotFound { .. }
            | Self::NoShards
            | Self::ReadSettings { .. }
            | Self::InvalidSettings { .. }
            | Self::InvalidConnectionUrl { .. } => ErrorKind::Configuration,
            Self::ReadMigration { .. } | Self::RemoveDatabaseFile { .. } => ErrorKind::Io,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::LedgerUnavailable { .. } | Self::LedgerWrite { .. } => ErrorKind::Ledger,
            Self::Execution { .. } | Self::Lifecycle { .. } => ErrorKind::Execution,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Multiple(_) => ErrorKind::Multiple,
        }
    }

    /// Folds independent failures into one error.
    ///
    /// Returns `None` for an empty list and the error itself when there is
    /// only one.
    #[must_use]
    pub fn collect(mut errors: Vec<MigrateError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
