//! Migration applier.
//!
//! This module applies a [`MigrationSet`] to one physical database. Each
//! migration runs in its own transaction together with its ledger record,
//! so a migration is either fully applied and recorded or not at all.
//! A failure stops the remaining migrations for that database only; the
//! ones committed before it stay applied.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::AnyConnection;
use sqlx::Connection;
use tracing::{debug, info, warn};

use crate::connection;
use crate::dialect::{self, MigrationDialect};
use crate::error::{MigrateError, Result};
use crate::ledger::Ledger;
use crate::resolver::Target;
use crate::source::{MigrationFile, MigrationSet};

/// Shared flag asking running work to stop at the next migration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of applying a set to one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Registry alias of the database.
    pub alias: String,
    /// Physical database name.
    pub database: String,
    /// Migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// Migrations skipped because the ledger already had them.
    pub already_applied: usize,
}

/// Outstanding work for one database, computed without executing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Registry alias of the database.
    pub alias: String,
    /// Physical database name.
    pub database: String,
    /// Number of the set's migrations already in the ledger.
    pub already_applied: usize,
    /// Outstanding migrations in apply order.
    pub outstanding: Vec<String>,
}

/// Names in `files` that are not in `applied`, in discovery order.
#[must_use]
pub fn outstanding(files: &[String], applied: &HashSet<String>) -> Vec<String> {
    files
        .iter()
        .filter(|name| !applied.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Sorts migrations into apply order: byte-wise lexical order of file names.
pub fn sort_migrations(migrations: &mut [MigrationFile]) {
    migrations.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Callback run after each migration commits, with the database and migration names.
pub type AppliedHook = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Applies migration sets to single databases.
#[derive(Clone, Default)]
pub struct MigrationApplier {
    cancel: CancelFlag,
    on_applied: Option<AppliedHook>,
}

impl fmt::Debug for MigrationApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationApplier")
            .field("cancel", &self.cancel)
            .field("on_applied", &self.on_applied.is_some())
            .finish()
    }
}

impl MigrationApplier {
    /// Creates a new applier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `cancel` to stop between migrations.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs `hook` after each migration is committed.
    #[must_use]
    pub fn on_applied(mut self, hook: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_applied = Some(Arc::new(hook));
        self
    }

    /// Applies the outstanding migrations of `set` to `target`.
    ///
    /// The connection is opened here and closed on every exit path.
    pub async fn apply(&self, target: Target<'_>, set: &MigrationSet) -> Result<ApplyReport> {
        info!(alias = %target.alias, database = %target.spec.name, set = %set.alias, "Applying migrations");

        let mut conn = connection::connect(target.spec).await?;
        let result = self.apply_with(&mut conn, target, set).await;
        connection::close(conn, &target.spec.name).await;

        if let Ok(report) = &result {
            info!(
                alias = %report.alias,
                database = %report.database,
                applied = report.applied.len(),
                already_applied = report.already_applied,
                "Migrations applied"
            );
        }
        result
    }

    /// Computes what [`Self::apply`] would do without executing anything.
    pub async fn plan(&self, target: Target<'_>, set: &MigrationSet) -> Result<MigrationPlan> {
        let mut conn = connection::connect(target.spec).await?;
        let result = Self::plan_with(&mut conn, target, set).await;
        connection::close(conn, &target.spec.name).await;
        result
    }

    async fn plan_with(
        conn: &mut AnyConnection,
        target: Target<'_>,
        set: &MigrationSet,
    ) -> Result<MigrationPlan> {
        let dialect = dialect::for_driver(target.spec.driver);
        let ledger = Ledger::new(dialect, &target.spec.name);
        let applied = ledger.applied(conn).await?;

        let mut pending = outstanding(&set.files, &applied);
        pending.sort();

        Ok(MigrationPlan {
            alias: target.alias.to_string(),
            database: target.spec.name.clone(),
            already_applied: set.files.len() - pending.len(),
            outstanding: pending,
        })
    }

    async fn apply_with(
        &self,
        conn: &mut AnyConnection,
        target: Target<'_>,
        set: &MigrationSet,
    ) -> Result<ApplyReport> {
        let database = target.spec.name.as_str();
        let dialect = dialect::for_driver(target.spec.driver);
        let ledger = Ledger::new(dialect, database);

        let applied = ledger.applied(conn).await?;
        let pending = outstanding(&set.files, &applied);
        debug!(database = %database, outstanding = pending.len(), "Computed outstanding migrations");

        let mut migrations = set.load(&pending)?;
        sort_migrations(&mut migrations);

        let mut report = ApplyReport {
            alias: target.alias.to_string(),
            database: database.to_string(),
            applied: Vec::with_capacity(migrations.len()),
            already_applied: set.files.len() - pending.len(),
        };

        for migration in &migrations {
            if self.cancel.is_cancelled() {
                warn!(database = %database, next = %migration.name, "Cancellation requested, stopping before next migration");
                return Err(MigrateError::Cancelled {
                    database: database.to_string(),
                });
            }

            Self::apply_one(conn, &ledger, dialect, database, migration).await?;
            report.applied.push(migration.name.clone());
            if let Some(hook) = &self.on_applied {
                hook(database, &migration.name);
            }
        }

        Ok(report)
    }

    /// Applies a single migration inside its own transaction.
    async fn apply_one(
        conn: &mut AnyConnection,
        ledger: &Ledger<'_>,
        dialect: &dyn MigrationDialect,
        database: &str,
        migration: &MigrationFile,
    ) -> Result<()> {
        info!(database = %database, migration = %migration.name, "Applying migration");
        debug!(dialect = dialect.name(), sql = %migration.content, "Executing SQL");

        let execution_err = |source| MigrateError::Execution {
            database: database.to_string(),
            migration: migration.name.clone(),
            source,
        };

        let mut tx = conn.begin().await.map_err(execution_err)?;

        let outcome = match sqlx::raw_sql(&migration.content).execute(&mut *tx).await {
            Ok(_) => ledger.record(&mut tx, &migration.name).await,
            Err(source) => Err(execution_err(source)),
        };

        if let Err(err) = outcome {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    database = %database,
                    migration = %migration.name,
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            return Err(err);
        }

        tx.commit().await.map_err(execution_err)?;

        info!(database = %database, migration = %migration.name, "Migration applied successfully");
        Ok(())
    }
}
