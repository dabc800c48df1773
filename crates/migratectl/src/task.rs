//! Tasks run against the whole database fleet.
//!
//! A [`Task`] is one operator command. Every task runs against a shared
//! [`Context`] holding the resolved settings, the database registry and the
//! cancellation flag.

use std::path::Path;

use tracing::{error, info, warn};

use crate::applier::{ApplyReport, CancelFlag, MigrationApplier, MigrationPlan};
use crate::config::{DatabaseRegistry, Settings};
use crate::error::{MigrateError, Result};
use crate::lifecycle;
use crate::resolver::{self, Target};
use crate::source;

/// Resolved settings shared by every task.
#[derive(Debug, Clone)]
pub struct Context {
    /// Top-level settings.
    pub settings: Settings,
    /// Registered databases.
    pub registry: DatabaseRegistry,
    /// Stops runs between migrations and between databases when set.
    pub cancel: CancelFlag,
}

impl Context {
    /// Creates a context from already loaded settings and registry.
    #[must_use]
    pub fn new(settings: Settings, registry: DatabaseRegistry) -> Self {
        Self {
            settings,
            registry,
            cancel: CancelFlag::new(),
        }
    }

    /// Loads the settings file and the registry it points at.
    pub fn load(settings_path: impl AsRef<Path>) -> Result<Self> {
        let settings = Settings::load(settings_path)?;
        let registry = DatabaseRegistry::load(&settings.db_settings_path)?;
        Ok(Self::new(settings, registry))
    }

    /// Replaces the cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fails with [`MigrateError::Cancelled`] once cancellation was requested.
    fn ensure_not_cancelled(&self, database: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            warn!(database = %database, "Cancellation requested, not starting further databases");
            return Err(MigrateError::Cancelled {
                database: database.to_string(),
            });
        }
        Ok(())
    }

    fn applier(&self) -> MigrationApplier {
        MigrationApplier::new().with_cancel(self.cancel.clone())
    }
}

/// An operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Create every database and its ledger table, then migrate.
    Init,
    /// Apply outstanding migrations everywhere.
    Migrate,
    /// Drop one database, or every shard for `shards`.
    Drop {
        /// Alias, physical name, or `shards`.
        database: String,
    },
    /// Drop every registered database.
    DropAll,
    /// Drop one table from one database, or from every shard for `shards`.
    DropTable {
        /// Alias, physical name, or `shards`.
        database: String,
        /// Table to drop.
        table: String,
    },
}

impl Task {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Migrate => "migrate",
            Self::Drop { .. } => "drop",
            Self::DropAll => "drop-all",
            Self::DropTable { .. } => "drop-table",
        }
    }

    /// Runs the task.
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        info!(task = self.name(), "Running task");
        match self {
            Self::Init => {
                create_databases(ctx).await?;
                create_ledger_tables(ctx).await?;
                migrate(ctx).await?;
            }
            Self::Migrate => {
                migrate(ctx).await?;
            }
            Self::Drop { database } => drop_databases(ctx, database).await?,
            Self::DropAll => drop_all(ctx).await?,
            Self::DropTable { database, table } => {
                drop_tables(ctx, database, table).await?;
            }
        }
        info!(task = self.name(), "Task finished");
        Ok(())
    }
}

/// Creates every registered database, stopping at the first failure.
pub async fn create_databases(ctx: &Context) -> Result<()> {
    for (_, spec) in ctx.registry.iter() {
        ctx.ensure_not_cancelled(&spec.name)?;
        lifecycle::create_database(spec).await?;
    }
    Ok(())
}

/// Creates the ledger table in every registered database, stopping at the first failure.
pub async fn create_ledger_tables(ctx: &Context) -> Result<()> {
    for (_, spec) in ctx.registry.iter() {
        ctx.ensure_not_cancelled(&spec.name)?;
        lifecycle::create_ledger_table(spec).await?;
    }
    Ok(())
}

/// Applies every discovered migration set to its databases.
///
/// A failing database does not stop the others: every target is attempted
/// and the failures are returned together.
pub async fn migrate(ctx: &Context) -> Result<Vec<ApplyReport>> {
    let sets = source::discover(&ctx.settings.db_migrations_path)?;
    let applier = ctx.applier();

    let mut reports = Vec::new();
    let mut errors = Vec::new();

    'sets: for set in &sets {
        let targets = match resolver::resolve(&set.alias, &ctx.registry) {
            Ok(targets) => targets,
            Err(err) => {
                error!(set = %set.alias, error = %err, "Cannot resolve migration set");
                errors.push(err);
                continue;
            }
        };

        for target in targets {
            if let Err(err) = ctx.ensure_not_cancelled(&target.spec.name) {
                errors.push(err);
                break 'sets;
            }

            match applier.apply(target, set).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(alias = %target.alias, error = %err, "Migrations failed");
                    errors.push(err);
                }
            }
        }
    }

    let applied: usize = reports.iter().map(|r| r.applied.len()).sum();
    info!(databases = reports.len(), applied, failed = errors.len(), "Migration run finished");

    match MigrateError::collect(errors) {
        Some(err) => Err(err),
        None => Ok(reports),
    }
}

/// Computes the outstanding migrations of every database without applying them.
pub async fn status(ctx: &Context) -> Result<Vec<MigrationPlan>> {
    let sets = source::discover(&ctx.settings.db_migrations_path)?;
    let applier = ctx.applier();

    let mut plans = Vec::new();
    let mut errors = Vec::new();
    for set in &sets {
        let targets = match resolver::resolve(&set.alias, &ctx.registry) {
            Ok(targets) => targets,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        for target in targets {
            match applier.plan(target, set).await {
                Ok(plan) => plans.push(plan),
                Err(err) => errors.push(err),
            }
        }
    }

    match MigrateError::collect(errors) {
        Some(err) => Err(err),
        None => Ok(plans),
    }
}

/// Drops one database, or every shard when `name` is `shards`.
pub async fn drop_databases(ctx: &Context, name: &str) -> Result<()> {
    for Target { spec, .. } in resolver::resolve_admin(name, &ctx.registry)? {
        ctx.ensure_not_cancelled(&spec.name)?;
        lifecycle::drop_database(spec).await?;
    }
    Ok(())
}

/// Drops every registered database, stopping at the first failure.
pub async fn drop_all(ctx: &Context) -> Result<()> {
    for (_, spec) in ctx.registry.iter() {
        ctx.ensure_not_cancelled(&spec.name)?;
        lifecycle::drop_database(spec).await?;
    }
    Ok(())
}

/// Drops `table` from one database, or from every shard when `name` is `shards`.
pub async fn drop_tables(ctx: &Context, name: &str, table: &str) -> Result<()> {
    for Target { spec, .. } in resolver::resolve_admin(name, &ctx.registry)? {
        ctx.ensure_not_cancelled(&spec.name)?;
        lifecycle::drop_table(spec, table).await?;
    }
    Ok(())
}
