//! Directory-driven SQL migrations for a fleet of databases.
//!
//! `migratectl` applies plain `.sql` files to every database registered in
//! a JSON registry, where:
//! - Each database alias has its own directory of migrations
//! - The reserved `shards` directory is applied to every `shard_NN` database
//! - Migrations run in file name order, each in its own transaction
//! - Applied migrations are recorded in a `schema_migrations` table and are
//!   never run twice
//!
//! # Architecture
//!
//! - **Source** - Discovers migration sets and loads migration files
//! - **Resolver** - Maps a set's alias to the databases it applies to
//! - **Ledger** - Reads and writes the `schema_migrations` table
//! - **Applier** - Applies outstanding migrations to one database
//! - **Lifecycle** - Creates and drops databases and tables
//! - **Dialect** - Engine-specific SQL for the above
//! - **Task** - Fleet-wide commands built on the pieces above
//!
//! # Layout
//!
//! ```text
//! migrations/
//! ├── users/
//! │   ├── 001_create_users.sql
//! │   └── 002_add_email.sql
//! └── shards/
//!     └── 001_create_events.sql
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use migratectl::prelude::*;
//!
//! let ctx = Context::load("settings.json")?;
//! Task::Init.run(&ctx).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create every database and ledger table, then migrate
//! migratectl init
//!
//! # Apply outstanding migrations
//! migratectl migrate
//!
//! # Show outstanding migrations
//! migratectl status
//!
//! # Drop a table from every shard
//! migratectl drop-table shards sessions
//! ```

pub mod applier;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod resolver;
pub mod source;
pub mod task;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::applier::{ApplyReport, CancelFlag, MigrationApplier, MigrationPlan};
    pub use crate::config::{DatabaseRegistry, DatabaseSpec, DriverKind, Settings};
    pub use crate::dialect::{MigrationDialect, MySqlDialect, PostgresDialect, SqliteDialect};
    pub use crate::error::{ErrorKind, MigrateError, Result};
    pub use crate::ledger::Ledger;
    pub use crate::resolver::{is_shard_alias, resolve, Target, SHARDS_ALIAS};
    pub use crate::source::{discover, is_migration_file, MigrationFile, MigrationSet};
    pub use crate::task::{Context, Task};
}
