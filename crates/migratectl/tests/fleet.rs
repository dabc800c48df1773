//! Integration tests for fleet-wide tasks.
//!
//! Every database is a SQLite file inside a scratch directory, next to the
//! migrations tree the tasks read.

use std::fs;
use std::path::PathBuf;

use migratectl::connection;
use migratectl::prelude::*;
use migratectl::task;

struct Fleet {
    dir: tempfile::TempDir,
    registry: DatabaseRegistry,
}

impl Fleet {
    fn new(aliases: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("migrations")).unwrap();

        let mut registry = DatabaseRegistry::default();
        for alias in aliases {
            registry.insert(
                *alias,
                DatabaseSpec::sqlite(dir.path().join(format!("{alias}.db"))),
            );
        }
        Self { dir, registry }
    }

    fn migrations_root(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    fn migration(&self, set: &str, name: &str, sql: &str) {
        let directory = self.migrations_root().join(set);
        fs::create_dir_all(&directory).unwrap();
        fs::write(directory.join(name), sql).unwrap();
    }

    fn context(&self) -> Context {
        let settings = Settings {
            db_migrations_path: self.migrations_root(),
            db_settings_path: self.dir.path().join("dbs.json"),
        };
        Context::new(settings, self.registry.clone())
    }

    fn db_path(&self, alias: &str) -> PathBuf {
        self.dir.path().join(format!("{alias}.db"))
    }

    fn spec(&self, alias: &str) -> &DatabaseSpec {
        self.registry.get(alias).unwrap()
    }

    async fn ledger(&self, alias: &str) -> Vec<String> {
        let spec = self.spec(alias);
        let mut conn = connection::connect(spec).await.unwrap();
        let mut names: Vec<String> = Ledger::new(&SqliteDialect, &spec.name)
            .applied(&mut conn)
            .await
            .unwrap()
            .into_iter()
            .collect();
        connection::close(conn, &spec.name).await;
        names.sort();
        names
    }

    async fn tables(&self, alias: &str) -> Vec<String> {
        let spec = self.spec(alias);
        let mut conn = connection::connect(spec).await.unwrap();
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut conn)
        .await
        .unwrap();
        connection::close(conn, &spec.name).await;
        names
    }
}

#[tokio::test]
async fn test_init_fans_out_to_shards_only() {
    let fleet = Fleet::new(&["shard_01", "shard_02", "other_db"]);
    fleet.migration("shards", "001_events.sql", "CREATE TABLE events (id INTEGER PRIMARY KEY);");
    fleet.migration("shards", "002_index.sql", "CREATE INDEX events_id ON events (id);");

    Task::Init.run(&fleet.context()).await.unwrap();

    for shard in ["shard_01", "shard_02"] {
        assert_eq!(
            fleet.ledger(shard).await,
            vec!["001_events.sql", "002_index.sql"]
        );
        assert_eq!(fleet.tables(shard).await, vec!["events", "schema_migrations"]);
    }

    assert!(fleet.ledger("other_db").await.is_empty());
    assert_eq!(fleet.tables("other_db").await, vec!["schema_migrations"]);
}

#[tokio::test]
async fn test_shard_ledgers_are_independent() {
    let fleet = Fleet::new(&["shard_01", "shard_02"]);
    fleet.migration("shards", "001_events.sql", "CREATE TABLE events (id INTEGER);");
    let ctx = fleet.context();
    Task::Init.run(&ctx).await.unwrap();

    // shard_02 loses its table and ledger row behind the tool's back.
    lifecycle_reset(&fleet, "shard_02").await;
    fleet.migration("shards", "002_more.sql", "CREATE TABLE more (id INTEGER);");

    let reports = task::migrate(&ctx).await.unwrap();
    let applied: Vec<(String, Vec<String>)> = reports
        .into_iter()
        .map(|r| (r.alias, r.applied))
        .collect();
    assert_eq!(
        applied,
        vec![
            ("shard_01".to_string(), vec!["002_more.sql".to_string()]),
            (
                "shard_02".to_string(),
                vec!["001_events.sql".to_string(), "002_more.sql".to_string()]
            ),
        ]
    );
}

async fn lifecycle_reset(fleet: &Fleet, alias: &str) {
    migratectl::lifecycle::drop_table(fleet.spec(alias), "events")
        .await
        .unwrap();
    migratectl::lifecycle::drop_table(fleet.spec(alias), "schema_migrations")
        .await
        .unwrap();
    migratectl::lifecycle::create_ledger_table(fleet.spec(alias))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_migrate_twice_is_idempotent() {
    let fleet = Fleet::new(&["users"]);
    fleet.migration("users", "001_users.sql", "CREATE TABLE users (id INTEGER);");
    fleet.migration("users", "002_seed.sql", "INSERT INTO users (id) VALUES (1);");
    let ctx = fleet.context();

    Task::Init.run(&ctx).await.unwrap();
    let reports = task::migrate(&ctx).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].applied.is_empty());
    assert_eq!(reports[0].already_applied, 2);
    assert_eq!(fleet.ledger("users").await, vec!["001_users.sql", "002_seed.sql"]);
}

#[tokio::test]
async fn test_empty_root_touches_nothing() {
    let fleet = Fleet::new(&["users"]);

    let result = Task::Migrate.run(&fleet.context()).await;
    assert!(matches!(result, Err(MigrateError::EmptyDirectory(_))));
    assert!(!fleet.db_path("users").exists());
}

#[tokio::test]
async fn test_unknown_alias() {
    let fleet = Fleet::new(&[]);
    fleet.migration("billing", "001_invoices.sql", "CREATE TABLE invoices (id INTEGER);");

    let result = task::migrate(&fleet.context()).await;
    match result {
        Err(MigrateError::DatabaseNotFound { alias }) => assert_eq!(alias, "billing"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!fleet.db_path("billing").exists());
}

#[tokio::test]
async fn test_failure_does_not_block_siblings() {
    let fleet = Fleet::new(&["users", "orders"]);
    let ctx = fleet.context();
    task::create_databases(&fleet.context()).await.unwrap();
    // Only `users` gets a ledger table; `orders` is left uninitialized.
    migratectl::lifecycle::create_ledger_table(fleet.spec("users"))
        .await
        .unwrap();

    fleet.migration("billing", "001_invoices.sql", "CREATE TABLE invoices (id INTEGER);");
    fleet.migration("orders", "001_orders.sql", "CREATE TABLE orders (id INTEGER);");
    fleet.migration("users", "001_users.sql", "CREATE TABLE users (id INTEGER);");

    let err = task::migrate(&ctx).await.unwrap_err();
    match err {
        MigrateError::Multiple(errors) => {
            assert_eq!(errors.len(), 2);
            assert_eq!(errors[0].kind(), ErrorKind::Configuration);
            assert_eq!(errors[1].kind(), ErrorKind::Ledger);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(fleet.ledger("users").await, vec!["001_users.sql"]);
}

#[tokio::test]
async fn test_status_lists_outstanding() {
    let fleet = Fleet::new(&["users"]);
    fleet.migration("users", "002_email.sql", "ALTER TABLE users ADD COLUMN email TEXT;");
    fleet.migration("users", "001_users.sql", "CREATE TABLE users (id INTEGER);");
    let ctx = fleet.context();
    task::create_databases(&fleet.context()).await.unwrap();
    task::create_ledger_tables(&fleet.context()).await.unwrap();

    let plans = task::status(&ctx).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].outstanding, vec!["001_users.sql", "002_email.sql"]);
    assert_eq!(fleet.tables("users").await, vec!["schema_migrations"]);
}

#[tokio::test]
async fn test_drop_shards_only() {
    let fleet = Fleet::new(&["shard_01", "shard_02", "users"]);
    task::create_databases(&fleet.context()).await.unwrap();

    Task::Drop {
        database: SHARDS_ALIAS.to_string(),
    }
    .run(&fleet.context())
    .await
    .unwrap();

    assert!(!fleet.db_path("shard_01").exists());
    assert!(!fleet.db_path("shard_02").exists());
    assert!(fleet.db_path("users").exists());
}

#[tokio::test]
async fn test_drop_by_physical_name() {
    let fleet = Fleet::new(&["users", "orders"]);
    task::create_databases(&fleet.context()).await.unwrap();
    let name = fleet.spec("users").name.clone();

    Task::Drop { database: name }
        .run(&fleet.context())
        .await
        .unwrap();

    assert!(!fleet.db_path("users").exists());
    assert!(fleet.db_path("orders").exists());
}

#[tokio::test]
async fn test_drop_table_across_shards() {
    let fleet = Fleet::new(&["shard_01", "shard_02"]);
    fleet.migration("shards", "001_sessions.sql", "CREATE TABLE sessions (id INTEGER);");
    let ctx = fleet.context();
    Task::Init.run(&ctx).await.unwrap();

    Task::DropTable {
        database: SHARDS_ALIAS.to_string(),
        table: "sessions".to_string(),
    }
    .run(&ctx)
    .await
    .unwrap();

    for shard in ["shard_01", "shard_02"] {
        assert_eq!(fleet.tables(shard).await, vec!["schema_migrations"]);
    }
}

#[tokio::test]
async fn test_drop_all() {
    let fleet = Fleet::new(&["shard_01", "users"]);
    task::create_databases(&fleet.context()).await.unwrap();

    Task::DropAll.run(&fleet.context()).await.unwrap();

    assert!(!fleet.db_path("shard_01").exists());
    assert!(!fleet.db_path("users").exists());
}

#[tokio::test]
async fn test_cancelled_drop_all_keeps_databases() {
    let fleet = Fleet::new(&["shard_01", "users"]);
    let ctx = fleet.context();
    task::create_databases(&ctx).await.unwrap();

    ctx.cancel.cancel();
    let result = Task::DropAll.run(&ctx).await;

    assert!(matches!(result, Err(MigrateError::Cancelled { .. })));
    assert!(fleet.db_path("shard_01").exists());
    assert!(fleet.db_path("users").exists());
}

#[tokio::test]
async fn test_cancelled_init_creates_nothing() {
    let fleet = Fleet::new(&["users"]);
    fleet.migration("users", "001_users.sql", "CREATE TABLE users (id INTEGER);");
    let ctx = fleet.context();

    ctx.cancel.cancel();
    let err = Task::Init.run(&ctx).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!fleet.db_path("users").exists());
}
