//! migratectl CLI
//!
//! Command-line tool for initializing, migrating and dropping databases.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use migratectl::prelude::*;
use migratectl::task;

/// Exit code of a run aborted by a second interrupt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Apply directory-defined SQL migrations to a fleet of databases.
#[derive(Parser)]
#[command(name = "migratectl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file pointing at the migrations root and the database registry.
    #[arg(short, long, env = "MIGRATECTL_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every database and ledger table, then apply migrations.
    #[command(alias = "db_init")]
    Init,

    /// Apply outstanding migrations.
    #[command(alias = "db_migrate")]
    Migrate,

    /// Show outstanding migrations per database.
    Status,

    /// Drop one database, or every shard with `shards`.
    #[command(alias = "db_drop")]
    Drop {
        /// Database alias or name.
        database: String,
    },

    /// Drop every registered database.
    #[command(alias = "db_drop_all")]
    DropAll,

    /// Drop a table from one database, or from every shard with `shards`.
    #[command(alias = "db_drop_table")]
    DropTable {
        /// Database alias or name.
        database: String,
        /// Table name.
        table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = Context::load(&cli.settings)
        .with_context(|| format!("Failed to read settings from {}", cli.settings.display()))?;

    // First Ctrl-C stops at the next migration or database boundary, a second one exits.
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current step (press Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Second interrupt received, aborting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let task = match cli.command {
        Commands::Status => {
            let plans = task::status(&ctx).await?;
            print_status(&plans);
            return Ok(());
        }
        Commands::Init => Task::Init,
        Commands::Migrate => Task::Migrate,
        Commands::Drop { database } => Task::Drop { database },
        Commands::DropAll => Task::DropAll,
        Commands::DropTable { database, table } => Task::DropTable { database, table },
    };

    task.run(&ctx)
        .await
        .with_context(|| format!("Task \"{}\" failed", task.name()))?;
    info!("Done.");

    Ok(())
}

fn print_status(plans: &[MigrationPlan]) {
    if plans.is_empty() {
        println!("No migration sets found.");
        return;
    }

    for plan in plans {
        println!(
            "\n{} ({}): {} applied, {} outstanding",
            plan.alias,
            plan.database,
            plan.already_applied,
            plan.outstanding.len()
        );
        println!("{:-<60}", "");
        for name in &plan.outstanding {
            println!(" [ ] {name}");
        }
    }
    println!();
}
