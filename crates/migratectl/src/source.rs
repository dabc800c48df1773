//! Migration discovery.
//!
//! The migrations root holds one directory per database alias (or the
//! reserved `shards` alias); each directory holds flat `*.sql` files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// File name suffix of a migration.
pub const MIGRATION_SUFFIX: &str = ".sql";

/// Returns whether `file_name` names a migration file.
///
/// The match is case-sensitive and the name needs a non-empty stem, so a
/// bare `.sql` is not a migration.
#[must_use]
pub fn is_migration_file(file_name: &str) -> bool {
    file_name.len() > MIGRATION_SUFFIX.len() && file_name.ends_with(MIGRATION_SUFFIX)
}

/// A loaded migration: its file name and the SQL to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, the migration's identity in the ledger.
    pub name: String,
    /// Raw SQL, executed as one batch.
    pub content: String,
}

/// Candidate migrations of one database alias.
#[derive(Debug, Clone)]
pub struct MigrationSet {
    /// Directory name: a registry alias or `shards`.
    pub alias: String,
    /// Directory the files live in.
    pub directory: PathBuf,
    /// Migration file names in discovery order.
    pub files: Vec<String>,
}

impl MigrationSet {
    /// Lists the migration files of one alias directory.
    pub fn scan(alias: impl Into<String>, directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let directory = directory.into();
        let mut files = Vec::new();

        for entry in fs::read_dir(&directory)? {
            let entry = entry?;
            if entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if is_migration_file(&name) => files.push(name),
                Ok(_) => {}
                Err(name) => {
                    warn!(directory = %directory.display(), file = ?name, "Skipping non UTF-8 file name");
                }
            }
        }

        Ok(Self {
            alias: alias.into(),
            directory,
            files,
        })
    }

    /// Reads the named migrations from this set's directory.
    ///
    /// Only the requested files are touched; the first unreadable file aborts
    /// the load.
    pub fn load(&self, names: &[String]) -> Result<Vec<MigrationFile>> {
        names
            .iter()
            .map(|name| {
                let path = self.directory.join(name);
                let content = fs::read_to_string(&path)
                    .map_err(|source| MigrateError::ReadMigration { path: path.clone(), source })?;
                debug!(path = %path.display(), bytes = content.len(), "Loaded migration");
                Ok(MigrationFile {
                    name: name.clone(),
                    content,
                })
            })
            .collect()
    }
}

/// Discovers one [`MigrationSet`] per database directory under `root`.
///
/// Directories that cannot be read or that contain no migrations are
/// logged and skipped. Sets are returned in alias order.
pub fn discover(root: &Path) -> Result<Vec<MigrationSet>> {
    if root.as_os_str().is_empty() {
        return Err(MigrateError::MissingMigrationsPath);
    }

    let read_err = |source| MigrateError::ReadMigrationsDir {
        path: root.to_path_buf(),
        source,
    };

    let mut directories = Vec::new();
    for entry in fs::read_dir(root).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(alias) => directories.push((alias, path)),
            Err(name) => {
                warn!(directory = ?name, "Skipping database directory with non UTF-8 name");
            }
        }
    }

    if directories.is_empty() {
        return Err(MigrateError::EmptyDirectory(root.to_path_buf()));
    }
    directories.sort();

    let mut sets = Vec::with_capacity(directories.len());
    for (alias, path) in directories {
        match MigrationSet::scan(alias, &path) {
            Ok(set) if set.files.is_empty() => {
                warn!(directory = %path.display(), "Skipping database directory, there are no migrations here");
            }
            Ok(set) => sets.push(set),
            Err(err) => {
                warn!(directory = %path.display(), error = %err, "Skipping database directory, failed to read migrations");
            }
        }
    }

    Ok(sets)
}
