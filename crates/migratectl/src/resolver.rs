//! Target resolution.
//!
//! Maps a migration set's alias to the physical databases it applies to.
//! The reserved `shards` alias fans out to every registered shard.

use crate::config::{DatabaseRegistry, DatabaseSpec};
use crate::error::{MigrateError, Result};

/// Alias of the migration set shared by every shard.
pub const SHARDS_ALIAS: &str = "shards";

const SHARD_MARKER: &[u8] = b"shard_";
const SHARD_DIGITS: usize = 2;

/// Returns whether a registry alias names a shard member.
///
/// Matches `shard_NN` and `<prefix>_shard_NN` with exactly two ASCII digits.
#[must_use]
pub fn is_shard_alias(alias: &str) -> bool {
    let bytes = alias.as_bytes();
    if bytes.len() < SHARD_MARKER.len() + SHARD_DIGITS {
        return false;
    }

    let (head, digits) = bytes.split_at(bytes.len() - SHARD_DIGITS);
    if !digits.iter().all(u8::is_ascii_digit) || !head.ends_with(SHARD_MARKER) {
        return false;
    }

    let prefix = &head[..head.len() - SHARD_MARKER.len()];
    prefix.is_empty() || prefix.ends_with(b"_")
}

/// A physical database to operate on.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Registry alias.
    pub alias: &'a str,
    /// Connection spec.
    pub spec: &'a DatabaseSpec,
}

/// Every registered shard member, in alias order.
#[must_use]
pub fn shard_targets(registry: &DatabaseRegistry) -> Vec<Target<'_>> {
    registry
        .iter()
        .filter(|(alias, _)| is_shard_alias(alias))
        .map(|(alias, spec)| Target { alias, spec })
        .collect()
}

/// Resolves a migration set alias to the databases it applies to.
pub fn resolve<'a>(alias: &str, registry: &'a DatabaseRegistry) -> Result<Vec<Target<'a>>> {
    if alias == SHARDS_ALIAS {
        let shards = shard_targets(registry);
        if shards.is_empty() {
            return Err(MigrateError::NoShards);
        }
        return Ok(shards);
    }

    registry
        .dbs
        .get_key_value(alias)
        .map(|(alias, spec)| vec![Target { alias, spec }])
        .ok_or_else(|| MigrateError::DatabaseNotFound {
            alias: alias.to_string(),
        })
}

/// Finds one database by alias or, failing that, by physical database name.
#[must_use]
pub fn find<'a>(name: &str, registry: &'a DatabaseRegistry) -> Option<Target<'a>> {
    registry
        .dbs
        .get_key_value(name)
        .or_else(|| registry.dbs.iter().find(|(_, spec)| spec.name == name))
        .map(|(alias, spec)| Target { alias, spec })
}

/// Resolves an administrative target: the whole shard group for `shards`,
/// otherwise one database found by alias or physical name.
pub fn resolve_admin<'a>(name: &str, registry: &'a DatabaseRegistry) -> Result<Vec<Target<'a>>> {
    if name == SHARDS_ALIAS {
        return resolve(name, registry);
    }
    find(name, registry)
        .map(|target| vec![target])
        .ok_or_else(|| MigrateError::DatabaseNotFound {
            alias: name.to_string(),
        })
}
