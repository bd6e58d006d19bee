//! Shared repository utilities for sharded, per-record directories.

use crate::error::{AttentionError, AttentionResult};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use ulr_uuid::ShardableUuid;

/// Creates a unique sharded directory within `base_dir`.
///
/// Retries up to 5 times with a fresh UUID if the candidate directory already exists.
///
/// # Errors
///
/// Returns [`AttentionError::AttentionDirCreation`] if a parent directory cannot be created,
/// the final directory cannot be created, or no unique directory was found after 5 attempts.
pub(crate) fn create_uuid_and_shard_dir(
    base_dir: &Path,
    mut uuid_source: impl FnMut() -> ShardableUuid,
) -> AttentionResult<(ShardableUuid, PathBuf)> {
    for _attempt in 0..5 {
        let uuid = uuid_source();
        let candidate = uuid.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(AttentionError::AttentionDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(AttentionError::AttentionDirCreation(e)),
        }
    }

    Err(AttentionError::AttentionDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique attention directory after 5 attempts",
    )))
}

/// Lists record directories under `base_dir/<s1>/<s2>/<uuid>/`.
///
/// Entries whose name is not a canonical UUID are ignored. A missing `base_dir` yields an empty
/// list.
pub(crate) fn sharded_record_dirs(base_dir: &Path) -> Vec<(ShardableUuid, PathBuf)> {
    fn subdirs(dir: &Path) -> Vec<PathBuf> {
        match fs::read_dir(dir) {
            Ok(it) => it
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    let mut records = Vec::new();
    for s1 in subdirs(base_dir) {
        for s2 in subdirs(&s1) {
            for record_dir in subdirs(&s2) {
                let Some(name) = record_dir.file_name().and_then(|os| os.to_str()) else {
                    continue;
                };
                match ShardableUuid::parse(name) {
                    Ok(id) => records.push((id, record_dir)),
                    Err(_) => {
                        tracing::warn!("ignoring non-record directory: {}", record_dir.display())
                    }
                }
            }
        }
    }
    records
}
