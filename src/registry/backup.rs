use super::RegistryError;
use chrono::Local;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const BACKUP_FILE_PREFIX: &str = "runs.db.";

/// Writes a consistent snapshot of the registry database into `backups_dir`
/// and removes all but the `keep` newest snapshots.
pub fn backup_registry(
    db_path: &Path,
    backups_dir: &Path,
    keep: usize,
) -> Result<PathBuf, RegistryError> {
    if !db_path.exists() {
        return Err(RegistryError::MissingDatabase {
            path: db_path.display().to_string(),
        });
    }
    fs::create_dir_all(backups_dir).map_err(|source| RegistryError::BackupDir {
        path: backups_dir.display().to_string(),
        source,
    })?;

    let target = next_backup_path(backups_dir);
    let connection = Connection::open(db_path).map_err(|source| RegistryError::Open {
        path: db_path.display().to_string(),
        source,
    })?;
    connection
        .execute(
            "VACUUM INTO ?1",
            params![target.display().to_string()],
        )
        .map_err(|source| RegistryError::Sql { source })?;
    drop(connection);

    rotate_backups(backups_dir, keep.max(1));
    Ok(target)
}

fn next_backup_path(backups_dir: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    let mut candidate = backups_dir.join(format!("{BACKUP_FILE_PREFIX}{stamp}.sqlite"));
    let mut attempt = 1;
    while candidate.exists() {
        candidate = backups_dir.join(format!("{BACKUP_FILE_PREFIX}{stamp}-{attempt}.sqlite"));
        attempt += 1;
    }
    candidate
}

fn rotate_backups(backups_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(backups_dir) else {
        return;
    };
    let mut snapshots: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(BACKUP_FILE_PREFIX))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().ok()?, entry.path()))
        })
        .collect();

    snapshots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    for (_, path) in snapshots.into_iter().skip(keep) {
        let _ = fs::remove_file(path);
    }
}
