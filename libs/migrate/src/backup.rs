//! Backups of configuration files replaced by a migration

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// First unused path of `P.old`, `P.old.1`, `P.old.2`...
pub fn backup_path(path: &Path) -> PathBuf {
    let base = format!("{}.old", path.display());
    let mut candidate = PathBuf::from(&base);
    let mut counter = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}.{}", base, counter));
        counter += 1;
    }
    candidate
}

/// Rename `path` to its backup name and return that name.
pub fn make_backup(path: &Path) -> io::Result<PathBuf> {
    let target = backup_path(path);
    if target.exists() {
        fs::remove_file(&target)?;
    }
    fs::rename(path, &target)?;
    debug!(from = %path.display(), to = %target.display(), "configuration file backed up");
    Ok(target)
}
