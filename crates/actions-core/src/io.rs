use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Remove `path` (if present) and recreate it empty.
pub fn reset_dir(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    ensure_dir(path)
}

/// Expand a leading `~` to the local home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), home::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}

/// Replace `&i` in `template` with the first index whose path does not exist.
///
/// Templates without `&i` are returned unchanged.
pub fn first_free_indexed(template: &str) -> PathBuf {
    if !template.contains("&i") {
        return expand_home(template);
    }
    let mut index = 0usize;
    loop {
        let candidate = expand_home(&template.replace("&i", &index.to_string()));
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}
