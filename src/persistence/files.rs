use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of a project-local data directory
pub const LOCAL_DIR_NAME: &str = ".tasktree";

/// Environment variable that pins the data directory
pub const DIR_ENV_VAR: &str = "TASKTREE_DIR";

/// Get the data directory.
///
/// Order: explicit path, `TASKTREE_DIR`, a local `.tasktree` found walking up
/// from the current directory, then the platform data directory.
pub fn get_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    let from_env = env::var_os(DIR_ENV_VAR).filter(|v| !v.is_empty()).map(PathBuf::from);
    resolve_data_dir(explicit, from_env, &current_dir)
}

fn resolve_data_dir(explicit: Option<&Path>, from_env: Option<PathBuf>, current_dir: &Path) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = from_env {
        return Ok(dir);
    }
    if let Some(local_dir) = find_local_dir(current_dir) {
        return Ok(local_dir);
    }

    if let Some(data) = dirs::data_dir() {
        return Ok(data.join("tasktree"));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(LOCAL_DIR_NAME))
}

/// Find local .tasktree directory by walking up the directory tree
fn find_local_dir(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let candidate = current.join(LOCAL_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Ensure the data directory exists
pub fn ensure_data_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(dir.to_path_buf())
}

/// Initialize a local .tasktree directory inside `parent`
pub fn init_local_dir(parent: &Path) -> Result<PathBuf> {
    let dir = parent.join(LOCAL_DIR_NAME);

    if dir.exists() {
        anyhow::bail!("Data directory already exists: {}", dir.display());
    }

    fs::create_dir_all(&dir).with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    Ok(dir)
}

/// Path to the task document
pub fn tasks_file(dir: &Path) -> PathBuf {
    dir.join("tasks.json")
}

/// Path to config.json
pub fn config_file(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().context("File path has no parent directory")?;

    let mut temp_file = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;

    temp_file.write_all(content.as_bytes()).context("Failed to write to temporary file")?;

    temp_file.as_file().sync_all().context("Failed to sync temporary file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Copy a file aside with a timestamp, returning the copy's path
pub fn backup_file<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let extension = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("bak.{timestamp}.{ext}"),
        None => format!("bak.{timestamp}"),
    };
    let backup_path = path.with_extension(extension);

    fs::copy(path, &backup_path).with_context(|| format!("Failed to backup file: {}", path.display()))?;

    Ok(backup_path)
}

/// Read file content, `None` if the file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let explicit = temp_dir.path().join("mine");
        let dir = resolve_data_dir(Some(&explicit), Some(PathBuf::from("/elsewhere")), temp_dir.path()).unwrap();
        assert_eq!(dir, explicit);
    }

    #[test]
    fn test_env_dir_beats_local_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir(temp_dir.path().join(LOCAL_DIR_NAME)).unwrap();
        let dir = resolve_data_dir(None, Some(PathBuf::from("/pinned")), temp_dir.path()).unwrap();
        assert_eq!(dir, PathBuf::from("/pinned"));
    }

    #[test]
    fn test_local_dir_found_from_subdirectory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = init_local_dir(temp_dir.path()).unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let dir = resolve_data_dir(None, None, &nested).unwrap();
        assert_eq!(dir, local);
    }

    #[test]
    fn test_init_local_dir_twice_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        init_local_dir(temp_dir.path()).unwrap();
        assert!(init_local_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_ensure_data_dir_creates_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("x").join("y");
        ensure_data_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.json");

        atomic_write(&test_file, "[]").unwrap();
        assert_eq!(read_file(&test_file).unwrap().as_deref(), Some("[]"));

        atomic_write(&test_file, "[1]").unwrap();
        assert_eq!(read_file(&test_file).unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_backup_file_keeps_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("tasks.json");
        fs::write(&test_file, "[oops").unwrap();

        let backup = backup_file(&test_file).unwrap();
        assert_ne!(backup, test_file);
        assert!(backup.to_string_lossy().ends_with(".json"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "[oops");
        assert!(test_file.exists());
    }

    #[test]
    fn test_read_nonexistent_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nonexistent.json");

        assert!(read_file(&test_file).unwrap().is_none());
    }

    #[test]
    fn test_atomic_write_into_missing_dir_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("missing").join("tasks.json");
        assert!(atomic_write(&test_file, "[]").is_err());
    }
}
