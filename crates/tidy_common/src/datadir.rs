//! Per-user data directory.
//!
//! Resolution order:
//! 1. `$TIDY_DATA_DIR`
//! 2. `history.data_dir` from the config file
//! 3. `~/.tidy`
//! 4. `./.tidy` when no home directory can be found

use crate::config::TidyConfig;
use crate::error::{HistoryError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "TIDY_DATA_DIR";
const APP_DIR: &str = ".tidy";

pub fn resolve(config: &TidyConfig) -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(dir) = &config.history.data_dir {
        return dir.clone();
    }
    match dirs::home_dir() {
        Some(home) => home.join(APP_DIR),
        None => PathBuf::from(APP_DIR),
    }
}

/// Create `dir` if needed, owner-only on unix
pub fn ensure(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    if !dir.is_dir() {
        return Err(HistoryError::DataDir(dir.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_dir_used_when_set() {
        // Only meaningful when the env override is absent
        if std::env::var_os(DATA_DIR_ENV).is_some() {
            return;
        }
        let mut config = TidyConfig::default();
        config.history.data_dir = Some(PathBuf::from("/tmp/tidy-test-data"));
        assert_eq!(resolve(&config), PathBuf::from("/tmp/tidy-test-data"));
    }

    #[test]
    fn test_ensure_creates_nested_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        ensure(&target).unwrap();
        assert!(target.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_ensure_over_file_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();
        assert!(ensure(&file).is_err());
    }
}
