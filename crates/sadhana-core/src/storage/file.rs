//! Filesystem-backed key-value store.
//!
//! Each key is one file, `{data_dir}/{key}.json`. Writes are atomic
//! (temp file + rename) so a crash mid-write leaves the previous value
//! intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::KeyValueStore;
use crate::error::{CoreError, Result};

/// Returns `~/.config/sadhana[-dev]/` based on SADHANA_ENV.
///
/// Set SADHANA_ENV=dev to use a separate development data directory.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SADHANA_ENV").unwrap_or_else(|_| "production".to_string());
    let dir = if env == "dev" {
        base_dir.join("sadhana-dev")
    } else {
        base_dir.join("sadhana")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| CoreError::persistence(dir.display().to_string(), e))?;
    Ok(dir)
}

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| CoreError::persistence(dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    /// Open a store at the default data directory.
    pub fn open_default() -> Result<Self> {
        Self::new(data_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::persistence(key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| CoreError::persistence(key, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CoreError::persistence(key, e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::persistence(key, e)),
        }
    }
}
