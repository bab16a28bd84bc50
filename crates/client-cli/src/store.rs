//! Flat string key-value storage persisted as a single JSON file.
//!
//! There are no transactions: every write rewrites the whole file, so two
//! writers racing on different keys can lose one update (last write wins).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Well-known storage keys
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const USER_ID: &str = "user_id";
    pub const ROLE: &str = "role";
    pub const PUSH_TOKEN: &str = "push_token";
    pub const PROFILE: &str = "profile";
    pub const IDENTIFIER: &str = "identifier";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const EMAIL: &str = "email";
    pub const LAST_NOTIFICATION: &str = "last_notification";
}

#[derive(Debug, Clone)]
pub struct KvStore {
    path: PathBuf,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!("Local storage at {} is unreadable, starting empty: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.multi_set(&[(key, value)])
    }

    pub fn multi_set(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.read_all()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        self.write_all(&map)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_all()?;
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
