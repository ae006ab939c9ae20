//! Keyed-string persistence.
//!
//! The application state never touches the filesystem directly; everything
//! goes through the `Storage` capability so hosts can swap in whatever
//! backing store they have (a config directory here, localStorage-like
//! stores elsewhere, memory in tests).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;

/// Well-known storage keys.
pub mod keys {
    pub const CONVERSATIONS: &str = "semchat_conversations";
    pub const SETTINGS: &str = "semchat_settings";
    pub const USER_NAME: &str = "semchat_user_name";
    pub const MODEL: &str = "semchat_model";
}

/// A keyed string store.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&mut self, key: &str);
}

/// File-backed storage: one file per key under the platform config dir.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at the platform config directory.
    pub fn new() -> Result<Self, String> {
        let proj = ProjectDirs::from("com", "semchat", "semchat-client")
            .ok_or("Failed to determine config directory")?;
        Self::with_dir(proj.config_dir().to_path_buf())
    }

    /// Create storage rooted at an explicit directory.
    pub fn with_dir(dir: PathBuf) -> Result<Self, String> {
        fs::create_dir_all(&dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize_key(key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        fs::write(self.path_for(key), value)
            .map_err(|e| format!("Failed to write {}: {}", key, e))
    }

    fn remove(&mut self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }
}

/// In-memory storage for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Keep key-derived file names filesystem-safe.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let mut store = MemoryStorage::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k"), Some("v".to_string()));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStorage::with_dir(dir.path().to_path_buf()).unwrap();
        store.set(keys::USER_NAME, "alice").unwrap();
        assert_eq!(store.get(keys::USER_NAME), Some("alice".to_string()));

        // A fresh handle over the same directory sees the value
        let store2 = FileStorage::with_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(store2.get(keys::USER_NAME), Some("alice".to_string()));

        store.remove(keys::USER_NAME);
        assert_eq!(store.get(keys::USER_NAME), None);
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("a/b:c"), "a_b_c");
        assert_eq!(sanitize_key("plain_key"), "plain_key");
    }
}
