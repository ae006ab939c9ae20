//! User settings, persisted as JSON through the storage layer.

use serde::{Deserialize, Serialize};

use crate::storage::{keys, Storage};

/// Persisted user preferences.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub auto_save: bool,
    pub show_timestamps: bool,
    /// Start new sessions with the reasoning toggle on.
    pub default_reasoning: bool,
    /// Start new sessions with the online-search toggle on.
    pub default_search: bool,
    pub user_system_prompt: String,
    /// "small", "medium" or "large"; interpreted by the host renderer.
    pub font_size: String,
    pub compact_mode: bool,
    /// Per-conversation message cap. `None` means unlimited.
    pub memory_limit: Option<usize>,
    pub sound_notifications: bool,
    pub desktop_notifications: bool,
    pub export_timestamps: bool,
    pub export_reasoning: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save: true,
            show_timestamps: true,
            default_reasoning: false,
            default_search: false,
            user_system_prompt: String::new(),
            font_size: "medium".to_string(),
            compact_mode: false,
            memory_limit: Some(50),
            sound_notifications: false,
            desktop_notifications: false,
            export_timestamps: true,
            export_reasoning: true,
        }
    }
}

impl Settings {
    /// Load settings from storage; missing or unreadable data yields defaults.
    pub fn load(storage: &dyn Storage) -> Self {
        storage
            .get(keys::SETTINGS)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Persist settings as pretty JSON.
    pub fn save(&self, storage: &mut dyn Storage) -> Result<(), String> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        storage.set(keys::SETTINGS, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.auto_save);
        assert!(s.show_timestamps);
        assert!(!s.default_reasoning);
        assert_eq!(s.memory_limit, Some(50));
        assert_eq!(s.font_size, "medium");
    }

    #[test]
    fn test_roundtrip_through_storage() {
        let mut store = MemoryStorage::new();
        let mut s = Settings::default();
        s.default_search = true;
        s.memory_limit = None;
        s.user_system_prompt = "be brief".to_string();
        s.save(&mut store).unwrap();

        let loaded = Settings::load(&store);
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_defaults() {
        let mut store = MemoryStorage::new();
        store.set(keys::SETTINGS, "{not json").unwrap();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn test_partial_json_fills_missing_fields() {
        let mut store = MemoryStorage::new();
        store
            .set(keys::SETTINGS, r#"{"default_reasoning": true}"#)
            .unwrap();
        let s = Settings::load(&store);
        assert!(s.default_reasoning);
        assert!(s.auto_save); // default preserved
    }
}
