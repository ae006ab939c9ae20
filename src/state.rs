//! Core application state, separated from rendering logic.
//!
//! `ChatState` holds all data that represents the chat session:
//! conversations, the active thread, toggles, offline queue, rate-limit
//! countdown. Hosts receive state as a parameter rather than owning pieces
//! of it, and persistence goes through the injected `Storage`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Local;
use log::warn;

use crate::conversation::{now_millis, Conversation};
use crate::settings::Settings;
use crate::storage::{keys, Storage};

/// How long status toasts stay visible, in seconds.
pub const STATUS_MESSAGE_TTL_SECS: u64 = 3;
/// System log cap before the oldest lines are dropped.
const SYSTEM_LOG_MAX_LINES: usize = 500;
/// Model used when none was ever chosen.
pub const DEFAULT_MODEL: &str = "SA Pro";

/// An outbound message held back while offline.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub text: String,
    pub timestamp: i64,
}

/// Core application state for the chat client.
pub struct ChatState {
    /// All conversations keyed by id.
    pub conversations: HashMap<String, Conversation>,

    /// Id of the active conversation. Always present in `conversations`.
    pub current_conversation: String,

    /// Display name, once the user has set one.
    pub user_name: Option<String>,

    /// Reasoning toggle for outgoing requests.
    pub reason_active: bool,

    /// Online-search toggle for outgoing requests.
    pub search_active: bool,

    /// Selected model name.
    pub current_model: String,

    pub settings: Settings,

    /// Whether the host reported loss of connectivity.
    pub is_offline: bool,

    /// Messages written while offline, flushed in order on reconnect.
    pub offline_queue: Vec<QueuedMessage>,

    /// Status toast messages with creation time (auto-expire).
    pub status_messages: Vec<(String, Instant)>,

    /// Diagnostic log lines shown in the host's system view.
    pub system_log: Vec<String>,

    /// Sending is blocked until this instant after an HTTP 429.
    pub rate_limited_until: Option<Instant>,
}

impl ChatState {
    /// Create a fresh state with a single empty conversation.
    pub fn new() -> Self {
        let conv = Conversation::new();
        let id = conv.id.clone();
        let mut conversations = HashMap::new();
        conversations.insert(id.clone(), conv);
        Self {
            conversations,
            current_conversation: id,
            user_name: None,
            reason_active: false,
            search_active: false,
            current_model: DEFAULT_MODEL.to_string(),
            settings: Settings::default(),
            is_offline: false,
            offline_queue: Vec::new(),
            status_messages: Vec::new(),
            system_log: vec!["Welcome to Semchat!".to_string()],
            rate_limited_until: None,
        }
    }

    /// Restore state from storage, then open a fresh conversation, the same
    /// way the client always started on a new thread.
    pub fn load(storage: &dyn Storage) -> Self {
        let mut state = Self::new();
        state.settings = Settings::load(storage);
        state.reason_active = state.settings.default_reasoning;
        state.search_active = state.settings.default_search;
        state.user_name = storage.get(keys::USER_NAME);
        if let Some(model) = storage.get(keys::MODEL) {
            state.current_model = model;
        }
        if let Some(raw) = storage.get(keys::CONVERSATIONS) {
            match serde_json::from_str::<HashMap<String, Conversation>>(&raw) {
                Ok(saved) => state.conversations.extend(saved),
                Err(e) => warn!("discarding unreadable conversation store: {}", e),
            }
        }
        state
    }

    /// The active conversation.
    pub fn current(&self) -> Option<&Conversation> {
        self.conversations.get(&self.current_conversation)
    }

    /// The active conversation, mutably.
    pub fn current_mut(&mut self) -> Option<&mut Conversation> {
        self.conversations.get_mut(&self.current_conversation)
    }

    /// Open a new empty conversation and make it active. Returns its id.
    pub fn start_new_conversation(&mut self) -> String {
        let conv = Conversation::new();
        let id = conv.id.clone();
        self.conversations.insert(id.clone(), conv);
        self.current_conversation = id.clone();
        id
    }

    /// Switch to a conversation by id. Unknown ids are ignored.
    pub fn switch_to_conversation(&mut self, id: &str) -> bool {
        if self.conversations.contains_key(id) {
            self.current_conversation = id.to_string();
            true
        } else {
            false
        }
    }

    /// Delete a conversation. Deleting the active one opens a fresh thread.
    pub fn delete_conversation(&mut self, id: &str) {
        self.conversations.remove(id);
        if self.current_conversation == id {
            self.start_new_conversation();
        }
    }

    /// Conversations sorted most-recent-first.
    pub fn conversations_sorted(&self) -> Vec<&Conversation> {
        let mut all: Vec<&Conversation> = self.conversations.values().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all
    }

    /// Conversations matching a category filter and a free-text query over
    /// titles and message bodies, most-recent-first. `"all"` or an empty
    /// query disables that filter.
    pub fn filter_conversations(&self, query: &str, category: &str) -> Vec<&Conversation> {
        let query = query.trim().to_lowercase();
        self.conversations_sorted()
            .into_iter()
            .filter(|c| category == "all" || c.category == category)
            .filter(|c| {
                query.is_empty()
                    || c.title.to_lowercase().contains(&query)
                    || c.messages
                        .iter()
                        .any(|m| m.content.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Persist all conversations.
    pub fn save_conversations(&self, storage: &mut dyn Storage) -> Result<(), String> {
        let data = serde_json::to_string(&self.conversations)
            .map_err(|e| format!("Failed to serialize conversations: {}", e))?;
        storage.set(keys::CONVERSATIONS, &data)
    }

    /// Set and persist the user's display name.
    pub fn set_user_name(&mut self, storage: &mut dyn Storage, name: &str) -> Result<(), String> {
        self.user_name = Some(name.to_string());
        storage.set(keys::USER_NAME, name)
    }

    /// Set and persist the selected model.
    pub fn set_model(&mut self, storage: &mut dyn Storage, model: &str) -> Result<(), String> {
        self.current_model = model.to_string();
        storage.set(keys::MODEL, model)
    }

    /// Drop all persisted and in-memory data, keeping defaults.
    pub fn clear_all_data(&mut self, storage: &mut dyn Storage) {
        storage.remove(keys::CONVERSATIONS);
        storage.remove(keys::SETTINGS);
        storage.remove(keys::USER_NAME);
        storage.remove(keys::MODEL);
        *self = Self::new();
    }

    /// Add a status toast.
    pub fn push_status(&mut self, text: impl Into<String>) {
        self.status_messages.push((text.into(), Instant::now()));
    }

    /// Purge status messages older than the given duration.
    pub fn purge_old_status_messages(&mut self, max_age_secs: u64) {
        self.status_messages
            .retain(|(_, created)| created.elapsed().as_secs() < max_age_secs);
    }

    /// Add a timestamped line to the system log, capping its size.
    pub fn push_system_log(&mut self, line: impl AsRef<str>) {
        let ts = Local::now().format("%H:%M:%S").to_string();
        self.system_log.push(format!("[{}] {}", ts, line.as_ref()));
        if self.system_log.len() > SYSTEM_LOG_MAX_LINES {
            self.system_log.remove(0);
        }
    }

    /// Block sending for `retry_after` seconds.
    pub fn arm_rate_limit(&mut self, retry_after: u64) {
        self.rate_limited_until = Some(Instant::now() + Duration::from_secs(retry_after));
    }

    /// Seconds left on the rate-limit countdown, if one is running.
    pub fn rate_limit_remaining(&self) -> Option<u64> {
        let until = self.rate_limited_until?;
        let left = until.checked_duration_since(Instant::now())?;
        Some(left.as_secs() + u64::from(left.subsec_nanos() > 0))
    }

    /// Whether a message may be sent right now.
    pub fn can_send(&self) -> bool {
        self.rate_limit_remaining().is_none()
    }

    /// Mark the client offline or online.
    pub fn set_offline(&mut self, offline: bool) {
        self.is_offline = offline;
    }

    /// Queue an outbound message for later delivery.
    pub fn queue_offline(&mut self, text: impl Into<String>) {
        self.offline_queue.push(QueuedMessage {
            text: text.into(),
            timestamp: now_millis(),
        });
    }

    /// Take the queued messages, oldest first.
    pub fn take_offline_queue(&mut self) -> Vec<QueuedMessage> {
        std::mem::take(&mut self.offline_queue)
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}
