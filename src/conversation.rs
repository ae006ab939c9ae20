//! Conversation threads and their messages.
//!
//! Stored JSON keeps the field names the browser client used (`isUser`,
//! `reasoningProcess`) so existing exports remain importable.

use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum characters of the first user message used for the title.
const TITLE_MAX_CHARS: usize = 30;
/// Maximum characters of the last message shown in list previews.
const PREVIEW_MAX_CHARS: usize = 50;

/// A single message in a conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub content: String,
    #[serde(rename = "isUser")]
    pub is_user: bool,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(
        rename = "reasoningProcess",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reasoning: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            timestamp: now_millis(),
            reasoning: None,
        }
    }

    pub fn bot(content: impl Into<String>, reasoning: Option<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            timestamp: now_millis(),
            reasoning,
        }
    }
}

/// A conversation thread.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    /// Creation time, epoch milliseconds. Used for recency sorting.
    pub timestamp: i64,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl Conversation {
    /// Create an empty conversation with a fresh id.
    pub fn new() -> Self {
        Self {
            id: generate_conversation_id(),
            title: "New conversation".to_string(),
            messages: Vec::new(),
            timestamp: now_millis(),
            category: default_category(),
        }
    }

    /// Append a message. The first user message sets the title.
    pub fn push_message(&mut self, msg: ChatMessage) {
        let derive_title = msg.is_user && !self.messages.iter().any(|m| m.is_user);
        if derive_title {
            self.title = derive_title_from(&msg.content);
        }
        self.messages.push(msg);
    }

    /// Drop the oldest messages beyond `limit`. `None` means unlimited.
    pub fn enforce_memory_limit(&mut self, limit: Option<usize>) {
        if let Some(limit) = limit {
            if self.messages.len() > limit {
                let excess = self.messages.len() - limit;
                self.messages.drain(0..excess);
            }
        }
    }

    /// Short single-line preview of the most recent message.
    pub fn preview(&self) -> String {
        let last = match self.messages.last() {
            Some(m) => m.content.replace('\n', " "),
            None => return "No messages".to_string(),
        };
        if last.chars().count() > PREVIEW_MAX_CHARS {
            let cut: String = last.chars().take(PREVIEW_MAX_CHARS).collect();
            format!("{}…", cut)
        } else {
            last
        }
    }

    /// Human-readable age of the conversation relative to `now` (millis).
    pub fn time_ago(&self, now: i64) -> String {
        let diff = now.saturating_sub(self.timestamp);
        let minutes = diff / 60_000;
        let hours = diff / 3_600_000;
        let days = diff / 86_400_000;
        if minutes < 1 {
            "Just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if hours < 24 {
            format!("{}h ago", hours)
        } else {
            format!("{}d ago", days)
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_title_from(content: &str) -> String {
    if content.chars().count() > TITLE_MAX_CHARS {
        let cut: String = content.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}…", cut)
    } else {
        content.to_string()
    }
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a unique conversation id in the `conv_<millis>_<suffix>` shape.
pub fn generate_conversation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("conv_{}_{}", now_millis(), &suffix[..9])
}

/// Format a message timestamp for display: `HH:MM` for today, full date
/// otherwise.
pub fn format_timestamp(millis: i64) -> String {
    let Some(ts) = Local.timestamp_millis_opt(millis).single() else {
        return String::new();
    };
    let today = Local::now().date_naive();
    if ts.date_naive() == today {
        ts.format("%H:%M").to_string()
    } else {
        ts.format("%d/%m/%Y %H:%M").to_string()
    }
}
