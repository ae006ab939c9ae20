//! Conversation export, import and sharing.
//!
//! The JSON envelope keeps the browser client's field names (`exportDate`,
//! camelCase message fields) so files move between both clients.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::{now_millis, Conversation};
use crate::settings::Settings;

const EXPORT_VERSION: &str = "1.0";

/// Versioned export envelope.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExportEnvelope {
    pub version: String,
    #[serde(rename = "exportDate")]
    pub export_date: String,
    pub conversations: HashMap<String, Conversation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// Outcome of a merge import.
#[derive(Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Serialize all conversations (and settings) to pretty JSON.
pub fn export_json(
    conversations: &HashMap<String, Conversation>,
    settings: &Settings,
) -> Result<String, String> {
    let envelope = ExportEnvelope {
        version: EXPORT_VERSION.to_string(),
        export_date: Utc::now().to_rfc3339(),
        conversations: conversations.clone(),
        settings: Some(settings.clone()),
    };
    serde_json::to_string_pretty(&envelope).map_err(|e| format!("Export failed: {}", e))
}

/// Render all conversations as a plain-text document, honoring the export
/// settings for timestamps and reasoning.
pub fn export_text(conversations: &[&Conversation], settings: &Settings) -> String {
    let mut text = String::new();
    text.push_str("Semchat Conversation Export\n");
    text.push_str(&format!("Export Date: {}\n", Utc::now().to_rfc3339()));
    text.push_str("=====================================\n\n");

    for conv in conversations {
        text.push_str(&format!("Conversation: {}\n", conv.title));
        text.push_str(&format!("Messages: {}\n", conv.messages.len()));
        text.push_str("-------------------------------------\n");

        for msg in &conv.messages {
            let role = if msg.is_user { "You" } else { "AI" };
            let mut content = msg.content.clone();
            if settings.export_timestamps {
                content = format!(
                    "[{}] {}",
                    crate::conversation::format_timestamp(msg.timestamp),
                    content
                );
            }
            if settings.export_reasoning {
                if let Some(reasoning) = &msg.reasoning {
                    content.push_str(&format!("\n[Reasoning: {}]", reasoning));
                }
            }
            text.push_str(&format!("{}: {}\n\n", role, content));
        }

        text.push_str("=====================================\n\n");
    }
    text
}

/// Merge conversations from an export file into the given map. Existing ids
/// are skipped, never overwritten.
pub fn import_json(
    conversations: &mut HashMap<String, Conversation>,
    data: &str,
) -> Result<ImportSummary, String> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| format!("Not valid JSON: {}", e))?;

    let incoming = value
        .get("conversations")
        .and_then(Value::as_object)
        .ok_or_else(|| "Invalid format: conversations object not found".to_string())?;
    if incoming.is_empty() {
        return Err("No conversations found in file".to_string());
    }

    // Validate everything before touching state
    for (id, conv) in incoming {
        if !conv.get("messages").map_or(false, Value::is_array) {
            return Err(format!("Invalid conversation {}: messages array not found", id));
        }
        if !conv.get("title").map_or(false, Value::is_string) {
            return Err(format!("Invalid conversation {}: title not found", id));
        }
    }

    let mut imported = 0;
    let mut skipped = 0;
    for (id, raw) in incoming {
        if conversations.contains_key(id) {
            skipped += 1;
            continue;
        }
        let mut conv: Conversation = serde_json::from_value(normalize(id, raw.clone()))
            .map_err(|e| format!("Invalid conversation {}: {}", id, e))?;
        conv.id = id.clone();
        conversations.insert(id.clone(), conv);
        imported += 1;
    }

    Ok(ImportSummary { imported, skipped })
}

/// Fill the optional envelope fields older exports may lack.
fn normalize(id: &str, mut raw: Value) -> Value {
    if let Some(obj) = raw.as_object_mut() {
        obj.entry("id").or_insert_with(|| Value::from(id));
        obj.entry("timestamp").or_insert_with(|| Value::from(now_millis()));
    }
    raw
}

/// Render a single conversation as shareable text.
pub fn share_text(conv: &Conversation) -> String {
    let body: Vec<String> = conv
        .messages
        .iter()
        .map(|m| {
            format!(
                "{}: {}",
                if m.is_user { "User" } else { "Semchat" },
                m.content
            )
        })
        .collect();
    format!(
        "Semchat Conversation: {}\n\n{}\n\nShared from Semchat",
        conv.title,
        body.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatMessage;

    fn sample() -> HashMap<String, Conversation> {
        let mut conv = Conversation::new();
        conv.push_message(ChatMessage::user("what is rust"));
        conv.push_message(ChatMessage::bot("a language", Some("recalled docs".into())));
        let mut map = HashMap::new();
        map.insert(conv.id.clone(), conv);
        map
    }

    #[test]
    fn test_json_roundtrip() {
        let original = sample();
        let json = export_json(&original, &Settings::default()).unwrap();

        let mut restored = HashMap::new();
        let summary = import_json(&mut restored, &json).unwrap();
        assert_eq!(summary, ImportSummary { imported: 1, skipped: 0 });

        let (id, conv) = original.iter().next().unwrap();
        assert_eq!(restored[id].messages, conv.messages);
        assert_eq!(restored[id].title, conv.title);
    }

    #[test]
    fn test_import_skips_existing() {
        let mut existing = sample();
        let json = export_json(&existing.clone(), &Settings::default()).unwrap();
        let summary = import_json(&mut existing, &json).unwrap();
        assert_eq!(summary, ImportSummary { imported: 0, skipped: 1 });
    }

    #[test]
    fn test_import_rejects_bad_structure() {
        let mut map = HashMap::new();
        assert!(import_json(&mut map, "not json").is_err());
        assert!(import_json(&mut map, r#"{"foo": 1}"#).is_err());
        assert!(import_json(&mut map, r#"{"conversations": {}}"#).is_err());
        assert!(import_json(
            &mut map,
            r#"{"conversations": {"c1": {"title": "t"}}}"#
        )
        .is_err());
        assert!(import_json(
            &mut map,
            r#"{"conversations": {"c1": {"messages": []}}}"#
        )
        .is_err());
        assert!(map.is_empty());
    }

    #[test]
    fn test_import_fills_missing_timestamp_and_id() {
        let mut map = HashMap::new();
        let summary = import_json(
            &mut map,
            r#"{"conversations": {"c1": {"title": "old export", "messages": []}}}"#,
        )
        .unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(map["c1"].id, "c1");
        assert!(map["c1"].timestamp > 0);
        assert_eq!(map["c1"].category, "general");
    }

    #[test]
    fn test_text_export_honors_settings() {
        let map = sample();
        let conversations: Vec<&Conversation> = map.values().collect();

        let mut settings = Settings::default();
        let full = export_text(&conversations, &settings);
        assert!(full.contains("You: ["));
        assert!(full.contains("[Reasoning: recalled docs]"));

        settings.export_timestamps = false;
        settings.export_reasoning = false;
        let bare = export_text(&conversations, &settings);
        assert!(bare.contains("You: what is rust"));
        assert!(!bare.contains("[Reasoning:"));
    }

    #[test]
    fn test_share_text_layout() {
        let map = sample();
        let conv = map.values().next().unwrap();
        let text = share_text(conv);
        assert!(text.starts_with("Semchat Conversation: what is rust"));
        assert!(text.contains("User: what is rust"));
        assert!(text.contains("Semchat: a language"));
        assert!(text.ends_with("Shared from Semchat"));
    }
}
