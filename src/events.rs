//! Applies backend events to application state.

use chrono::Local;
use crossbeam_channel::Receiver;
use log::warn;

use crate::conversation::ChatMessage;
use crate::logging::{LogEntry, Logger};
use crate::protocol::UiEvent;
use crate::state::ChatState;
use crate::storage::Storage;

/// Drain all pending backend events into the state. Called once per host
/// loop iteration; never blocks.
pub fn process_events(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    event_rx: &Receiver<UiEvent>,
    logger: Option<&Logger>,
) {
    while let Ok(event) = event_rx.try_recv() {
        apply_event(state, storage, event, logger);
    }
}

/// Apply a single backend event to the state.
pub fn apply_event(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    event: UiEvent,
    logger: Option<&Logger>,
) {
    match event {
        UiEvent::ResponseReceived {
            conversation_id,
            response,
            reasoning,
        } => {
            let limit = state.settings.memory_limit;
            let Some(conv) = state.conversations.get_mut(&conversation_id) else {
                // Conversation was deleted while the request was in flight
                warn!("dropping reply for unknown conversation {}", conversation_id);
                return;
            };
            conv.push_message(ChatMessage::bot(&response, reasoning));
            conv.enforce_memory_limit(limit);

            if let Some(logger) = logger {
                logger.log(LogEntry {
                    conversation: conversation_id,
                    timestamp: Local::now().format("%H:%M").to_string(),
                    sender: "assistant".to_string(),
                    message: response,
                });
            }

            if state.settings.auto_save {
                if let Err(e) = state.save_conversations(storage) {
                    state.push_system_log(format!("Auto-save failed: {}", e));
                }
            }
        }
        UiEvent::RateLimited { retry_after } => {
            state.arm_rate_limit(retry_after);
            state.push_status(format!(
                "Rate limited, retry in {}s",
                retry_after
            ));
            state.push_system_log(format!("Rate limited for {}s", retry_after));
        }
        UiEvent::LoggedIn { message } => {
            state.push_status(message.clone());
            state.push_system_log(message);
        }
        UiEvent::FavoriteSaved => {
            state.push_status("Added to favorites");
        }
        UiEvent::Error(message) => {
            state.push_status(message.clone());
            state.push_system_log(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crossbeam_channel::unbounded;

    fn deliver(state: &mut ChatState, storage: &mut MemoryStorage, event: UiEvent) {
        let (tx, rx) = unbounded();
        tx.send(event).unwrap();
        process_events(state, storage, &rx, None);
    }

    #[test]
    fn test_response_appends_bot_message() {
        let mut state = ChatState::new();
        let mut storage = MemoryStorage::new();
        let id = state.current_conversation.clone();

        deliver(
            &mut state,
            &mut storage,
            UiEvent::ResponseReceived {
                conversation_id: id.clone(),
                response: "hi there".to_string(),
                reasoning: Some("thought".to_string()),
            },
        );

        let conv = state.current().unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert!(!conv.messages[0].is_user);
        assert_eq!(conv.messages[0].content, "hi there");
        assert_eq!(conv.messages[0].reasoning.as_deref(), Some("thought"));
        // auto_save defaults on, so the reply was persisted
        assert!(storage.get(crate::storage::keys::CONVERSATIONS).is_some());
    }

    #[test]
    fn test_reply_for_deleted_conversation_is_dropped() {
        let mut state = ChatState::new();
        let mut storage = MemoryStorage::new();
        deliver(
            &mut state,
            &mut storage,
            UiEvent::ResponseReceived {
                conversation_id: "conv_gone".to_string(),
                response: "orphan".to_string(),
                reasoning: None,
            },
        );
        assert!(state.current().unwrap().messages.is_empty());
    }

    #[test]
    fn test_rate_limit_event_arms_countdown() {
        let mut state = ChatState::new();
        let mut storage = MemoryStorage::new();
        deliver(
            &mut state,
            &mut storage,
            UiEvent::RateLimited { retry_after: 45 },
        );
        assert!(!state.can_send());
        assert!(!state.status_messages.is_empty());
    }

    #[test]
    fn test_error_event_is_logged() {
        let mut state = ChatState::new();
        let mut storage = MemoryStorage::new();
        let before = state.system_log.len();
        deliver(
            &mut state,
            &mut storage,
            UiEvent::Error("Request failed: timeout".to_string()),
        );
        assert_eq!(state.system_log.len(), before + 1);
        assert!(state.system_log.last().unwrap().contains("timeout"));
    }

    #[test]
    fn test_memory_limit_applied_to_replies() {
        let mut state = ChatState::new();
        let mut storage = MemoryStorage::new();
        state.settings.memory_limit = Some(2);
        let id = state.current_conversation.clone();
        for i in 0..4 {
            deliver(
                &mut state,
                &mut storage,
                UiEvent::ResponseReceived {
                    conversation_id: id.clone(),
                    response: format!("reply {}", i),
                    reasoning: None,
                },
            );
        }
        let conv = state.current().unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].content, "reply 2");
    }
}
