//! User-initiated operations.
//!
//! Each command mutates `ChatState`, persists what needs persisting, and
//! hands network work to the backend over its action channel. Commands
//! validate first and return `Err` with a user-facing message on refusal.

use chrono::Local;
use crossbeam_channel::Sender;

use crate::conversation::ChatMessage;
use crate::logging::{LogEntry, Logger};
use crate::protocol::{BackendAction, ChatRequest};
use crate::state::ChatState;
use crate::storage::Storage;
use crate::validation::{validate_message, validate_user_name};

/// Send a message from the active conversation.
///
/// The message is appended to the conversation immediately; while offline it
/// is additionally queued for delivery instead of going to the backend.
pub fn send_message(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    action_tx: &Sender<BackendAction>,
    logger: Option<&Logger>,
    text: &str,
) -> Result<(), String> {
    let text = text.trim();
    validate_message(text)?;

    if let Some(left) = state.rate_limit_remaining() {
        return Err(format!("Rate limited. Try again in {}s", left));
    }

    let limit = state.settings.memory_limit;
    let conv = state
        .current_mut()
        .ok_or_else(|| "No active conversation".to_string())?;
    conv.push_message(ChatMessage::user(text));
    conv.enforce_memory_limit(limit);
    let conversation_id = conv.id.clone();

    if let Some(logger) = logger {
        logger.log(LogEntry {
            conversation: conversation_id.clone(),
            timestamp: Local::now().format("%H:%M").to_string(),
            sender: "user".to_string(),
            message: text.to_string(),
        });
    }

    if state.settings.auto_save {
        state.save_conversations(storage)?;
    }

    if state.is_offline {
        state.queue_offline(text);
        state.push_status("Offline. Message queued");
        return Ok(());
    }

    dispatch_chat(state, action_tx, text.to_string())
}

/// Replace a user message and resend it, discarding everything after it.
pub fn edit_message(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    action_tx: &Sender<BackendAction>,
    index: usize,
    new_text: &str,
) -> Result<(), String> {
    let new_text = new_text.trim();
    validate_message(new_text)?;

    let conv = state
        .current_mut()
        .ok_or_else(|| "No active conversation".to_string())?;
    let msg = conv
        .messages
        .get_mut(index)
        .ok_or_else(|| "No such message".to_string())?;
    if !msg.is_user {
        return Err("Only your own messages can be edited".to_string());
    }
    msg.content = new_text.to_string();
    // Drop the old reply and anything after it
    conv.messages.truncate(index + 1);

    if state.settings.auto_save {
        state.save_conversations(storage)?;
    }
    dispatch_chat(state, action_tx, new_text.to_string())
}

/// Drop the reply to a user message and request a fresh one.
pub fn regenerate(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    action_tx: &Sender<BackendAction>,
    user_index: usize,
) -> Result<(), String> {
    let conv = state
        .current_mut()
        .ok_or_else(|| "No active conversation".to_string())?;
    let msg = conv
        .messages
        .get(user_index)
        .ok_or_else(|| "No such message".to_string())?;
    if !msg.is_user {
        return Err("Can only regenerate from one of your messages".to_string());
    }
    let text = msg.content.clone();
    conv.messages.truncate(user_index + 1);

    if state.settings.auto_save {
        state.save_conversations(storage)?;
    }
    dispatch_chat(state, action_tx, text)
}

/// Set the display name and announce it to the backend.
pub fn login(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    action_tx: &Sender<BackendAction>,
    name: &str,
) -> Result<(), String> {
    let name = name.trim();
    validate_user_name(name)?;
    state.set_user_name(storage, name)?;
    action_tx
        .send(BackendAction::Login {
            name: name.to_string(),
        })
        .map_err(|_| "Backend is not running".to_string())
}

/// Save a snippet to the logged-in user's favorites.
pub fn remember_favorite(
    state: &ChatState,
    action_tx: &Sender<BackendAction>,
    item: &str,
) -> Result<(), String> {
    let name = state
        .user_name
        .clone()
        .ok_or_else(|| "Set your name before saving favorites".to_string())?;
    if item.trim().is_empty() {
        return Err("Nothing to save".to_string());
    }
    action_tx
        .send(BackendAction::AddFavorite {
            name,
            item: item.to_string(),
        })
        .map_err(|_| "Backend is not running".to_string())
}

/// Come back online and deliver queued messages in order. Returns how many
/// were flushed.
pub fn flush_offline_queue(
    state: &mut ChatState,
    action_tx: &Sender<BackendAction>,
) -> Result<usize, String> {
    state.set_offline(false);
    let queued = state.take_offline_queue();
    let count = queued.len();
    for msg in queued {
        dispatch_chat(state, action_tx, msg.text)?;
    }
    if count > 0 {
        state.push_status(format!("Back online. Sent {} queued message(s)", count));
    }
    Ok(count)
}

/// Build the chat request from current state and hand it to the backend.
/// The message itself is already part of the conversation history.
fn dispatch_chat(
    state: &ChatState,
    action_tx: &Sender<BackendAction>,
    message: String,
) -> Result<(), String> {
    let conv = state
        .current()
        .ok_or_else(|| "No active conversation".to_string())?;
    let req = ChatRequest {
        conversation_id: conv.id.clone(),
        message,
        history: conv.messages.clone(),
        user_name: state
            .user_name
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string()),
        deep_thinking: state.reason_active,
        online_search: state.search_active,
        model: state.current_model.clone(),
        system_prompt: state.settings.user_system_prompt.clone(),
    };
    action_tx
        .send(BackendAction::SendChat(req))
        .map_err(|_| "Backend is not running".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crossbeam_channel::unbounded;

    fn setup() -> (
        ChatState,
        MemoryStorage,
        Sender<BackendAction>,
        crossbeam_channel::Receiver<BackendAction>,
    ) {
        let (tx, rx) = unbounded();
        (ChatState::new(), MemoryStorage::new(), tx, rx)
    }

    #[test]
    fn test_send_message_pushes_and_dispatches() {
        let (mut state, mut storage, tx, rx) = setup();
        state.reason_active = true;
        send_message(&mut state, &mut storage, &tx, None, "hello world").unwrap();

        let conv = state.current().unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.messages[0].is_user);
        assert_eq!(conv.title, "hello world");

        match rx.try_recv().unwrap() {
            BackendAction::SendChat(req) => {
                assert_eq!(req.message, "hello world");
                assert_eq!(req.history.len(), 1);
                assert_eq!(req.user_name, "Anonymous");
                assert!(req.deep_thinking);
                assert!(!req.online_search);
            }
            other => panic!("expected SendChat, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let (mut state, mut storage, tx, rx) = setup();
        assert!(send_message(&mut state, &mut storage, &tx, None, "   ").is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rate_limited_send_is_refused() {
        let (mut state, mut storage, tx, rx) = setup();
        state.arm_rate_limit(30);
        let err = send_message(&mut state, &mut storage, &tx, None, "hi").unwrap_err();
        assert!(err.contains("Rate limited"));
        assert!(rx.try_recv().is_err());
        assert!(state.current().unwrap().messages.is_empty());
    }

    #[test]
    fn test_offline_send_queues_instead() {
        let (mut state, mut storage, tx, rx) = setup();
        state.set_offline(true);
        send_message(&mut state, &mut storage, &tx, None, "later").unwrap();

        assert_eq!(state.offline_queue.len(), 1);
        assert!(rx.try_recv().is_err());
        // The message is still recorded in the conversation
        assert_eq!(state.current().unwrap().messages.len(), 1);
    }

    #[test]
    fn test_flush_offline_queue_sends_in_order() {
        let (mut state, mut storage, tx, rx) = setup();
        state.set_offline(true);
        send_message(&mut state, &mut storage, &tx, None, "first").unwrap();
        send_message(&mut state, &mut storage, &tx, None, "second").unwrap();

        let flushed = flush_offline_queue(&mut state, &tx).unwrap();
        assert_eq!(flushed, 2);
        assert!(!state.is_offline);

        match rx.try_recv().unwrap() {
            BackendAction::SendChat(req) => assert_eq!(req.message, "first"),
            other => panic!("expected SendChat, got {:?}", other),
        }
        match rx.try_recv().unwrap() {
            BackendAction::SendChat(req) => assert_eq!(req.message, "second"),
            other => panic!("expected SendChat, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_truncates_and_resends() {
        let (mut state, mut storage, tx, rx) = setup();
        let conv = state.current_mut().unwrap();
        conv.push_message(ChatMessage::user("original"));
        conv.push_message(ChatMessage::bot("old reply", None));
        conv.push_message(ChatMessage::user("followup"));

        edit_message(&mut state, &mut storage, &tx, 0, "revised").unwrap();

        let conv = state.current().unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].content, "revised");
        match rx.try_recv().unwrap() {
            BackendAction::SendChat(req) => assert_eq!(req.message, "revised"),
            other => panic!("expected SendChat, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_refuses_bot_message() {
        let (mut state, mut storage, tx, _rx) = setup();
        state
            .current_mut()
            .unwrap()
            .push_message(ChatMessage::bot("reply", None));
        assert!(edit_message(&mut state, &mut storage, &tx, 0, "nope").is_err());
    }

    #[test]
    fn test_regenerate_drops_reply_and_resends() {
        let (mut state, mut storage, tx, rx) = setup();
        let conv = state.current_mut().unwrap();
        conv.push_message(ChatMessage::user("question"));
        conv.push_message(ChatMessage::bot("weak answer", None));

        regenerate(&mut state, &mut storage, &tx, 0).unwrap();

        let conv = state.current().unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].content, "question");
        match rx.try_recv().unwrap() {
            BackendAction::SendChat(req) => assert_eq!(req.message, "question"),
            other => panic!("expected SendChat, got {:?}", other),
        }
    }

    #[test]
    fn test_login_persists_name() {
        let (mut state, mut storage, tx, rx) = setup();
        login(&mut state, &mut storage, &tx, "alice").unwrap();
        assert_eq!(state.user_name.as_deref(), Some("alice"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            BackendAction::Login { .. }
        ));
    }

    #[test]
    fn test_favorite_requires_login() {
        let (state, _storage, tx, _rx) = setup();
        assert!(remember_favorite(&state, &tx, "snippet").is_err());
    }
}
