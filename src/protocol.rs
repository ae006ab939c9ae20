//! Channel protocol between the UI-side state and the backend worker.

use crate::conversation::ChatMessage;

/// A chat request as posted to the `/chat` endpoint.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation the eventual reply belongs to.
    pub conversation_id: String,
    pub message: String,
    /// Full history, including the message being sent.
    pub history: Vec<ChatMessage>,
    pub user_name: String,
    pub deep_thinking: bool,
    /// Run an online search first and append its summary to the message.
    pub online_search: bool,
    pub model: String,
    pub system_prompt: String,
}

/// Actions sent from the UI to the backend worker.
#[derive(Debug, Clone)]
pub enum BackendAction {
    /// Post a message to the chat endpoint.
    SendChat(ChatRequest),
    /// Announce the user to the backend.
    Login { name: String },
    /// Save a snippet to the user's favorites.
    AddFavorite { name: String, item: String },
    /// Stop the worker loop.
    Shutdown,
}

/// Events sent from the backend worker to the UI.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Login acknowledged; `message` is the server greeting.
    LoggedIn { message: String },
    /// A chat reply arrived.
    ResponseReceived {
        conversation_id: String,
        response: String,
        reasoning: Option<String>,
    },
    /// The server rate-limited us; retry after this many seconds.
    RateLimited { retry_after: u64 },
    /// Favorite snippet stored.
    FavoriteSaved,
    /// Any request failure.
    Error(String),
}
