//! Backend worker thread.
//!
//! Owns the HTTP client and performs all network calls sequentially,
//! draining `BackendAction`s and reporting `UiEvent`s back to the host.
//! The loop never panics on request failure; every error becomes an event.

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::protocol::{BackendAction, ChatRequest, UiEvent};

/// Spawn the backend worker and return its channel endpoints.
pub fn spawn_backend(api: ApiClient) -> (Sender<BackendAction>, Receiver<UiEvent>) {
    let (action_tx, action_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    thread::Builder::new()
        .name("backend".to_string())
        .spawn(move || run_backend(action_rx, event_tx, api))
        .expect("failed to spawn backend thread");
    (action_tx, event_rx)
}

/// Worker loop. Returns when `Shutdown` arrives or the action channel closes.
pub fn run_backend(
    action_rx: Receiver<BackendAction>,
    event_tx: Sender<UiEvent>,
    api: ApiClient,
) {
    info!("Backend worker started");

    while let Ok(action) = action_rx.recv() {
        match action {
            BackendAction::SendChat(req) => handle_chat(&api, &event_tx, req),
            BackendAction::Login { name } => {
                let event = match api.login(&name) {
                    Ok(message) => UiEvent::LoggedIn { message },
                    Err(e) => UiEvent::Error(format!("Login failed: {}", e)),
                };
                let _ = event_tx.send(event);
            }
            BackendAction::AddFavorite { name, item } => {
                let event = match api.add_favorite(&name, &item) {
                    Ok(()) => UiEvent::FavoriteSaved,
                    Err(e) => UiEvent::Error(format!("Could not save favorite: {}", e)),
                };
                let _ = event_tx.send(event);
            }
            BackendAction::Shutdown => {
                debug!("Backend worker shutting down");
                break;
            }
        }
    }

    info!("Backend worker stopped");
}

/// Run one chat exchange: optional online search first, then the chat post.
fn handle_chat(api: &ApiClient, event_tx: &Sender<UiEvent>, mut req: ChatRequest) {
    if req.online_search {
        // Search failure is soft; the message still goes out unaugmented.
        match api.online_search(&req.message) {
            Ok(summary) if !summary.is_empty() => req.message.push_str(&summary),
            Ok(_) => debug!("online search returned no results"),
            Err(e) => warn!("online search failed: {}", e),
        }
    }

    let event = match api.chat(&req) {
        Ok(reply) => UiEvent::ResponseReceived {
            conversation_id: req.conversation_id,
            response: reply.response,
            reasoning: reply.reasoning_process,
        },
        Err(ApiError::RateLimited { retry_after }) => UiEvent::RateLimited { retry_after },
        Err(e) => UiEvent::Error(format!("Request failed: {}", e)),
    };
    let _ = event_tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_client() -> ApiClient {
        // Points at a closed port; tests below never reach the network.
        ApiClient::new("http://127.0.0.1:1")
    }

    #[test]
    fn test_shutdown_stops_worker() {
        let (action_tx, event_rx) = spawn_backend(test_client());
        action_tx.send(BackendAction::Shutdown).unwrap();
        // Worker exits and drops its event sender
        assert!(event_rx
            .recv_timeout(Duration::from_secs(5))
            .is_err());
    }

    #[test]
    fn test_closed_action_channel_stops_worker() {
        let (action_tx, event_rx) = spawn_backend(test_client());
        drop(action_tx);
        assert!(event_rx
            .recv_timeout(Duration::from_secs(5))
            .is_err());
    }

    #[test]
    fn test_unreachable_server_reports_error_event() {
        let (action_tx, event_rx) = spawn_backend(test_client());
        action_tx
            .send(BackendAction::Login {
                name: "alice".to_string(),
            })
            .unwrap();
        match event_rx.recv_timeout(Duration::from_secs(30)) {
            Ok(UiEvent::Error(msg)) => assert!(msg.contains("Login failed")),
            other => panic!("expected Error event, got {:?}", other),
        }
        action_tx.send(BackendAction::Shutdown).unwrap();
    }
}
