//! HTTP client for the chat backend API.
//!
//! Sync client over `ureq`; every call is a single request/response
//! exchange. Rate limiting (HTTP 429 with a `rate_limited` body) gets its
//! own error variant so callers can start the retry countdown.

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::json;
use ureq::Agent;

use crate::protocol::ChatRequest;

/// Default HTTP timeout in seconds. Chat with search enabled can be slow.
const DEFAULT_TIMEOUT: u64 = 60;
/// Fallback retry delay when a 429 carries no `retry_after`.
const DEFAULT_RETRY_AFTER: u64 = 60;
/// Maximum search results folded into the outgoing message.
const MAX_SEARCH_RESULTS: usize = 5;

/// Error from chat API operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure (connection refused, timeout, bad TLS, bad JSON).
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] ureq::Error),

    /// Server returned an error status.
    #[error("HTTP error {status}: {body}")]
    HttpResponse { status: u16, body: String },

    /// Server rate-limited the request.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
}

/// A reply from the `/chat` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub reasoning_process: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    rate_limited: bool,
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    content: String,
}

/// Chat backend REST client.
pub struct ApiClient {
    agent: Agent,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Post a chat message and return the model's reply.
    pub fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let payload = json!({
            "message": req.message,
            "conversation_history": req.history,
            "user_name": req.user_name,
            "deep_thinking": req.deep_thinking,
            "online_search": req.online_search,
            "model": req.model,
            "system_prompt": req.system_prompt,
        });

        debug!("POST /chat ({} history messages)", req.history.len());

        let response = self
            .agent
            .post(&self.url("/chat"))
            .header("Content-Type", "application/json")
            .send_json(&payload)?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            return Err(error_from(status, &read_error_body(&mut body)));
        }
        Ok(body.read_json()?)
    }

    /// Announce the user; returns the server greeting.
    pub fn login(&self, name: &str) -> Result<String, ApiError> {
        debug!("POST /login for {}", name);

        let response = self
            .agent
            .post(&self.url("/login"))
            .header("Content-Type", "application/json")
            .send_json(&json!({ "name": name }))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            return Err(error_from(status, &read_error_body(&mut body)));
        }
        let login: LoginResponse = body.read_json()?;
        Ok(login.message.unwrap_or_else(|| "Welcome".to_string()))
    }

    /// Save a snippet to the user's favorites.
    pub fn add_favorite(&self, name: &str, item: &str) -> Result<(), ApiError> {
        let response = self
            .agent
            .post(&self.url("/add_favorite"))
            .header("Content-Type", "application/json")
            .send_json(&json!({ "name": name, "item": item }))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            return Err(error_from(status, &read_error_body(&mut body)));
        }
        Ok(())
    }

    /// Run an online search and return a summary block ready to append to an
    /// outgoing message. Empty string when there are no results.
    pub fn online_search(&self, query: &str) -> Result<String, ApiError> {
        let response = self
            .agent
            .post(&self.url("/online_search"))
            .header("Content-Type", "application/json")
            .send_json(&json!({ "query": query }))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            return Err(error_from(status, &read_error_body(&mut body)));
        }
        let search: SearchResponse = body.read_json()?;
        Ok(summarize_results(&search))
    }
}

fn read_error_body(body: &mut ureq::Body) -> String {
    body.read_to_string()
        .unwrap_or_else(|_| "(unable to read error body)".to_string())
}

/// Map an error status plus body text to the right `ApiError`.
fn error_from(status: u16, body: &str) -> ApiError {
    if status == 429 {
        if let Ok(info) = serde_json::from_str::<RateLimitBody>(body) {
            if info.rate_limited {
                return ApiError::RateLimited {
                    retry_after: info.retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
                };
            }
        }
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| body.to_string());
    ApiError::HttpResponse {
        status,
        body: message,
    }
}

fn summarize_results(search: &SearchResponse) -> String {
    let items: Vec<String> = search
        .results
        .iter()
        .take(MAX_SEARCH_RESULTS)
        .map(|r| format!("- {}", r.content))
        .collect();
    if items.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nOnline search results (summary):\n{}",
            items.join("\n")
        )
    }
}
