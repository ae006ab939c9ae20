//! Semchat client library.
//!
//! Core of a chat client: a markdown-to-HTML text formatter, conversation
//! state with pluggable persistence, and a channel-driven HTTP backend.
//! Hosts bring their own display surface through the `Renderer` trait.

pub mod api;
pub mod backend;
pub mod commands;
pub mod conversation;
pub mod events;
pub mod export;
pub mod format;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod settings;
pub mod state;
pub mod storage;
pub mod validation;
