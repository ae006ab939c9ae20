//! Semchat terminal client
//!
//! Architecture:
//! - Main thread: reads commands from stdin and owns all application state
//! - Backend thread: performs sequential HTTP calls to the chat API
//! - Communication via crossbeam channels

use std::io::{self, BufRead, Write as _};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::error;

use semchat_client::api::ApiClient;
use semchat_client::backend::spawn_backend;
use semchat_client::commands;
use semchat_client::conversation::now_millis;
use semchat_client::events::{apply_event, process_events};
use semchat_client::export;
use semchat_client::format::format_message;
use semchat_client::logging::Logger;
use semchat_client::protocol::{BackendAction, UiEvent};
use semchat_client::render::{replay, Renderer};
use semchat_client::state::{ChatState, STATUS_MESSAGE_TTL_SECS};
use semchat_client::storage::{FileStorage, MemoryStorage, Storage};

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
/// How long to wait for a backend reply before giving the prompt back.
const REPLY_WAIT: Duration = Duration::from_secs(90);

/// What the REPL should do after handling a line.
enum Outcome {
    Done,
    /// A backend request went out; wait for its event.
    AwaitReply,
    Quit,
}

/// Renderer that prints formatted HTML to stdout.
struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn append_message(&mut self, html: &str, is_user: bool, _index: usize, timestamp: &str) {
        let who = if is_user { "you" } else { "bot" };
        if timestamp.is_empty() {
            println!("[{}] {}", who, html);
        } else {
            println!("[{} {}] {}", who, timestamp, html);
        }
    }

    fn clear(&mut self) {
        println!("----------------------------------------");
    }

    fn show_status(&mut self, text: &str) {
        println!("* {}", text);
    }
}

fn main() {
    env_logger::init();

    let base_url =
        std::env::var("SEMCHAT_API").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let mut storage: Box<dyn Storage> = match FileStorage::new() {
        Ok(s) => Box::new(s),
        Err(e) => {
            error!("Falling back to in-memory storage: {}", e);
            Box::new(MemoryStorage::new())
        }
    };
    let logger = Logger::new()
        .map_err(|e| error!("Transcript logging disabled: {}", e))
        .ok();

    let mut state = ChatState::load(storage.as_ref());
    let (action_tx, event_rx) = spawn_backend(ApiClient::new(&base_url));
    let mut renderer = TerminalRenderer;

    println!("semchat-client connected to {}", base_url);
    println!("Commands: /help for the list. Anything else is sent as a message.");

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let outcome = handle_line(
            &line,
            &mut state,
            storage.as_mut(),
            &action_tx,
            logger.as_ref(),
            &mut renderer,
        );

        match outcome {
            Outcome::Quit => break,
            Outcome::AwaitReply => {
                wait_for_reply(&mut state, storage.as_mut(), &event_rx, logger.as_ref());
                show_latest_reply(&state, &mut renderer);
            }
            Outcome::Done => {}
        }

        // Pick up anything else that queued in the meantime
        process_events(&mut state, storage.as_mut(), &event_rx, logger.as_ref());
        for (text, _) in &state.status_messages {
            renderer.show_status(text);
        }
        state.purge_old_status_messages(STATUS_MESSAGE_TTL_SECS);
    }

    let _ = action_tx.send(BackendAction::Shutdown);
    if let Err(e) = state.save_conversations(storage.as_mut()) {
        error!("Failed to save on exit: {}", e);
    }
}

/// Block until the backend answers the request we just sent.
fn wait_for_reply(
    state: &mut ChatState,
    storage: &mut dyn Storage,
    event_rx: &Receiver<UiEvent>,
    logger: Option<&Logger>,
) {
    match event_rx.recv_timeout(REPLY_WAIT) {
        Ok(event) => apply_event(state, storage, event, logger),
        Err(_) => state.push_status("No reply from the backend"),
    }
}

/// Print the newest bot message of the active conversation, if any.
fn show_latest_reply(state: &ChatState, renderer: &mut TerminalRenderer) {
    let Some(conv) = state.current() else { return };
    if let Some(last) = conv.messages.last() {
        if !last.is_user {
            renderer.append_message(
                &format_message(&last.content),
                false,
                conv.messages.len() - 1,
                "",
            );
        }
    }
}

/// Handle one input line.
fn handle_line(
    line: &str,
    state: &mut ChatState,
    storage: &mut dyn Storage,
    action_tx: &Sender<BackendAction>,
    logger: Option<&Logger>,
    renderer: &mut TerminalRenderer,
) -> Outcome {
    let (cmd, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    let result: Result<Outcome, String> = match cmd {
        "/quit" | "/exit" => Ok(Outcome::Quit),
        "/help" => {
            print_help();
            Ok(Outcome::Done)
        }
        "/login" => {
            commands::login(state, storage, action_tx, rest).map(|_| Outcome::AwaitReply)
        }
        "/new" => {
            state.start_new_conversation();
            renderer.clear();
            Ok(Outcome::Done)
        }
        "/list" => {
            let now = now_millis();
            for conv in state.conversations_sorted() {
                println!("{}  {}  ({})", conv.id, conv.title, conv.time_ago(now));
            }
            Ok(Outcome::Done)
        }
        "/open" => {
            if state.switch_to_conversation(rest) {
                let show_ts = state.settings.show_timestamps;
                if let Some(conv) = state.current() {
                    replay(renderer, conv, show_ts);
                }
                Ok(Outcome::Done)
            } else {
                Err(format!("No conversation {}", rest))
            }
        }
        "/delete" => {
            state.delete_conversation(rest);
            state.save_conversations(storage).map(|_| Outcome::Done)
        }
        "/search" => {
            for conv in state.filter_conversations(rest, "all") {
                println!("{}  {}  {}", conv.id, conv.title, conv.preview());
            }
            Ok(Outcome::Done)
        }
        "/reason" => {
            state.reason_active = rest == "on";
            Ok(Outcome::Done)
        }
        "/web" => {
            state.search_active = rest == "on";
            Ok(Outcome::Done)
        }
        "/model" => state.set_model(storage, rest).map(|_| Outcome::Done),
        "/edit" => match rest.split_once(' ') {
            Some((idx, text)) => idx
                .parse::<usize>()
                .map_err(|_| "Usage: /edit <n> <text>".to_string())
                .and_then(|i| commands::edit_message(state, storage, action_tx, i, text))
                .map(|_| Outcome::AwaitReply),
            None => Err("Usage: /edit <n> <text>".to_string()),
        },
        "/retry" => rest
            .parse::<usize>()
            .map_err(|_| "Usage: /retry <n>".to_string())
            .and_then(|i| commands::regenerate(state, storage, action_tx, i))
            .map(|_| Outcome::AwaitReply),
        "/fav" => {
            commands::remember_favorite(state, action_tx, rest).map(|_| Outcome::AwaitReply)
        }
        "/offline" => {
            state.set_offline(true);
            renderer.show_status("Offline mode on. Messages will be queued");
            Ok(Outcome::Done)
        }
        "/online" => commands::flush_offline_queue(state, action_tx).map(|count| {
            if count > 0 {
                Outcome::AwaitReply
            } else {
                Outcome::Done
            }
        }),
        "/export" => {
            if rest == "txt" {
                let all = state.conversations_sorted();
                println!("{}", export::export_text(&all, &state.settings));
                Ok(Outcome::Done)
            } else {
                export::export_json(&state.conversations, &state.settings)
                    .map(|json| {
                        println!("{}", json);
                        Outcome::Done
                    })
            }
        }
        "/share" => {
            if let Some(conv) = state.current() {
                println!("{}", export::share_text(conv));
            }
            Ok(Outcome::Done)
        }
        "/log" => {
            for entry in &state.system_log {
                println!("{}", entry);
            }
            Ok(Outcome::Done)
        }
        _ => commands::send_message(state, storage, action_tx, logger, line).map(|_| {
            if state.is_offline {
                Outcome::Done
            } else {
                Outcome::AwaitReply
            }
        }),
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            renderer.show_status(&e);
            Outcome::Done
        }
    }
}

fn print_help() {
    println!("/login <name>        set your name");
    println!("/new                 start a new conversation");
    println!("/list                list conversations");
    println!("/open <id>           switch conversation");
    println!("/delete <id>         delete a conversation");
    println!("/search <text>       search conversations");
    println!("/reason on|off       toggle deep thinking");
    println!("/web on|off          toggle online search");
    println!("/model <name>        choose the model");
    println!("/edit <n> <text>     edit message n and resend");
    println!("/retry <n>           regenerate the reply to message n");
    println!("/fav <text>          save a favorite snippet");
    println!("/offline | /online   toggle offline mode");
    println!("/export [txt]        print conversations as JSON or text");
    println!("/share               print the current conversation as text");
    println!("/log                 show the system log");
    println!("/quit                exit");
}
