//! Transcript persistence layer
//!
//! Provides file-based logging of chat messages organized per conversation.
//! Transcripts are stored in XDG_DATA_HOME/semchat-client/logs/ with the
//! structure: logs/conversation/YYYY-MM-DD.log

use chrono::Local;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// A transcript entry to be written to disk
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub conversation: String,
    pub timestamp: String,
    pub sender: String,
    pub message: String,
}

/// Logger writes transcripts without blocking the host thread
pub struct Logger {
    /// Channel to send entries to the background thread
    tx: Sender<LogEntry>,
}

impl Logger {
    /// Create a new logger and spawn background thread for async I/O
    pub fn new() -> Result<Self, String> {
        Self::with_dir(default_log_directory()?)
    }

    /// Create a logger writing under an explicit directory (used in tests)
    pub fn with_dir(log_dir: PathBuf) -> Result<Self, String> {
        fs::create_dir_all(&log_dir)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;

        let (tx, rx) = unbounded::<LogEntry>();

        thread::spawn(move || {
            run_logger_thread(rx, log_dir);
        });

        Ok(Self { tx })
    }

    /// Log a message (non-blocking, queued for background writing)
    pub fn log(&self, entry: LogEntry) {
        // If send fails, the logger thread has stopped - silently ignore
        let _ = self.tx.send(entry);
    }
}

/// Background thread that handles all file I/O
fn run_logger_thread(rx: Receiver<LogEntry>, log_dir: PathBuf) {
    // Cache of open file handles to avoid reopening files constantly
    let mut file_cache: HashMap<String, BufWriter<File>> = HashMap::new();

    while let Ok(entry) = rx.recv() {
        if let Err(e) = write_log_entry(&mut file_cache, &log_dir, &entry) {
            eprintln!("Logger error: {}", e);
        }
    }

    // Flush all cached files on shutdown
    for (_, mut writer) in file_cache.drain() {
        let _ = writer.flush();
    }
}

/// Write a single entry to the appropriate daily file
fn write_log_entry(
    file_cache: &mut HashMap<String, BufWriter<File>>,
    log_dir: &std::path::Path,
    entry: &LogEntry,
) -> Result<(), String> {
    let date = Local::now().format("%Y-%m-%d").to_string();
    let conversation = sanitize_filename(&entry.conversation);

    let conv_dir = log_dir.join(&conversation);
    fs::create_dir_all(&conv_dir)
        .map_err(|e| format!("Failed to create conversation directory: {}", e))?;

    let log_file_path = conv_dir.join(format!("{}.log", date));
    let cache_key = format!("{}/{}", conversation, date);

    let writer = if let Some(w) = file_cache.get_mut(&cache_key) {
        w
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file_path)
            .map_err(|e| format!("Failed to open log file: {}", e))?;

        file_cache.insert(cache_key.clone(), BufWriter::new(file));
        file_cache.get_mut(&cache_key).unwrap()
    };

    // Format: [HH:MM] <Sender> Message
    writeln!(writer, "[{}] <{}> {}", entry.timestamp, entry.sender, entry.message)
        .map_err(|e| format!("Failed to write log entry: {}", e))?;

    writer.flush()
        .map_err(|e| format!("Failed to flush log: {}", e))?;

    Ok(())
}

/// Platform-specific transcript directory using XDG conventions
fn default_log_directory() -> Result<PathBuf, String> {
    let base = directories::BaseDirs::new()
        .ok_or("Failed to determine home directory")?;
    Ok(base.data_dir().join("semchat-client").join("logs"))
}

/// Sanitize a conversation id to be filesystem-safe
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
