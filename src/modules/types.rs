use derive_more::with_trait::Display;
use serde::{Deserialize, Serialize};

pub const DEFAULT_START_BATCH: i64 = 1;
pub const DEFAULT_END_BATCH: i64 = 10;

#[derive(Debug, Deserialize, Clone, Copy, Display, Serialize, PartialEq, Eq, Default)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    #[display("info")]
    Info,
    #[display("success")]
    Success,
    #[display("warning")]
    Warning,
    #[display("error")]
    Error,
}

impl From<String> for LogLevel {
    fn from(level: String) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "success" => LogLevel::Success,
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Display, Serialize, PartialEq, Eq)]
#[display("[{timestamp}] {message}")]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
        }
    }

    /// Entry stamped with the local wall clock (`HH:MM:SS`).
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(level, clock_stamp(), message)
    }
}

pub fn clock_stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, Display, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[display("Batch {start_batch} to {end_batch}")]
pub struct RunRequest {
    #[serde(default = "default_start_batch")]
    pub start_batch: i64,
    #[serde(default = "default_end_batch")]
    pub end_batch: i64,
}

fn default_start_batch() -> i64 {
    DEFAULT_START_BATCH
}

fn default_end_batch() -> i64 {
    DEFAULT_END_BATCH
}

impl RunRequest {
    /// Builds a request from the raw batch input fields.
    pub fn from_inputs(start: &str, end: &str) -> Self {
        Self {
            start_batch: parse_batch(start, DEFAULT_START_BATCH),
            end_batch: parse_batch(end, DEFAULT_END_BATCH),
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.start_batch <= self.end_batch
    }
}

/// Reads the integer prefix of a batch field.
///
/// Leading whitespace is skipped and trailing garbage ignored, so `" 12abc"`
/// reads as 12. Anything without digits, anything that overflows, and zero
/// all fall back to `default`.
pub fn parse_batch(raw: &str, default: i64) -> i64 {
    let text = raw.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return default;
    }
    match digits[..len].parse::<i64>() {
        Ok(0) | Err(_) => default,
        Ok(value) if negative => -value,
        Ok(value) => value,
    }
}

/// One `/api/logs` response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogSnapshot {
    pub entries: Vec<LogEntry>,
    /// `None` when the server answered with a bare list.
    pub running: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LogsPayload {
    Snapshot { logs: Vec<LogEntry>, running: bool },
    Bare(Vec<LogEntry>),
}

impl From<LogsPayload> for LogSnapshot {
    fn from(payload: LogsPayload) -> Self {
        match payload {
            LogsPayload::Snapshot { logs, running } => LogSnapshot {
                entries: logs,
                running: Some(running),
            },
            LogsPayload::Bare(entries) => LogSnapshot {
                entries,
                running: None,
            },
        }
    }
}
