//! What the front end shows: config editor, batch inputs, control
//! enablement, status banner and the log pane.

use derive_more::with_trait::Display;

use crate::modules::state::RunState;
use crate::modules::types::{DEFAULT_END_BATCH, DEFAULT_START_BATCH, LogEntry, LogLevel};

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum Action {
    #[display("load")]
    Load,
    #[display("save")]
    Save,
    #[display("run")]
    Run,
    #[display("stop")]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub load: bool,
    pub save: bool,
    pub run: bool,
    pub stop: bool,
    pub batch_inputs: bool,
}

impl Controls {
    pub fn for_state(state: &RunState) -> Self {
        let idle = !state.is_running();
        Self {
            load: true,
            save: idle,
            run: idle,
            stop: !idle,
            batch_inputs: idle,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Load => self.load,
            Action::Save => self.save,
            Action::Run => self.run,
            Action::Stop => self.stop,
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::for_state(&RunState::Idle)
    }
}

#[derive(Debug, Clone, Display, PartialEq, Eq)]
#[display("{severity}: {text}")]
pub struct StatusBanner {
    pub severity: LogLevel,
    pub text: String,
}

/// The log pane. Local notes are appended; a poll tick replaces everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFeed {
    entries: Vec<LogEntry>,
}

impl LogFeed {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn replace(&mut self, entries: Vec<LogEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub config_text: String,
    pub start_batch: String,
    pub end_batch: String,
    pub controls: Controls,
    pub status: Option<StatusBanner>,
    pub feed: LogFeed,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            config_text: String::new(),
            start_batch: DEFAULT_START_BATCH.to_string(),
            end_batch: DEFAULT_END_BATCH.to_string(),
            controls: Controls::default(),
            status: None,
            feed: LogFeed::default(),
        }
    }
}

impl PanelView {
    pub fn set_status(&mut self, severity: LogLevel, text: impl Into<String>) {
        self.status = Some(StatusBanner {
            severity,
            text: text.into(),
        });
    }

    pub fn note(&mut self, level: LogLevel, message: impl Into<String>) {
        self.feed.push(LogEntry::now(level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::types::RunRequest;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(LogLevel::Info, "10:00:00", message)
    }

    #[test]
    fn controls_follow_run_state() {
        let idle = Controls::for_state(&RunState::Idle);
        assert!(idle.run && idle.save && idle.batch_inputs && idle.load);
        assert!(!idle.stop);

        let running = Controls::for_state(&RunState::Running {
            request: RunRequest::from_inputs("", ""),
        });
        assert!(!running.run && !running.save && !running.batch_inputs);
        assert!(running.stop && running.load);
        assert!(running.allows(Action::Stop));
        assert!(!running.allows(Action::Run));
    }

    #[test]
    fn replacing_with_same_payload_is_idempotent() {
        let mut feed = LogFeed::default();
        feed.push(entry("local note"));
        let payload = vec![entry("a"), entry("b")];

        feed.replace(payload.clone());
        let first = feed.lines();
        feed.replace(payload);

        assert_eq!(feed.lines(), first);
        assert_eq!(first, vec!["[10:00:00] a", "[10:00:00] b"]);
    }
}
