use derive_more::with_trait::Display;

use crate::modules::types::RunRequest;

/// Run state of the remote scraper job as tracked by the panel.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("running ({request})")]
    Running { request: RunRequest },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// The server accepted a run request.
    Started(RunRequest),
    /// The server confirmed a stop request.
    StopConfirmed,
    /// A poll tick reported the job is no longer running.
    ServerStopped,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }

    /// The only place run state changes. Pairs not listed are no-ops.
    pub fn on(self, event: RunEvent) -> RunState {
        match (self, event) {
            (RunState::Idle, RunEvent::Started(request)) => RunState::Running { request },
            (RunState::Running { .. }, RunEvent::StopConfirmed | RunEvent::ServerStopped) => {
                RunState::Idle
            }
            (state, _) => state,
        }
    }
}
