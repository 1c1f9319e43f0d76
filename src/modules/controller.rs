//! The panel's UI controller.
//!
//! One value owns the run state, the polling timer and the view model. User
//! actions, poll ticks and network responses all re-enter it from a single
//! task, so nothing here needs a lock.

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::modules::api::{CONFIG_PATH, PanelApi};
use crate::modules::errors::PanelError;
use crate::modules::state::{RunEvent, RunState};
use crate::modules::types::{LogLevel, RunRequest};
use crate::modules::view::{Action, Controls, PanelView};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Template shown in the editor whenever the server config cannot be loaded.
pub fn fallback_config() -> Value {
    json!({
        "download_dir": "./downloads",
        "auth_url": "https://login.openathens.net/auth/cobbcounty.org/o/72388178",
        "library_credentials": {
            "Cobb County Library": {
                "username": "YOUR_LIBRARY_CARD_NUMBER",
                "password": "YOUR_PIN"
            }
        },
        "search_parameters": {
            "state": "Georgia",
            "include_unverified": true,
            "include_closed": false
        },
        "pages_per_batch": 10,
        "pages_to_download": "all",
        "state_file": "reference_usa_state.json"
    })
}

/// Two-space indented JSON, the editor's format.
pub fn render_config(config: &Value) -> String {
    serde_json::to_string_pretty(config).unwrap_or_else(|_| config.to_string())
}

pub struct Controller<A: PanelApi> {
    api: A,
    state: RunState,
    poll: Option<Interval>,
    poll_period: Duration,
    view: PanelView,
}

impl<A: PanelApi> Controller<A> {
    pub fn new(api: A, poll_period: Duration) -> Self {
        Self {
            api,
            state: RunState::Idle,
            poll: None,
            poll_period,
            view: PanelView::default(),
        }
    }

    /// Page-ready hook: fetches the config, never starts a run.
    pub async fn init(&mut self) {
        let _ = self.load_config().await;
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn polling_active(&self) -> bool {
        self.poll.is_some()
    }

    pub fn set_config_text(&mut self, text: impl Into<String>) {
        self.view.config_text = text.into();
    }

    /// Edits the batch inputs. Ignored while the inputs are disabled.
    pub fn set_batch_inputs(&mut self, start: Option<&str>, end: Option<&str>) -> bool {
        if !self.view.controls.batch_inputs {
            debug!("batch inputs are disabled while running");
            return false;
        }
        if let Some(start) = start {
            self.view.start_batch = start.to_string();
        }
        if let Some(end) = end {
            self.view.end_batch = end.to_string();
        }
        true
    }

    /// Dispatches a user action if its control is enabled.
    ///
    /// Returns `false` when the press was ignored. Failures are already
    /// reported to the view by the time this returns.
    pub async fn press(&mut self, action: Action) -> bool {
        if !self.view.controls.allows(action) {
            debug!("ignoring {action}: control disabled");
            return false;
        }
        let _ = match action {
            Action::Load => self.load_config().await,
            Action::Save => self.save_config().await,
            Action::Run => self.run_scraper().await,
            Action::Stop => self.stop_scraper().await,
        };
        true
    }

    pub async fn load_config(&mut self) -> Result<(), PanelError> {
        self.view.note(LogLevel::Info, "Loading configuration...");
        self.view.set_status(LogLevel::Info, "Loading configuration...");
        let target = format!("{}{CONFIG_PATH}", self.api.base_url());
        self.view.note(LogLevel::Info, format!("Connecting to: {target}"));

        match self.api.fetch_config().await {
            Ok(config) => {
                self.view.config_text = render_config(&config);
                self.view.note(LogLevel::Success, "Configuration loaded successfully");
                self.view
                    .set_status(LogLevel::Success, "Configuration loaded successfully");
                info!("configuration loaded from {target}");
                Ok(())
            }
            Err(err) => {
                self.report("Failed to load configuration", &err, true);
                self.view.config_text = render_config(&fallback_config());
                Err(err)
            }
        }
    }

    pub async fn save_config(&mut self) -> Result<(), PanelError> {
        self.view.note(LogLevel::Info, "Saving configuration...");
        self.view.set_status(LogLevel::Info, "Saving configuration...");

        let config: Value = match serde_json::from_str(&self.view.config_text) {
            Ok(config) => config,
            Err(parse) => {
                let err = PanelError::InvalidJson(parse);
                self.view.note(LogLevel::Error, err.to_string());
                self.view.set_status(LogLevel::Error, err.to_string());
                return Err(err);
            }
        };

        match self.api.save_config(&config).await {
            Ok(_) => {
                self.view.note(LogLevel::Success, "Configuration saved successfully");
                self.view
                    .set_status(LogLevel::Success, "Configuration saved successfully");
                info!("configuration saved");
                Ok(())
            }
            Err(err) => {
                self.report("Failed to save configuration", &err, true);
                Err(err)
            }
        }
    }

    pub async fn run_scraper(&mut self) -> Result<(), PanelError> {
        let request = RunRequest::from_inputs(&self.view.start_batch, &self.view.end_batch);
        if !request.is_ordered() {
            let err = PanelError::BatchRange {
                start: request.start_batch,
                end: request.end_batch,
            };
            self.view.note(LogLevel::Error, format!("Error: {err}"));
            return Err(err);
        }

        self.view
            .note(LogLevel::Info, format!("Starting scraper ({request})..."));
        match self.api.start_run(request).await {
            Ok(_) => {
                info!("scraper started: {request}");
                self.transition(RunEvent::Started(request));
                Ok(())
            }
            Err(err) => {
                self.report("Failed to start scraper", &err, false);
                Err(err)
            }
        }
    }

    /// A failed stop leaves the job marked running and keeps polling, so a
    /// stop that happens on the server is still picked up by the next tick.
    pub async fn stop_scraper(&mut self) -> Result<(), PanelError> {
        self.view.note(LogLevel::Warning, "Stopping scraper...");
        match self.api.stop_run().await {
            Ok(_) => {
                info!("scraper stopped");
                self.transition(RunEvent::StopConfirmed);
                Ok(())
            }
            Err(err) => {
                self.report("Failed to stop scraper", &err, false);
                Err(err)
            }
        }
    }

    /// One log sync: replace the pane with the server's list.
    pub async fn poll_tick(&mut self) -> Result<(), PanelError> {
        let snapshot = match self.api.fetch_logs().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("error fetching logs: {err}");
                return Err(err);
            }
        };
        self.view.feed.replace(snapshot.entries);
        if snapshot.running == Some(false) {
            info!("server reports the scraper is no longer running");
            self.transition(RunEvent::ServerStopped);
        }
        Ok(())
    }

    /// Resolves on the next poll tick; pending forever while idle.
    pub async fn next_tick(&mut self) {
        match self.poll.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn transition(&mut self, event: RunEvent) {
        let next = self.state.on(event);
        if next == self.state {
            debug!("{event:?} ignored while {}", self.state);
            return;
        }
        debug!("run state {} -> {next}", self.state);
        self.state = next;
        self.view.controls = Controls::for_state(&self.state);
        if self.state.is_running() {
            self.arm_polling();
        } else {
            self.poll = None;
        }
    }

    /// Replaces any existing timer, so at most one is ever armed.
    fn arm_polling(&mut self) {
        let mut timer = interval_at(Instant::now() + self.poll_period, self.poll_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poll = Some(timer);
    }

    fn report(&mut self, context: &str, err: &PanelError, banner: bool) {
        let message = format!("Error: {context}: {err}");
        warn!("{message}");
        self.view.note(LogLevel::Error, message.clone());
        if banner {
            self.view.set_status(LogLevel::Error, message);
        }
        if err.is_transport() {
            self.view.note(
                LogLevel::Error,
                "Connection to server failed. Make sure the server is running.",
            );
            self.view.note(
                LogLevel::Info,
                format!("The server should be running at: {}", self.api.base_url()),
            );
            if banner {
                self.view.set_status(
                    LogLevel::Error,
                    "Server connection failed. Is the server running?",
                );
            }
        }
    }
}
