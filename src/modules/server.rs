//! Companion HTTP server for the panel: config file storage, a supervised
//! scraper child process and its log buffer.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use log::{error, info, warn};
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::modules::api::{CONFIG_PATH, LOGS_PATH, RUN_PATH, STOP_PATH};
use crate::modules::controller::fallback_config;
use crate::modules::serialize::{ServerSettings, load_stored_config, save_stored_config};
use crate::modules::types::{LogEntry, LogLevel, LogsPayload, RunRequest};

#[derive(Clone)]
pub struct AppState {
    settings: Arc<ServerSettings>,
    shared: Arc<Mutex<Shared>>,
}

#[derive(Default)]
struct Shared {
    running: bool,
    generation: u64,
    logs: Vec<LogEntry>,
    kill: Option<oneshot::Sender<()>>,
}

impl AppState {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.lock().logs.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends to the buffer of the given run; output of older runs is dropped.
    fn push_log(&self, generation: u64, level: LogLevel, message: impl Into<String>) {
        let mut shared = self.lock();
        if shared.generation == generation {
            let max = self.settings.max_log_entries;
            append_log(&mut shared, max, LogEntry::now(level, message));
        }
    }
}

fn append_log(shared: &mut Shared, max: usize, entry: LogEntry) {
    info!("{entry}");
    shared.logs.push(entry);
    if shared.logs.len() > max {
        let excess = shared.logs.len() - max;
        shared.logs.drain(..excess);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(CONFIG_PATH, get(get_config).post(save_config))
        .route(RUN_PATH, post(run_scraper))
        .route(STOP_PATH, post(stop_scraper))
        .route(LOGS_PATH, get(get_logs))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let path = &state.settings.config_file;
    if !path.exists() {
        save_stored_config(path, &fallback_config())
            .map_err(|err| ApiError::internal(format!("Error creating default config: {err}")))?;
        info!("created default configuration file: {}", path.display());
    }
    let config = load_stored_config(path)
        .map_err(|err| ApiError::internal(format!("Error loading config: {err}")))?;
    Ok(Json(config))
}

async fn save_config(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    save_stored_config(&state.settings.config_file, &payload)
        .map_err(|err| ApiError::internal(err.to_string()))?;
    info!("configuration saved to {}", state.settings.config_file.display());
    Ok(Json(json!({
        "success": true,
        "message": "Configuration saved successfully"
    })))
}

async fn run_scraper(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Value>, ApiError> {
    if !request.is_ordered() {
        return Err(ApiError::bad_request(
            "Start batch cannot be greater than end batch",
        ));
    }

    let settings = Arc::clone(&state.settings);
    let max = settings.max_log_entries;
    let mut shared = state.lock();
    if shared.running {
        return Err(ApiError::bad_request("Scraper is already running"));
    }

    shared.generation += 1;
    let generation = shared.generation;
    shared.logs.clear();
    append_log(&mut shared, max, LogEntry::now(LogLevel::Info, "=== Scraper run ==="));
    append_log(
        &mut shared,
        max,
        LogEntry::now(LogLevel::Info, format!("Starting batch: {}", request.start_batch)),
    );
    append_log(
        &mut shared,
        max,
        LogEntry::now(LogLevel::Info, format!("Ending batch: {}", request.end_batch)),
    );

    let mut cmd = Command::new(&settings.scraper_executable);
    cmd.args(&settings.scraper_args)
        .arg("--config")
        .arg(&settings.config_file)
        .arg("--start-batch")
        .arg(request.start_batch.to_string())
        .arg("--end-batch")
        .arg(request.end_batch.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a stop reaches whatever the scraper started.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            let message = format!("failed to start scraper: {err}");
            error!("{message}");
            append_log(&mut shared, max, LogEntry::now(LogLevel::Error, format!("Error: {message}")));
            return Err(ApiError::internal(message));
        }
    };

    let (kill_tx, kill_rx) = oneshot::channel();
    shared.running = true;
    shared.kill = Some(kill_tx);
    drop(shared);

    let mut pipes = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pipes.push(tokio::spawn(pipe_lines(state.clone(), generation, stdout, LogLevel::Info)));
    }
    if let Some(stderr) = child.stderr.take() {
        pipes.push(tokio::spawn(pipe_lines(state.clone(), generation, stderr, LogLevel::Warning)));
    }
    tokio::spawn(supervise(state.clone(), generation, child, pipes, kill_rx));

    Ok(Json(json!({"success": true, "message": "Scraper started"})))
}

async fn pipe_lines<R>(state: AppState, generation: u64, reader: R, level: LogLevel)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => state.push_log(generation, level, decode_line(&buf)),
            Err(err) => {
                warn!("error reading scraper output: {err}");
                break;
            }
        }
    }
}

/// Scraper output is not guaranteed to be UTF-8; undecodable bytes become U+FFFD.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

async fn supervise(
    state: AppState,
    generation: u64,
    mut child: Child,
    pipes: Vec<JoinHandle<()>>,
    kill_rx: oneshot::Receiver<()>,
) {
    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => {
            kill_process_group(&child);
            if let Err(err) = child.kill().await {
                warn!("could not kill scraper: {err}");
            }
            None
        }
    };

    // Stopped by the user: the stop handler already updated the state.
    let Some(status) = status else {
        for pipe in pipes {
            pipe.abort();
        }
        return;
    };
    // Report completion only after the last output line is buffered.
    for pipe in pipes {
        let _ = pipe.await;
    }

    let max = state.settings.max_log_entries;
    let mut shared = state.lock();
    if shared.generation != generation || !shared.running {
        return;
    }
    shared.running = false;
    shared.kill = None;
    let entry = match status {
        Ok(status) if status.success() => {
            LogEntry::now(LogLevel::Success, "Scraper completed successfully")
        }
        Ok(status) => LogEntry::now(LogLevel::Error, format!("Error: scraper exited with {status}")),
        Err(err) => LogEntry::now(LogLevel::Error, format!("Error: {err}")),
    };
    append_log(&mut shared, max, entry);
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: plain kill(2) on the group the child leads; no memory is touched.
    if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
        warn!(
            "could not kill scraper process group {pid}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

async fn stop_scraper(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let max = state.settings.max_log_entries;
    let mut shared = state.lock();
    if !shared.running {
        return Err(ApiError::bad_request("Scraper is not running"));
    }
    if let Some(kill) = shared.kill.take() {
        let _ = kill.send(());
    }
    shared.running = false;
    append_log(
        &mut shared,
        max,
        LogEntry::now(LogLevel::Warning, "Scraper stopped by user"),
    );
    Ok(Json(json!({"success": true, "message": "Scraper stopped"})))
}

async fn get_logs(State(state): State<AppState>) -> Json<LogsPayload> {
    let shared = state.lock();
    Json(LogsPayload::Snapshot {
        logs: shared.logs.clone(),
        running: shared.running,
    })
}

#[derive(Debug)]
struct ApiError {
    code: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.code, Json(json!({"error": self.message}))).into_response()
    }
}
