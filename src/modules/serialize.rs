use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Front end settings, read from `panel.toml`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PanelSettings {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: Option<u64>,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            poll_interval_ms: 1000,
            request_timeout_secs: None,
        }
    }
}

impl PanelSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Companion server settings, read from `panel_server.toml`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub config_file: PathBuf,
    pub scraper_executable: String,
    pub scraper_args: Vec<String>,
    pub max_log_entries: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("./scraper_config.json"),
            scraper_executable: "scraper".to_string(),
            scraper_args: Vec::new(),
            max_log_entries: 2000,
        }
    }
}

pub fn load_panel_settings(path: &str) -> Result<PanelSettings, Box<dyn std::error::Error>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PanelSettings::default()),
        Err(err) => Err(err.into()),
    }
}

pub fn load_server_settings(path: &str) -> Result<ServerSettings, Box<dyn std::error::Error>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ServerSettings::default()),
        Err(err) => Err(err.into()),
    }
}

pub fn load_stored_config(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let config: Value = serde_json::from_str(&text)?;
    Ok(config)
}

/// Writes the config, keeping the previous file as `<name>.bak`.
pub fn save_stored_config(path: &Path, config: &Value) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        fs::copy(path, backup_path(path))?;
    }
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let json_str = serde_json::to_string_pretty(config)?;
    fs::write(path, json_str)?;
    Ok(())
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
