use std::time::Duration;

use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use serde_json::Value;
use url::Url;

use crate::modules::errors::PanelError;
use crate::modules::types::{LogSnapshot, LogsPayload, RunRequest};

pub const CONFIG_PATH: &str = "/api/config";
pub const RUN_PATH: &str = "/api/run";
pub const STOP_PATH: &str = "/api/stop";
pub const LOGS_PATH: &str = "/api/logs";

/// The four endpoints the panel drives.
#[allow(async_fn_in_trait)]
pub trait PanelApi {
    /// Base address shown to the user when the server cannot be reached.
    fn base_url(&self) -> String;
    async fn fetch_config(&self) -> Result<Value, PanelError>;
    async fn save_config(&self, config: &Value) -> Result<Value, PanelError>;
    async fn start_run(&self, request: RunRequest) -> Result<Value, PanelError>;
    async fn stop_run(&self) -> Result<Value, PanelError>;
    async fn fetch_logs(&self) -> Result<LogSnapshot, PanelError>;
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(server_url: &str, timeout: Option<Duration>) -> Result<Self, PanelError> {
        let base = Url::parse(server_url).map_err(|source| PanelError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("scrape-panel/0.1"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|source| PanelError::Transport {
            url: base.to_string(),
            source,
        })?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PanelError> {
        self.base.join(path).map_err(|source| PanelError::InvalidUrl {
            url: format!("{}{path}", self.base),
            source,
        })
    }

    async fn get(&self, path: &str) -> Result<Value, PanelError> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        read_payload(&url, response).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value, PanelError> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        let mut request = self.client.post(url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        read_payload(&url, response).await
    }
}

impl PanelApi for HttpApi {
    fn base_url(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    async fn fetch_config(&self) -> Result<Value, PanelError> {
        self.get(CONFIG_PATH).await
    }

    async fn save_config(&self, config: &Value) -> Result<Value, PanelError> {
        self.post(CONFIG_PATH, Some(config)).await
    }

    async fn start_run(&self, request: RunRequest) -> Result<Value, PanelError> {
        let body = serde_json::to_value(request).map_err(|source| PanelError::Decode {
            url: RUN_PATH.to_string(),
            source,
        })?;
        self.post(RUN_PATH, Some(&body)).await
    }

    async fn stop_run(&self) -> Result<Value, PanelError> {
        self.post(STOP_PATH, None).await
    }

    async fn fetch_logs(&self) -> Result<LogSnapshot, PanelError> {
        let url = self.endpoint(LOGS_PATH)?;
        let payload = self.get(LOGS_PATH).await?;
        let logs: LogsPayload = serde_json::from_value(payload).map_err(|source| {
            PanelError::Decode {
                url: url.to_string(),
                source,
            }
        })?;
        Ok(logs.into())
    }
}

fn transport(url: &Url, source: reqwest::Error) -> PanelError {
    PanelError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Turns a response into its JSON payload, classifying the failures.
async fn read_payload(url: &Url, response: Response) -> Result<Value, PanelError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("json"));
    let body = response.text().await.map_err(|source| transport(url, source))?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|payload| error_field(&payload))
            .or_else(|| (!is_json && !body.trim().is_empty()).then(|| body.trim().to_string()));
        return Err(PanelError::Status { status, message });
    }

    let payload: Value = serde_json::from_str(&body).map_err(|source| PanelError::Decode {
        url: url.to_string(),
        source,
    })?;
    if let Some(message) = error_field(&payload) {
        return Err(PanelError::Application { message });
    }
    Ok(payload)
}

/// The `error` member of an object payload, if it is set to anything truthy.
pub fn error_field(payload: &Value) -> Option<String> {
    match payload.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
