//! Particle cloud REST calls: reading the current status for resync and
//! invoking the device's status functions.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::display::StatusCode;
use crate::error::{Error, Result};

/// Statuses the light can be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCommand {
    Available,
    Busy,
    DoNotDisturb,
}

impl StatusCommand {
    /// Device function invoked for this command.
    pub fn function_name(self) -> &'static str {
        match self {
            Self::Available => "setAvailable",
            Self::Busy => "setBusy",
            Self::DoNotDisturb => "setDoNotDisturb",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Busy => "Busy",
            Self::DoNotDisturb => "Do Not Disturb",
        }
    }
}

impl fmt::Display for StatusCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

impl FromStr for StatusCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "available" => Ok(Self::Available),
            "busy" => Ok(Self::Busy),
            "donotdisturb" | "dnd" => Ok(Self::DoNotDisturb),
            other => Err(Error::config(format!("unknown status `{other}`"))),
        }
    }
}

/// One-shot read of the device's current status.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, token: &str, device_id: &str) -> Result<StatusCode>;
}

/// Body of `GET /v1/devices/{id}/{variable}`.
#[derive(Debug, Deserialize)]
struct VariableResponse {
    result: serde_json::Value,
}

/// Body of `POST /v1/devices/{id}/{function}`.
#[derive(Debug, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub connected: bool,
    pub return_value: i64,
}

/// Client for the Particle cloud REST API.
#[derive(Debug, Clone)]
pub struct ParticleClient {
    client: reqwest::Client,
    api_base: String,
    status_variable: String,
}

impl ParticleClient {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &StreamConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            status_variable: config.status_variable.clone(),
        }
    }

    fn device_url(&self, device_id: &str, name: &str) -> String {
        format!("{}/v1/devices/{}/{}", self.api_base, device_id, name)
    }

    /// Switch the light to `command`.
    ///
    /// The device function returns `1` on success; anything else is reported
    /// as [`Error::CommandRejected`].
    pub async fn set_status(
        &self,
        token: &str,
        device_id: &str,
        command: StatusCommand,
    ) -> Result<FunctionResponse> {
        let url = self.device_url(device_id, command.function_name());
        debug!(%url, %command, "Invoking device function");

        let response = self.client.post(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(status, url, "set status"));
        }

        let body: FunctionResponse = response.json().await?;
        if body.return_value != 1 {
            return Err(Error::CommandRejected {
                command,
                return_value: body.return_value,
            });
        }

        info!(device = %body.id, %command, "Device status updated");
        Ok(body)
    }
}

#[async_trait]
impl StatusSource for ParticleClient {
    async fn fetch_status(&self, token: &str, device_id: &str) -> Result<StatusCode> {
        let url = self.device_url(device_id, &self.status_variable);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(status, url, "fetch status"));
        }

        let body: VariableResponse = response.json().await?;
        parse_variable(&body.result)
            .ok_or_else(|| Error::invalid_response(format!("unexpected status value {}", body.result)))
    }
}

fn parse_variable(value: &serde_json::Value) -> Option<StatusCode> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(StatusCode),
        serde_json::Value::String(s) => s.trim().parse().ok().map(StatusCode),
        _ => None,
    }
}
