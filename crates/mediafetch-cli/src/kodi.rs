//! Kodi JSON-RPC player adapter.
//!
//! Implements the engine's "is something already playing" predicate and
//! the two follow-up actions the fetch command takes on a finished file:
//! start playback, or just show a notification.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mediafetch_core::PlayerPort;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const NOTIFICATION_MS: u64 = 5000;

/// Default JSON-RPC endpoint of a local Kodi.
pub const DEFAULT_KODI_URL: &str = "http://localhost:8080/jsonrpc";
/// Default web-server user.
pub const DEFAULT_KODI_USERNAME: &str = "kodi";

/// Errors talking to Kodi.
#[derive(Debug, Error)]
pub enum KodiError {
    /// Transport failure or timeout.
    #[error("Kodi request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status (wrong URL, bad credentials).
    #[error("Kodi returned HTTP {0}")]
    Status(u16),

    /// JSON-RPC level error.
    #[error("Kodi error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KodiConfig {
    /// JSON-RPC endpoint.
    pub url: String,
    /// Web-server user.
    pub username: String,
    /// Web-server password; requests are unauthenticated without one.
    pub password: Option<String>,
}

impl Default for KodiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_KODI_URL.to_string(),
            username: DEFAULT_KODI_USERNAME.to_string(),
            password: None,
        }
    }
}

impl KodiConfig {
    /// Read `KODI_URL`, `KODI_USERNAME` and `KODI_PASSWORD`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            url: get("KODI_URL").unwrap_or(defaults.url),
            username: get("KODI_USERNAME").unwrap_or(defaults.username),
            password: get("KODI_PASSWORD"),
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// One entry of `Player.GetActivePlayers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivePlayer {
    /// Kodi player id.
    pub playerid: i64,
    /// Player type (`video`, `audio`, `picture`).
    #[serde(rename = "type")]
    pub kind: String,
}

/// JSON-RPC client for one Kodi instance.
#[derive(Debug)]
pub struct KodiClient {
    client: Client,
    config: KodiConfig,
    next_id: AtomicU64,
}

impl KodiClient {
    /// Create a client with a 5 second request timeout.
    pub fn new(config: KodiConfig) -> Result<Self, KodiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Connection settings in use.
    pub const fn config(&self) -> &KodiConfig {
        &self.config
    }

    /// Players that are currently active.
    pub async fn active_players(&self) -> Result<Vec<ActivePlayer>, KodiError> {
        let result = self.call("Player.GetActivePlayers", json!({})).await?;
        Ok(parse_players(result))
    }

    /// Start playing a file.
    pub async fn play(&self, path: &Path) -> Result<(), KodiError> {
        self.call(
            "Player.Open",
            json!({ "item": { "file": path.to_string_lossy() } }),
        )
        .await
        .map(drop)
    }

    /// Show an on-screen notification.
    pub async fn notify(&self, title: &str, message: &str) -> Result<(), KodiError> {
        self.call(
            "GUI.ShowNotification",
            json!({ "title": title, "message": message, "displaytime": NOTIFICATION_MS }),
        )
        .await
        .map(drop)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, KodiError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(password) = &self.config.password {
            request = request.basic_auth(&self.config.username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KodiError::Status(status.as_u16()));
        }

        let reply: RpcResponse = response.json().await?;
        if let Some(error) = reply.error {
            return Err(KodiError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        tracing::debug!(method, "Kodi call succeeded");
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl PlayerPort for KodiClient {
    async fn is_playing(&self) -> bool {
        match self.active_players().await {
            Ok(players) => !players.is_empty(),
            Err(err) => {
                tracing::warn!(url = %self.config.url, error = %err, "Could not query Kodi players");
                false
            }
        }
    }
}

fn parse_players(result: Value) -> Vec<ActivePlayer> {
    serde_json::from_value(result).unwrap_or_default()
}
