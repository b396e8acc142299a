//! Platform client — the one capability the prober needs.
//!
//! The prober never talks to reqwest directly. It asks a
//! [`ClientFactory`] for a [`BotIntrospector`] and calls `introspect()`,
//! which returns the raw bot-info envelope. Anything richer (messaging,
//! event subscriptions) is out of scope for this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::credentials::FeishuCredentials;

const TENANT_TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const BOT_INFO_PATH: &str = "/open-apis/bot/v3/info";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tenant_access_token rejected (code {code}): {msg}")]
    TokenRejected { code: i64, msg: String },

    #[error("unexpected response (HTTP {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

// ── Response Types ──────────────────────────────────────────────────

/// Identity block returned by the bot-info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub open_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfoData {
    #[serde(default)]
    pub bot: Option<BotIdentity>,
}

/// Raw bot-info envelope as the platform sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub bot: Option<BotIdentity>,
    #[serde(default)]
    pub data: Option<BotInfoData>,
}

/// The two known places the bot identity can appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotInfoShape<'a> {
    /// `{ "bot": { ... } }`
    TopLevel(&'a BotIdentity),
    /// `{ "data": { "bot": { ... } } }`
    Nested(&'a BotIdentity),
}

impl<'a> BotInfoShape<'a> {
    pub fn identity(self) -> &'a BotIdentity {
        match self {
            Self::TopLevel(bot) | Self::Nested(bot) => bot,
        }
    }
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Locate the bot identity. The top-level shape wins when both exist.
    pub fn shape(&self) -> Option<BotInfoShape<'_>> {
        if let Some(bot) = &self.bot {
            return Some(BotInfoShape::TopLevel(bot));
        }
        self.data
            .as_ref()
            .and_then(|d| d.bot.as_ref())
            .map(BotInfoShape::Nested)
    }

    /// Human-readable description of a logical (non-zero code) error.
    pub fn error_message(&self) -> String {
        match self.msg.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => format!("API error: {}", msg),
            _ => format!("API error: code {}", self.code),
        }
    }
}

// ── Client Traits ───────────────────────────────────────────────────

/// A client narrowed down to the single call the prober makes.
#[async_trait]
pub trait BotIntrospector: Send + Sync {
    /// GET the bot-info endpoint and return the decoded envelope.
    async fn introspect(&self) -> Result<RawResponse, ClientError>;
}

/// Builds a transport-bound client for one set of credentials.
pub trait ClientFactory: Send + Sync {
    fn create(&self, creds: &FeishuCredentials) -> Result<Box<dyn BotIntrospector>, ClientError>;
}

// ── HTTP Implementation ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TenantTokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    tenant_access_token: Option<String>,
}

/// reqwest-backed client: fetches a tenant token, then the bot info.
pub struct FeishuClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
}

impl FeishuClient {
    pub fn new(http: reqwest::Client, creds: &FeishuCredentials) -> Result<Self, ClientError> {
        let base_url = creds.domain.base_url().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ClientError::InvalidConfig(format!(
                "domain must be \"feishu\", \"lark\" or an http(s) URL, got {:?}",
                creds.domain.as_str()
            )));
        }
        Ok(Self {
            http,
            base_url,
            app_id: creds.app_id.clone(),
            app_secret: creds.app_secret.clone(),
        })
    }

    async fn tenant_access_token(&self) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, TENANT_TOKEN_PATH))
            .json(&TenantTokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await?;
        let token: TenantTokenResponse = decode(resp).await?;

        match token.tenant_access_token {
            Some(t) if token.code == 0 && !t.is_empty() => Ok(t),
            _ => Err(ClientError::TokenRejected {
                code: token.code,
                msg: token.msg.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl BotIntrospector for FeishuClient {
    async fn introspect(&self) -> Result<RawResponse, ClientError> {
        let token = self.tenant_access_token().await?;
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, BOT_INFO_PATH))
            .bearer_auth(token)
            .send()
            .await?;
        debug!(app_id = %self.app_id, status = resp.status().as_u16(), "bot info response");
        decode(resp).await
    }
}

/// Decode a JSON body regardless of HTTP status; the platform reports
/// errors in the body's `code`.
async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|source| ClientError::Decode { status, source })
}

/// Production factory. Clients share one connection pool.
///
/// A reqwest builder failure is kept and reported by every `create`
/// call, so it surfaces as a probe failure instead of at construction.
pub struct HttpClientFactory {
    http: Result<reqwest::Client, String>,
}

impl HttpClientFactory {
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Self {
            http: builder.build().map_err(|e| e.to_string()),
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, creds: &FeishuCredentials) -> Result<Box<dyn BotIntrospector>, ClientError> {
        let http = self.http.clone().map_err(ClientError::Build)?;
        Ok(Box::new(FeishuClient::new(http, creds)?))
    }
}
