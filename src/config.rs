//! Channel configuration and probe settings.
//!
//! `FeishuConfig` mirrors the `channels.feishu` block of the openclaw
//! config file. Every field is optional; missing values are filled from
//! the environment by the credential resolver, not here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default lifetime of a cached probe result (10 minutes).
pub const DEFAULT_PROBE_TTL: Duration = Duration::from_secs(600);

const FEISHU_BASE_URL: &str = "https://open.feishu.cn";
const LARK_BASE_URL: &str = "https://open.larksuite.com";

// ── Channel Config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeishuConfig {
    pub enabled: Option<bool>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub encrypt_key: Option<String>,
    pub verification_token: Option<String>,
    pub domain: Option<FeishuDomain>,
}

impl FeishuConfig {
    /// Convenience constructor for the two required fields.
    pub fn with_app(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            app_secret: Some(app_secret.into()),
            ..Default::default()
        }
    }

    pub fn domain(mut self, domain: FeishuDomain) -> Self {
        self.domain = Some(domain);
        self
    }
}

/// Which deployment of the platform the bot lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeishuDomain {
    /// Mainland deployment (open.feishu.cn)
    #[default]
    Feishu,
    /// International deployment (open.larksuite.com)
    Lark,
    /// Self-hosted or proxied base URL, stored without a trailing slash
    Custom(String),
}

impl FeishuDomain {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "feishu" => Self::Feishu,
            "lark" => Self::Lark,
            _ => Self::Custom(trimmed.trim_end_matches('/').to_string()),
        }
    }

    /// Base URL that API paths are appended to.
    pub fn base_url(&self) -> &str {
        match self {
            Self::Feishu => FEISHU_BASE_URL,
            Self::Lark => LARK_BASE_URL,
            Self::Custom(url) => url,
        }
    }

    /// Stable textual form, also used when building cache keys.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Feishu => "feishu",
            Self::Lark => "lark",
            Self::Custom(url) => url,
        }
    }
}

impl From<String> for FeishuDomain {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<FeishuDomain> for String {
    fn from(domain: FeishuDomain) -> Self {
        domain.as_str().to_string()
    }
}

impl fmt::Display for FeishuDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Probe Settings ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
}

/// Runtime knobs for the prober, loaded from env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// How long a probe result (success or failure) stays fresh.
    pub ttl: Duration,
    /// Per-request timeout for the HTTP client. `None` means no timeout.
    pub http_timeout: Option<Duration>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_PROBE_TTL,
            http_timeout: None,
        }
    }
}

impl ProbeSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(ttl) = read_seconds(&lookup, "FEISHU_PROBE_TTL_SECS")? {
            settings.ttl = ttl;
        }
        settings.http_timeout = read_seconds(&lookup, "FEISHU_HTTP_TIMEOUT_SECS")?;
        Ok(settings)
    }
}

fn read_seconds<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidSeconds {
            var,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(FeishuDomain::parse("feishu"), FeishuDomain::Feishu);
        assert_eq!(FeishuDomain::parse(" Lark "), FeishuDomain::Lark);
        assert_eq!(
            FeishuDomain::parse("https://feishu.internal.example/"),
            FeishuDomain::Custom("https://feishu.internal.example".into())
        );
        assert_eq!(FeishuDomain::Lark.base_url(), "https://open.larksuite.com");
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let cfg: FeishuConfig = serde_json::from_str(
            r#"{"enabled":true,"appId":"cli_abc","appSecret":"s3cret","domain":"lark"}"#,
        )
        .unwrap();
        assert_eq!(cfg.app_id.as_deref(), Some("cli_abc"));
        assert_eq!(cfg.app_secret.as_deref(), Some("s3cret"));
        assert_eq!(cfg.domain, Some(FeishuDomain::Lark));
        assert_eq!(cfg.encrypt_key, None);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ProbeSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.ttl, Duration::from_secs(600));
        assert_eq!(settings.http_timeout, None);
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = ProbeSettings::from_lookup(lookup(&[
            ("FEISHU_PROBE_TTL_SECS", "30"),
            ("FEISHU_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.ttl, Duration::from_secs(30));
        assert_eq!(settings.http_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_settings_reject_garbage() {
        let err = ProbeSettings::from_lookup(lookup(&[("FEISHU_PROBE_TTL_SECS", "ten")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSeconds {
                var: "FEISHU_PROBE_TTL_SECS",
                value: "ten".into()
            }
        );
        assert!(ProbeSettings::from_lookup(lookup(&[("FEISHU_HTTP_TIMEOUT_SECS", "0")])).is_err());
    }
}
