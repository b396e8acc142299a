//! Credential resolution — turns an optional channel config into a
//! usable app identity.
//!
//! Resolution never fails loudly: anything short of an app id plus an
//! app secret is reported as "no credentials" (`None`).

use std::collections::HashMap;
use std::fmt;

use crate::config::{FeishuConfig, FeishuDomain};

const ENV_APP_ID: &str = "FEISHU_APP_ID";
const ENV_APP_SECRET: &str = "FEISHU_APP_SECRET";
const ENV_DOMAIN: &str = "FEISHU_DOMAIN";
const ENV_ENCRYPT_KEY: &str = "FEISHU_ENCRYPT_KEY";
const ENV_VERIFICATION_TOKEN: &str = "FEISHU_VERIFICATION_TOKEN";

/// A fully resolved app identity.
#[derive(Clone, PartialEq, Eq)]
pub struct FeishuCredentials {
    pub domain: FeishuDomain,
    pub app_id: String,
    pub app_secret: String,
    pub encrypt_key: Option<String>,
    pub verification_token: Option<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for FeishuCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeishuCredentials")
            .field("domain", &self.domain)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("encrypt_key", &self.encrypt_key.as_ref().map(|_| "<redacted>"))
            .field(
                "verification_token",
                &self.verification_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Resolves credentials from a config. Must be pure and synchronous.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, config: Option<&FeishuConfig>) -> Option<FeishuCredentials>;
}

/// Where the default resolver reads fallback values from.
enum EnvSource {
    Process,
    Fixed(HashMap<String, String>),
}

/// Config values first, then `FEISHU_*` environment variables.
pub struct DefaultCredentialResolver {
    env: EnvSource,
}

impl DefaultCredentialResolver {
    pub fn new() -> Self {
        Self {
            env: EnvSource::Process,
        }
    }

    /// Resolver that reads fallbacks from a fixed map instead of the
    /// process environment.
    pub fn with_env<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: EnvSource::Fixed(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        let raw = match &self.env {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(map) => map.get(name).cloned(),
        };
        non_empty(raw.as_deref())
    }

    fn field(&self, from_config: Option<&String>, env_name: &str) -> Option<String> {
        non_empty(from_config.map(String::as_str)).or_else(|| self.env_var(env_name))
    }
}

impl Default for DefaultCredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver for DefaultCredentialResolver {
    fn resolve(&self, config: Option<&FeishuConfig>) -> Option<FeishuCredentials> {
        let app_id = self.field(config.and_then(|c| c.app_id.as_ref()), ENV_APP_ID)?;
        let app_secret = self.field(config.and_then(|c| c.app_secret.as_ref()), ENV_APP_SECRET)?;

        // A blank domain parses to `Custom("")`; treat it as unset.
        let domain = config
            .and_then(|c| c.domain.clone())
            .filter(|d| !d.as_str().is_empty())
            .or_else(|| self.env_var(ENV_DOMAIN).map(|d| FeishuDomain::parse(&d)))
            .unwrap_or_default();

        Some(FeishuCredentials {
            domain,
            app_id,
            app_secret,
            encrypt_key: self.field(config.and_then(|c| c.encrypt_key.as_ref()), ENV_ENCRYPT_KEY),
            verification_token: self.field(
                config.and_then(|c| c.verification_token.as_ref()),
                ENV_VERIFICATION_TOKEN,
            ),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
