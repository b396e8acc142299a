//! Cache key derivation.

use crate::config::FeishuConfig;
use crate::credentials::{CredentialResolver, FeishuCredentials};

/// Shared key for every config that resolves to no credentials.
pub const NO_CREDENTIALS_KEY: &str = "no-credentials";

/// Derive the cache key for a config.
pub fn cache_key(resolver: &dyn CredentialResolver, config: Option<&FeishuConfig>) -> String {
    match resolver.resolve(config) {
        Some(creds) => identity_key(&creds),
        None => NO_CREDENTIALS_KEY.to_string(),
    }
}

/// Only the domain and app id take part; secrets never reach the key.
/// Custom domains are URLs and contain `:`, so the domain is
/// length-prefixed to keep the encoding unambiguous.
pub fn identity_key(creds: &FeishuCredentials) -> String {
    let domain = creds.domain.as_str();
    format!("{}:{}:{}", domain.len(), domain, creds.app_id)
}
