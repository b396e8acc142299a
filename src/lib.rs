//! Feishu/Lark bot connectivity probe.
//!
//! One health-check call per app identity, with the outcome (good or
//! bad) cached for a fixed TTL and concurrent callers for the same
//! identity sharing a single in-flight request.
//!
//! ```no_run
//! # async fn demo() {
//! use feishu_probe::{FeishuConfig, Prober, ProbeSettings};
//!
//! let prober = Prober::new(ProbeSettings::default());
//! let result = prober.probe(Some(&FeishuConfig::with_app("cli_abc", "secret"))).await;
//! println!("{}", serde_json::to_string(&result).unwrap());
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod probe;

pub use client::{BotIntrospector, ClientError, ClientFactory, HttpClientFactory, RawResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, FeishuConfig, FeishuDomain, ProbeSettings};
pub use credentials::{CredentialResolver, DefaultCredentialResolver, FeishuCredentials};
pub use probe::{probe_feishu, ProbeResult, ProbeStats, Prober};
