//! Probe executor — one network round-trip, classified into a
//! [`ProbeResult`]. Never fails: every error path becomes a failure
//! result. Caching and coalescing live in the prober, not here.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::client::{BotInfoShape, ClientFactory};
use crate::config::FeishuConfig;
use crate::credentials::CredentialResolver;

use super::ProbeResult;

pub const MISSING_CREDENTIALS: &str = "missing credentials (appId, appSecret)";

pub struct ProbeExecutor {
    resolver: Arc<dyn CredentialResolver>,
    factory: Arc<dyn ClientFactory>,
}

impl ProbeExecutor {
    pub fn new(resolver: Arc<dyn CredentialResolver>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { resolver, factory }
    }

    /// App id the config resolves to, if any.
    pub fn app_id(&self, config: Option<&FeishuConfig>) -> Option<String> {
        self.resolver.resolve(config).map(|creds| creds.app_id)
    }

    pub async fn execute(&self, config: Option<&FeishuConfig>) -> ProbeResult {
        let Some(creds) = self.resolver.resolve(config) else {
            warn!("Feishu probe skipped: {}", MISSING_CREDENTIALS);
            return ProbeResult::failure(None, MISSING_CREDENTIALS);
        };
        let app_id = creds.app_id.clone();

        let client = match self.factory.create(&creds) {
            Ok(c) => c,
            Err(e) => {
                warn!(app_id = %app_id, "Failed to build Feishu client: {}", e);
                return ProbeResult::failure(Some(app_id), e.to_string());
            }
        };

        info!(app_id = %app_id, domain = %creds.domain, "Probing Feishu bot...");
        let start = Instant::now();

        let result = match client.introspect().await {
            Err(e) => ProbeResult::failure(Some(app_id), e.to_string()),
            Ok(resp) if !resp.is_ok() => ProbeResult::failure(Some(app_id), resp.error_message()),
            Ok(resp) => {
                let bot = resp.shape().map(BotInfoShape::identity);
                ProbeResult::success(
                    app_id,
                    bot.and_then(|b| b.bot_name.clone()),
                    bot.and_then(|b| b.open_id.clone()),
                )
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        match result.error() {
            None => info!(app_id = ?result.app_id(), latency_ms, "Feishu probe ok"),
            Some(err) => warn!(app_id = ?result.app_id(), latency_ms, "Feishu probe failed: {}", err),
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    use crate::client::{BotIntrospector, ClientError, RawResponse};
    use crate::config::FeishuDomain;
    use crate::credentials::{DefaultCredentialResolver, FeishuCredentials};

    /// What the fake platform does on `introspect()`.
    #[derive(Clone)]
    pub(crate) enum Reply {
        Json(&'static str),
        /// HTTP 502 with an HTML body.
        BadGateway,
        Panic,
    }

    /// Counting client factory. `calls` counts network round-trips.
    pub(crate) struct FakeFactory {
        pub(crate) calls: Arc<AtomicUsize>,
        pub(crate) reply: Reply,
        pub(crate) gate: Option<Arc<Semaphore>>,
        pub(crate) fail_create: bool,
    }

    impl FakeFactory {
        pub(crate) fn new(reply: Reply) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                reply,
                gate: None,
                fail_create: false,
            }
        }

        /// Every introspect call waits for a permit on `gate`.
        pub(crate) fn gated(reply: Reply, gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(reply)
            }
        }
    }

    struct FakeClient {
        calls: Arc<AtomicUsize>,
        reply: Reply,
        gate: Option<Arc<Semaphore>>,
    }

    #[async_trait]
    impl BotIntrospector for FakeClient {
        async fn introspect(&self) -> Result<RawResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
                permit.forget();
            }
            match &self.reply {
                Reply::Json(body) => Ok(serde_json::from_str(body).unwrap()),
                Reply::BadGateway => {
                    let source = serde_json::from_str::<RawResponse>("<html>bad gateway</html>")
                        .unwrap_err();
                    Err(ClientError::Decode { status: 502, source })
                }
                Reply::Panic => panic!("introspector exploded"),
            }
        }
    }

    impl ClientFactory for FakeFactory {
        fn create(&self, _creds: &FeishuCredentials) -> Result<Box<dyn BotIntrospector>, ClientError> {
            if self.fail_create {
                return Err(ClientError::Build("no TLS backend".into()));
            }
            Ok(Box::new(FakeClient {
                calls: Arc::clone(&self.calls),
                reply: self.reply.clone(),
                gate: self.gate.clone(),
            }))
        }
    }

    pub(crate) fn resolver() -> Arc<dyn CredentialResolver> {
        Arc::new(DefaultCredentialResolver::with_env(Vec::<(String, String)>::new()))
    }

    fn executor(factory: FakeFactory) -> (ProbeExecutor, Arc<AtomicUsize>) {
        let calls = Arc::clone(&factory.calls);
        (ProbeExecutor::new(resolver(), Arc::new(factory)), calls)
    }

    fn cfg() -> FeishuConfig {
        FeishuConfig::with_app("cli_abc", "secret").domain(FeishuDomain::Feishu)
    }

    #[tokio::test]
    async fn test_success_top_level_bot() {
        let (exec, calls) = executor(FakeFactory::new(Reply::Json(
            r#"{"code":0,"bot":{"bot_name":"Helper","open_id":"ou_123"}}"#,
        )));
        let result = exec.execute(Some(&cfg())).await;
        assert_eq!(
            result,
            ProbeResult::success("cli_abc", Some("Helper".into()), Some("ou_123".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_nested_bot() {
        let (exec, _) = executor(FakeFactory::new(Reply::Json(
            r#"{"code":0,"data":{"bot":{"bot_name":"Nested","open_id":"ou_9"}}}"#,
        )));
        let result = exec.execute(Some(&cfg())).await;
        assert_eq!(
            result,
            ProbeResult::success("cli_abc", Some("Nested".into()), Some("ou_9".into()))
        );
    }

    #[tokio::test]
    async fn test_success_without_identity() {
        let (exec, _) = executor(FakeFactory::new(Reply::Json(r#"{"code":0,"msg":"ok"}"#)));
        assert_eq!(
            exec.execute(Some(&cfg())).await,
            ProbeResult::success("cli_abc", None, None)
        );
    }

    #[tokio::test]
    async fn test_logical_error() {
        let (exec, _) = executor(FakeFactory::new(Reply::Json(
            r#"{"code":99991663,"msg":"invalid token"}"#,
        )));
        assert_eq!(
            exec.execute(Some(&cfg())).await,
            ProbeResult::failure(Some("cli_abc".into()), "API error: invalid token")
        );
    }

    #[tokio::test]
    async fn test_undecodable_response() {
        let (exec, _) = executor(FakeFactory::new(Reply::BadGateway));
        let result = exec.execute(Some(&cfg())).await;
        assert_eq!(result.app_id(), Some("cli_abc"));
        let err = result.error().unwrap();
        assert!(err.starts_with("unexpected response (HTTP 502): "), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_client_construction_error() {
        let mut factory = FakeFactory::new(Reply::Json(r#"{"code":0}"#));
        factory.fail_create = true;
        let (exec, calls) = executor(factory);
        let result = exec.execute(Some(&cfg())).await;
        assert_eq!(
            result,
            ProbeResult::failure(
                Some("cli_abc".into()),
                "failed to build HTTP client: no TLS backend"
            )
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_makes_no_call() {
        let (exec, calls) = executor(FakeFactory::new(Reply::Json(r#"{"code":0}"#)));
        assert_eq!(
            exec.execute(None).await,
            ProbeResult::failure(None, MISSING_CREDENTIALS)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
