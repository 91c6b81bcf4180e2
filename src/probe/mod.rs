//! Provider health probing.
//!
//! A probe issues one bounded GET against the provider's readiness URL and
//! classifies the outcome. Unreachability is reported as data
//! (`ready == false` plus a detail string); only misconfiguration that
//! prevents a request from being built surfaces as a [`ProbeError`].

mod headers;
mod health_url;

pub use self::health_url::build_health_url;

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderEndpoint;
use crate::domain::ReadinessResult;
use crate::resolve::{resolve_endpoint, ResolveError, ValueResolver};

/// Upper bound on a single probe, whatever the caller's own deadline.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Misconfiguration that prevented a health request from being made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("provider base_url not configured")]
    MissingBaseUrl,
    #[error("invalid health URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to resolve base_url: {0}")]
    Unresolved(#[from] ResolveError),
}

/// Issues readiness probes against provider endpoints.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct HealthProber {
    client: Client,
    resolver: Arc<dyn ValueResolver>,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(resolver: Arc<dyn ValueResolver>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            resolver,
            timeout: PROBE_TIMEOUT,
        })
    }

    /// Lower the per-probe timeout. Values above [`PROBE_TIMEOUT`] are capped.
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(PROBE_TIMEOUT);
        self
    }

    /// Probe `endpoint` once.
    ///
    /// Resolves the endpoint's dynamic fields, then requests its health URL.
    /// An endpoint whose base URL resolves to nothing is reported ready
    /// without any network access. The whole probe, resolution included, is
    /// bounded by the probe timeout and aborted when `cancel` fires.
    pub async fn check_health(
        &self,
        endpoint: &ProviderEndpoint,
        cancel: &CancellationToken,
    ) -> ReadinessResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => ReadinessResult::not_ready("health check cancelled"),
            outcome = tokio::time::timeout(self.timeout, self.probe(endpoint)) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    ReadinessResult::not_ready(format!("health check timed out after {:?}", self.timeout))
                }
            },
        }
    }

    async fn probe(&self, endpoint: &ProviderEndpoint) -> ReadinessResult {
        let resolved = match self.resolve(endpoint).await {
            Ok(resolved) => resolved,
            Err(e) => return ReadinessResult::failed(e.into()),
        };

        if resolved.base_url.trim().is_empty() {
            return ReadinessResult::unchecked();
        }

        let url = match health_url::parse_health_url(&resolved) {
            Ok(url) => url,
            Err(e) => return ReadinessResult::failed(e),
        };

        debug!("Probing {} at {}", resolved.display_name(), url);

        let response = self
            .client
            .get(url)
            .headers(headers::health_headers(&resolved))
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                debug!("Health response from {}: {}", resolved.display_name(), status);
                if status.is_success() {
                    ReadinessResult::ready()
                } else {
                    ReadinessResult::not_ready(format!("status {}", status.as_u16()))
                }
            }
            Err(e) => ReadinessResult::not_ready(error_chain(&e)),
        }
    }

    /// Resolve dynamic fields off the async runtime; command substitutions
    /// block. An abandoned resolution finishes in the background, bounded by
    /// the resolver's own command timeout.
    async fn resolve(&self, endpoint: &ProviderEndpoint) -> Result<ProviderEndpoint, ResolveError> {
        let resolver = Arc::clone(&self.resolver);
        let endpoint = endpoint.clone();
        tokio::task::spawn_blocking(move || resolve_endpoint(resolver.as_ref(), &endpoint))
            .await
            .unwrap_or_else(|e| Err(ResolveError::Aborted(e.to_string())))
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::resolve::ShellResolver;
    use crate::test_support::{closed_port_url, StubServer};

    fn prober() -> HealthProber {
        HealthProber::new(Arc::new(ShellResolver)).unwrap()
    }

    fn endpoint(base_url: &str) -> ProviderEndpoint {
        ProviderEndpoint {
            id: "test".to_string(),
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_probe_ready() {
        let mut server = StubServer::start(200).await;
        let result = prober()
            .check_health(&endpoint(&server.url()), &CancellationToken::new())
            .await;
        assert_eq!(result, ReadinessResult::ready());

        let request = server.next_request().await;
        assert_eq!(request.path, "/models");
    }

    #[tokio::test]
    async fn test_probe_bad_gateway() {
        let server = StubServer::start(502).await;
        let result = prober()
            .check_health(&endpoint(&server.url()), &CancellationToken::new())
            .await;
        assert!(!result.ready);
        assert_eq!(result.detail, "status 502");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let url = closed_port_url().await;
        let result = prober()
            .check_health(&endpoint(&url), &CancellationToken::new())
            .await;
        assert!(!result.ready);
        assert!(!result.detail.is_empty());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_sends_auth_and_extra_headers() {
        let mut server = StubServer::start(200).await;
        let ep = ProviderEndpoint {
            kind: ProviderKind::OpenAi,
            api_key: "token".to_string(),
            startup_health_path: Some("healthz".to_string()),
            extra_headers: [("X-Extra".to_string(), "yay".to_string())].into(),
            ..endpoint(&format!("{}/", server.url()))
        };

        let result = prober().check_health(&ep, &CancellationToken::new()).await;
        assert!(result.ready);

        let request = server.next_request().await;
        assert_eq!(request.path, "/healthz");
        assert_eq!(request.header("authorization"), Some("Bearer token"));
        assert_eq!(request.header("x-extra"), Some("yay"));
    }

    #[tokio::test]
    async fn test_probe_without_base_url_is_ready() {
        let result = prober()
            .check_health(&endpoint("   "), &CancellationToken::new())
            .await;
        assert!(result.ready);
        assert_eq!(result.detail, crate::domain::NO_BASE_URL_DETAIL);
    }

    #[tokio::test]
    async fn test_probe_invalid_url_is_error() {
        let result = prober()
            .check_health(&endpoint("not a url"), &CancellationToken::new())
            .await;
        assert!(!result.ready);
        assert!(matches!(result.error, Some(ProbeError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_probe_unresolved_base_url_is_error() {
        let result = prober()
            .check_health(
                &endpoint("$PROVIDER_READY_TEST_NO_SUCH_VAR"),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result.error, Some(ProbeError::Unresolved(_))));
    }

    #[tokio::test]
    async fn test_probe_cancelled() {
        let server = StubServer::start_hanging().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = prober().check_health(&endpoint(&server.url()), &cancel).await;
        assert!(!result.ready);
        assert_eq!(result.detail, "health check cancelled");
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        let server = StubServer::start_hanging().await;
        let result = prober()
            .with_timeout(Duration::from_millis(200))
            .check_health(&endpoint(&server.url()), &CancellationToken::new())
            .await;
        assert!(!result.ready);
        assert!(!result.detail.is_empty());
    }

    /// Resolver that stalls like a slow secret command.
    struct SlowResolver(Duration);

    impl ValueResolver for SlowResolver {
        fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
            std::thread::sleep(self.0);
            Ok(raw.to_string())
        }
    }

    #[tokio::test]
    async fn test_probe_bounds_slow_resolution() {
        let server = StubServer::start(200).await;
        let prober = HealthProber::new(Arc::new(SlowResolver(Duration::from_secs(2))))
            .unwrap()
            .with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let result = prober
            .check_health(&endpoint(&server.url()), &CancellationToken::new())
            .await;
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
        assert!(!result.ready);
        assert!(result.detail.contains("timed out"), "{}", result.detail);
    }

    #[tokio::test]
    async fn test_cancelled_probe_skips_slow_resolution() {
        let server = StubServer::start(200).await;
        let prober = HealthProber::new(Arc::new(SlowResolver(Duration::from_secs(2)))).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = std::time::Instant::now();
        let result = prober.check_health(&endpoint(&server.url()), &cancel).await;
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
        assert_eq!(result.detail, "health check cancelled");
    }

    #[tokio::test]
    async fn test_probe_idempotent() {
        let server = StubServer::start(503).await;
        let prober = prober();
        let ep = endpoint(&server.url());
        let first = prober.check_health(&ep, &CancellationToken::new()).await;
        let second = prober.check_health(&ep, &CancellationToken::new()).await;
        assert_eq!(first, second);
    }
}
