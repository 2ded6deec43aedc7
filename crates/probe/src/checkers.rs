//! Peer probe implementations.

use crate::types::{ProbeError, ProbeResult, ProbeTarget};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long an idle pooled connection to a peer is kept
pub const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the local API liveness request
pub const API_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Peer prober trait
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform one probe and describe the outcome
    async fn check(&self) -> ProbeResult;

    /// Whether the peer answered as expected
    async fn probe(&self) -> bool {
        self.check().await.is_healthy()
    }

    /// URL this prober targets
    fn target(&self) -> &str;
}

/// HTTPS prober with optional client certificate and expected body
pub struct HttpsProber {
    target: ProbeTarget,
    client: reqwest::Client,
}

impl HttpsProber {
    /// Build a prober; fails only on unusable TLS material or client setup
    pub fn new(target: ProbeTarget) -> Result<Self, ProbeError> {
        let mut builder = reqwest::Client::builder()
            .timeout(target.timeout)
            .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT);

        if let Some(tls) = &target.tls {
            let identity = reqwest::Identity::from_pem(&tls.identity_pem)
                .map_err(|e| ProbeError::Tls(format!("client identity: {e}")))?;
            builder = builder.identity(identity);

            for root in &tls.roots_pem {
                let cert = reqwest::Certificate::from_pem(root)
                    .map_err(|e| ProbeError::Tls(format!("root certificate: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(Self {
            client: builder.build()?,
            target,
        })
    }

    async fn exchange(&self, start: Instant) -> ProbeResult {
        let response = match self.client.get(&self.target.url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.target.url, error = %e, "Peer probe failed");
                return ProbeResult::error(start.elapsed(), format!("request failed: {e}"));
            }
        };

        let code = response.status().as_u16();
        if code != 200 {
            warn!(url = %self.target.url, status = code, "Peer probe failed: unexpected status code");
            return ProbeResult::unhealthy(start.elapsed(), format!("unexpected status code: {code}"))
                .with_code(code);
        }

        if self.target.expected_body.is_empty() {
            return ProbeResult::healthy(start.elapsed()).with_code(code);
        }

        // Reading the body to the end returns the connection to the pool
        match response.bytes().await {
            Ok(body) if body.as_ref() == self.target.expected_body.as_bytes() => {
                ProbeResult::healthy(start.elapsed()).with_code(code)
            }
            Ok(body) => {
                warn!(url = %self.target.url, len = body.len(), "Peer probe failed: body mismatch");
                ProbeResult::unhealthy(start.elapsed(), "response body mismatch").with_code(code)
            }
            Err(e) => {
                warn!(url = %self.target.url, error = %e, "Peer probe failed reading body");
                ProbeResult::error(start.elapsed(), format!("body read failed: {e}")).with_code(code)
            }
        }
    }
}

#[async_trait]
impl Prober for HttpsProber {
    async fn check(&self) -> ProbeResult {
        let start = Instant::now();

        match timeout(self.target.timeout, self.exchange(start)).await {
            Ok(result) => {
                if result.is_healthy() {
                    debug!(
                        url = %self.target.url,
                        duration_ms = result.duration.as_millis(),
                        "Peer probe successful"
                    );
                }
                result
            }
            Err(_) => {
                warn!(url = %self.target.url, "Peer probe timed out");
                ProbeResult::timeout(start.elapsed())
            }
        }
    }

    fn target(&self) -> &str {
        &self.target.url
    }
}

/// Liveness check for the local control API; any HTTP response counts
pub struct ApiLivenessProber {
    url: String,
    client: reqwest::Client,
}

impl ApiLivenessProber {
    pub fn new(url: impl Into<String>) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(API_LIVENESS_TIMEOUT)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Prober for ApiLivenessProber {
    async fn check(&self) -> ProbeResult {
        let start = Instant::now();

        match timeout(API_LIVENESS_TIMEOUT, self.client.get(&self.url).send()).await {
            Ok(Ok(response)) => {
                ProbeResult::healthy(start.elapsed()).with_code(response.status().as_u16())
            }
            Ok(Err(e)) => {
                debug!(url = %self.url, error = %e, "API not reachable");
                ProbeResult::error(start.elapsed(), format!("request failed: {e}"))
            }
            Err(_) => ProbeResult::timeout(start.elapsed()),
        }
    }

    fn target(&self) -> &str {
        &self.url
    }
}
