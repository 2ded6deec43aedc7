//! Probe types and structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Probe outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// Peer answered as expected
    Healthy,
    /// Peer answered, but not as expected
    Unhealthy,
    /// Probe timed out
    Timeout,
    /// Transport error
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Healthy => write!(f, "HEALTHY"),
            ProbeStatus::Unhealthy => write!(f, "UNHEALTHY"),
            ProbeStatus::Timeout => write!(f, "TIMEOUT"),
            ProbeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Probe result
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Status of the probe
    pub status: ProbeStatus,

    /// Duration of the probe
    pub duration: Duration,

    /// Optional failure description
    pub message: Option<String>,

    /// HTTP status code, when a response arrived
    pub response_code: Option<u16>,
}

impl ProbeResult {
    pub fn healthy(duration: Duration) -> Self {
        Self {
            status: ProbeStatus::Healthy,
            duration,
            message: None,
            response_code: None,
        }
    }

    pub fn unhealthy(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unhealthy,
            duration,
            message: Some(message.into()),
            response_code: None,
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self {
            status: ProbeStatus::Timeout,
            duration,
            message: Some("Probe timed out".to_string()),
            response_code: None,
        }
    }

    pub fn error(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            duration,
            message: Some(message.into()),
            response_code: None,
        }
    }

    /// Attach the HTTP status code of the response
    pub fn with_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ProbeStatus::Healthy
    }
}

/// Client certificate and trusted roots for mutual TLS
#[derive(Clone)]
pub struct TlsIdentity {
    /// PEM-encoded certificate chain followed by the private key
    pub identity_pem: Vec<u8>,

    /// PEM-encoded trusted root certificates
    pub roots_pem: Vec<Vec<u8>>,
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("identity_pem", &format_args!("<{} bytes>", self.identity_pem.len()))
            .field("roots", &self.roots_pem.len())
            .finish()
    }
}

impl TlsIdentity {
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], roots_pem: Vec<Vec<u8>>) -> Self {
        let mut identity_pem = Vec::with_capacity(cert_pem.len() + key_pem.len() + 1);
        identity_pem.extend_from_slice(cert_pem);
        if !cert_pem.ends_with(b"\n") {
            identity_pem.push(b'\n');
        }
        identity_pem.extend_from_slice(key_pem);

        Self {
            identity_pem,
            roots_pem,
        }
    }

    /// Load the client certificate, its key and an optional CA bundle
    pub fn load(cert: &Path, key: &Path, ca: Option<&Path>) -> Result<Self, ProbeError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| ProbeError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        let cert_pem = read(cert)?;
        let key_pem = read(key)?;
        let roots_pem = match ca {
            Some(ca) => vec![read(ca)?],
            None => Vec::new(),
        };

        Ok(Self::from_pem(&cert_pem, &key_pem, roots_pem))
    }
}

/// One health-check destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// Health endpoint URL
    pub url: String,

    /// Exact body expected in a 200 response; empty accepts any body
    #[serde(default)]
    pub expected_body: String,

    /// Bound on the whole exchange
    #[serde(with = "humantime_serde", default = "default_probe_timeout")]
    pub timeout: Duration,

    /// Client identity for mutual TLS
    #[serde(skip)]
    pub tls: Option<TlsIdentity>,
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

impl ProbeTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected_body: String::new(),
            timeout: default_probe_timeout(),
            tls: None,
        }
    }

    pub fn with_expected_body(mut self, body: impl Into<String>) -> Self {
        self.expected_body = body.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsIdentity) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Prober construction failures
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TLS material: {0}")]
    Tls(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl From<ProbeError> for common::Error {
    fn from(e: ProbeError) -> Self {
        common::Error::validation(e)
    }
}

/// Per-target probe statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProbeStats {
    pub total_probes: u64,
    pub successful_probes: u64,
    pub failed_probes: u64,
    pub timeouts: u64,
    pub avg_response_time_ms: f64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl ProbeStats {
    /// Update stats with a probe result
    pub fn update(&mut self, result: &ProbeResult) {
        self.total_probes += 1;

        match result.status {
            ProbeStatus::Healthy => {
                self.successful_probes += 1;
                self.consecutive_successes += 1;
                self.consecutive_failures = 0;
            }
            ProbeStatus::Unhealthy | ProbeStatus::Error => {
                self.failed_probes += 1;
                self.consecutive_failures += 1;
                self.consecutive_successes = 0;
            }
            ProbeStatus::Timeout => {
                self.timeouts += 1;
                self.consecutive_failures += 1;
                self.consecutive_successes = 0;
            }
        }

        let duration_ms = result.duration.as_millis() as f64;
        self.avg_response_time_ms = (self.avg_response_time_ms * (self.total_probes - 1) as f64
            + duration_ms)
            / self.total_probes as f64;
    }
}

/// Result of one periodic probe, as delivered to the orchestrator
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub target: String,
    pub result: ProbeResult,
    pub stats: ProbeStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_serde_defaults() {
        let target: ProbeTarget =
            serde_json::from_str(r#"{"url": "https://10.0.0.2:11111/health"}"#).unwrap();
        assert!(target.expected_body.is_empty());
        assert_eq!(target.timeout, Duration::from_secs(2));
        assert!(target.tls.is_none());
    }

    #[test]
    fn test_identity_concatenation() {
        let tls = TlsIdentity::from_pem(b"CERT", b"KEY\n", vec![b"ROOT".to_vec()]);
        assert_eq!(tls.identity_pem, b"CERT\nKEY\n");
        assert_eq!(tls.roots_pem.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("client.crt");
        let err = TlsIdentity::load(&missing, &missing, None).unwrap_err();
        assert!(matches!(err, ProbeError::Io { .. }));
    }

    #[test]
    fn test_stats_failure_streak() {
        let mut stats = ProbeStats::default();
        stats.update(&ProbeResult::healthy(Duration::from_millis(10)));
        stats.update(&ProbeResult::timeout(Duration::from_millis(30)));
        stats.update(&ProbeResult::error(Duration::from_millis(20), "refused"));

        assert_eq!(stats.total_probes, 3);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.failed_probes, 1);
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.consecutive_successes, 0);
        assert!((stats.avg_response_time_ms - 20.0).abs() < f64::EPSILON);
    }
}
