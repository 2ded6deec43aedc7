//! Configuration loading and validation for the HA server

use crate::types::{HaSettings, KeepaliveMode};
use garp::AnnounceRequest;
use probe::{ProbeError, ProbeTarget, TlsIdentity};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] ValidationErrors),
}

impl From<ConfigError> for common::Error {
    fn from(e: ConfigError) -> Self {
        common::Error::config(e)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub keepalive: KeepaliveSettings,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub announce: AnnounceSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.probe.validate()?;
        self.announce.validate()?;
        self.metrics.validate()?;

        if self.keepalive.mode.ka_mode() && self.probe.partner.is_none() {
            let mut errors = ValidationErrors::new();
            errors.add("partner", ValidationError::new("partner_required_with_keepalive"));
            return Err(errors);
        }
        Ok(())
    }
}

/// Keepalive participation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeepaliveSettings {
    #[serde(default)]
    pub mode: KeepaliveMode,

    /// PID file of the keepalive daemon
    pub pid_file: Option<PathBuf>,
}

/// One HTTP(S) health endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EndpointSettings {
    #[validate(custom = "validate_probe_url")]
    pub url: String,

    #[serde(default)]
    pub expected_body: String,

    #[serde(with = "humantime_serde", default = "default_probe_timeout")]
    #[validate(custom = "validate_probe_timeout")]
    pub timeout: Duration,
}

/// Client certificate material for mutual TLS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsSettings {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: Option<PathBuf>,
}

/// Peer probing settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProbeSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_interval")]
    pub interval: Duration,

    #[validate(range(min = 1, max = 100))]
    pub failure_threshold: u32,

    /// HA partner health endpoint
    #[validate]
    pub partner: Option<EndpointSettings>,

    /// BGP neighbor address of the partner
    pub partner_bgp_peer: Option<IpAddr>,

    /// Additional peers probed for status reporting only
    #[validate]
    pub peers: Vec<EndpointSettings>,

    /// Local control API; any HTTP answer counts as alive
    #[validate(custom = "validate_probe_url")]
    pub api_liveness_url: Option<String>,

    pub tls: Option<TlsSettings>,
}

/// Gratuitous ARP settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnnounceSettings {
    #[validate(custom = "validate_vips")]
    pub vips: Vec<AnnounceRequest>,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_reannounce_interval")]
    pub reannounce_interval: Option<Duration>,

    #[validate(range(min = 1, max = 100))]
    pub bind_fault_threshold: u32,
}

/// Metrics and status HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,

    #[validate(length(min = 1))]
    pub listen_addr: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            failure_threshold: 3,
            partner: None,
            partner_bgp_peer: None,
            peers: Vec::new(),
            api_liveness_url: None,
            tls: None,
        }
    }
}

impl Default for AnnounceSettings {
    fn default() -> Self {
        Self {
            vips: Vec::new(),
            reannounce_interval: None,
            bind_fault_threshold: 3,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:9110".to_string(),
        }
    }
}

// Custom validators

fn validate_probe_url(url: &str) -> Result<(), ValidationError> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ValidationError::new("probe_url_invalid")),
    }
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if !(10..=60_000).contains(&millis) {
        return Err(ValidationError::new("probe_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_probe_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if !(100..=60_000).contains(&millis) {
        return Err(ValidationError::new("probe_interval_out_of_range"));
    }
    Ok(())
}

fn validate_reannounce_interval(interval: &Duration) -> Result<(), ValidationError> {
    if interval.as_millis() < 100 {
        return Err(ValidationError::new("reannounce_interval_too_short"));
    }
    Ok(())
}

fn validate_vips(vips: &[AnnounceRequest]) -> Result<(), ValidationError> {
    for vip in vips {
        if vip.interface.trim().is_empty() {
            return Err(ValidationError::new("vip_interface_empty"));
        }
        if vip.target_ip.is_unspecified() || vip.target_ip.is_broadcast() || vip.target_ip.is_multicast() {
            return Err(ValidationError::new("vip_address_invalid"));
        }
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/loadbalancer/ha.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./ha.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/loadbalancer/ha.yaml"))
    }

    /// Convert to orchestrator settings
    pub fn to_settings(&self) -> HaSettings {
        HaSettings {
            mode: self.keepalive.mode,
            probe_interval: self.probe.interval,
            failure_threshold: self.probe.failure_threshold,
            bind_fault_threshold: self.announce.bind_fault_threshold,
            reannounce_interval: self.announce.reannounce_interval,
            announce: self.announce.vips.clone(),
            partner_bgp_peer: self.probe.partner_bgp_peer,
            keepalive_pid_file: self.keepalive.pid_file.clone(),
        }
    }

    /// Load the client identity, if one is configured
    pub fn tls_identity(&self) -> Result<Option<TlsIdentity>, ProbeError> {
        self.probe
            .tls
            .as_ref()
            .map(|tls| TlsIdentity::load(&tls.cert, &tls.key, tls.ca.as_deref()))
            .transpose()
    }

    /// Partner probe target, carrying the shared client identity
    pub fn partner_target(&self, tls: Option<&TlsIdentity>) -> Option<ProbeTarget> {
        self.probe
            .partner
            .as_ref()
            .map(|endpoint| endpoint.to_target(tls))
    }

    /// Status-only peer targets
    pub fn peer_targets(&self, tls: Option<&TlsIdentity>) -> Vec<ProbeTarget> {
        self.probe
            .peers
            .iter()
            .map(|endpoint| endpoint.to_target(tls))
            .collect()
    }
}

impl EndpointSettings {
    fn to_target(&self, tls: Option<&TlsIdentity>) -> ProbeTarget {
        let target = ProbeTarget::new(self.url.trim())
            .with_expected_body(self.expected_body.clone())
            .with_timeout(self.timeout);

        match tls {
            Some(tls) => target.with_tls(tls.clone()),
            None => target,
        }
    }
}
