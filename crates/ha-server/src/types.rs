//! HA role, keepalive mode and orchestrator settings.

use garp::AnnounceRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Role of this node in the HA pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HaRole {
    /// Before the first probe cycle completes
    Unknown,
    Backup,
    Master,
    /// A required local resource is unusable; never leaves this state
    Fault,
}

impl HaRole {
    /// Numeric value exported as the role gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            HaRole::Unknown => 0,
            HaRole::Backup => 1,
            HaRole::Master => 2,
            HaRole::Fault => 3,
        }
    }
}

impl fmt::Display for HaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaRole::Unknown => write!(f, "UNKNOWN"),
            HaRole::Backup => write!(f, "BACKUP"),
            HaRole::Master => write!(f, "MASTER"),
            HaRole::Fault => write!(f, "FAULT"),
        }
    }
}

/// Keepalive participation, read once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeepaliveMode {
    /// No HA; role pinned to Master
    #[default]
    Disabled,
    /// Spawn the keepalive daemon and listen for its signal
    SpawnIn,
    /// Spawn the keepalive daemon and emit the signal
    SpawnOut,
}

static MODE_TABLE: &[(&str, KeepaliveMode)] = &[
    ("in", KeepaliveMode::SpawnIn),
    ("spawn-in", KeepaliveMode::SpawnIn),
    ("out", KeepaliveMode::SpawnOut),
    ("spawn-out", KeepaliveMode::SpawnOut),
    ("disabled", KeepaliveMode::Disabled),
    ("none", KeepaliveMode::Disabled),
];

impl KeepaliveMode {
    /// Unknown names fall back to `Disabled`
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        MODE_TABLE
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, mode)| *mode)
            .unwrap_or_default()
    }

    /// Whether this node spawns the keepalive daemon in listen mode
    pub fn spawn_ka(&self) -> bool {
        matches!(self, KeepaliveMode::SpawnIn)
    }

    /// Whether HA signaling is active at all
    pub fn ka_mode(&self) -> bool {
        !matches!(self, KeepaliveMode::Disabled)
    }
}

impl fmt::Display for KeepaliveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepaliveMode::Disabled => write!(f, "disabled"),
            KeepaliveMode::SpawnIn => write!(f, "spawn-in"),
            KeepaliveMode::SpawnOut => write!(f, "spawn-out"),
        }
    }
}

impl From<String> for KeepaliveMode {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<KeepaliveMode> for String {
    fn from(mode: KeepaliveMode) -> Self {
        mode.to_string()
    }
}

/// External input to the role machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaEvent {
    /// Partner with higher priority claims Master
    PeerTakeover,
    /// A required local resource became unusable
    ResourceFailure(String),
}

/// Orchestrator settings, built once from configuration
#[derive(Debug, Clone)]
pub struct HaSettings {
    pub mode: KeepaliveMode,

    /// Period of the partner probe cycle
    pub probe_interval: Duration,

    /// Consecutive partner probe failures before Backup claims Master
    pub failure_threshold: u32,

    /// Consecutive bind failures for one VIP before the node faults
    pub bind_fault_threshold: u32,

    /// Periodic gratuitous ARP while Master
    pub reannounce_interval: Option<Duration>,

    /// VIPs to announce on becoming Master
    pub announce: Vec<AnnounceRequest>,

    /// BGP neighbor address of the partner, for adjacency correlation
    pub partner_bgp_peer: Option<IpAddr>,

    /// PID file of the keepalive daemon
    pub keepalive_pid_file: Option<PathBuf>,
}

impl Default for HaSettings {
    fn default() -> Self {
        Self {
            mode: KeepaliveMode::Disabled,
            probe_interval: Duration::from_secs(1),
            failure_threshold: 3,
            bind_fault_threshold: 3,
            reannounce_interval: None,
            announce: Vec::new(),
            partner_bgp_peer: None,
            keepalive_pid_file: None,
        }
    }
}
