//! BGP neighbor data model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::SystemTime;

/// BGP finite-state-machine state of a neighbor session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BgpState {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
    /// State string the upstream source reported but we do not model
    Other(String),
}

impl BgpState {
    pub fn is_established(&self) -> bool {
        matches!(self, BgpState::Established)
    }
}

impl fmt::Display for BgpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BgpState::Idle => write!(f, "Idle"),
            BgpState::Connect => write!(f, "Connect"),
            BgpState::Active => write!(f, "Active"),
            BgpState::OpenSent => write!(f, "OpenSent"),
            BgpState::OpenConfirm => write!(f, "OpenConfirm"),
            BgpState::Established => write!(f, "Established"),
            BgpState::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for BgpState {
    type Err = std::convert::Infallible;

    /// Accepts plain names and `BGP_FSM_`-prefixed names in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let name = upper.strip_prefix("BGP_FSM_").unwrap_or(&upper);

        Ok(match name {
            "IDLE" => BgpState::Idle,
            "CONNECT" => BgpState::Connect,
            "ACTIVE" => BgpState::Active,
            "OPENSENT" | "OPEN_SENT" => BgpState::OpenSent,
            "OPENCONFIRM" | "OPEN_CONFIRM" => BgpState::OpenConfirm,
            "ESTABLISHED" => BgpState::Established,
            _ => BgpState::Other(trimmed.to_string()),
        })
    }
}

/// One routing peer in a registry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEntry {
    /// Peer address; unique within a snapshot
    pub address: IpAddr,

    pub remote_as: u32,

    pub state: BgpState,

    /// When the session last changed between up and down
    pub up_since: SystemTime,
}

impl NeighborEntry {
    pub fn new(address: IpAddr, remote_as: u32, state: BgpState, up_since: SystemTime) -> Self {
        Self {
            address,
            remote_as,
            state,
            up_since,
        }
    }
}

/// Neighbor row as exposed by the status API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborStatus {
    pub ip_address: String,
    pub remote_as: u32,
    pub state: String,
    pub updowntime: String,
}

impl From<&NeighborEntry> for NeighborStatus {
    fn from(entry: &NeighborEntry) -> Self {
        Self {
            ip_address: entry.address.to_string(),
            remote_as: entry.remote_as,
            state: entry.state.to_string(),
            updowntime: liveness::format_uptime(entry.up_since),
        }
    }
}
