//! Shared HA status read by the status API.
//!
//! Only the orchestrator writes here; everything else goes through the
//! read accessors.

use crate::types::HaRole;
use dashmap::DashMap;
use garp::AnnounceOutcome;
use neighbors::{NeighborRegistry, NeighborStatus};
use probe::ProbeResult;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Current role and when it was entered
#[derive(Debug, Clone, Copy)]
pub struct RoleRecord {
    pub role: HaRole,
    pub since: SystemTime,
}

/// Last announce attempt for one VIP
#[derive(Debug, Clone, Serialize)]
pub struct AnnounceStatus {
    pub vip: Ipv4Addr,
    pub interface: String,
    pub ok: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub at: SystemTime,
}

/// Last probe result for one peer
#[derive(Debug, Clone, Serialize)]
pub struct PeerStatus {
    pub target: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub latency_ms: f64,
    pub message: Option<String>,
}

/// Serializable status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HaStatus {
    pub role: HaRole,
    pub role_uptime: String,
    pub transitions: u64,
    pub degraded: bool,
    pub announces: Vec<AnnounceStatus>,
    pub peers: Vec<PeerStatus>,
    pub neighbors: Vec<NeighborStatus>,
}

/// HA status shared between the orchestrator and readers
pub struct StatusBoard {
    role: RwLock<RoleRecord>,
    announces: DashMap<Ipv4Addr, AnnounceStatus>,
    peers: DashMap<String, PeerStatus>,
    degraded: AtomicBool,
    transitions: AtomicU64,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            role: RwLock::new(RoleRecord {
                role: HaRole::Unknown,
                since: SystemTime::now(),
            }),
            announces: DashMap::new(),
            peers: DashMap::new(),
            degraded: AtomicBool::new(false),
            transitions: AtomicU64::new(0),
        }
    }

    pub async fn role(&self) -> HaRole {
        self.role.read().await.role
    }

    pub async fn role_record(&self) -> RoleRecord {
        *self.role.read().await
    }

    /// Number of role changes since start
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn announce_status(&self, vip: Ipv4Addr) -> Option<AnnounceStatus> {
        self.announces.get(&vip).map(|entry| entry.clone())
    }

    pub fn peer_status(&self, target: &str) -> Option<PeerStatus> {
        self.peers.get(target).map(|entry| entry.clone())
    }

    /// Full snapshot, including the neighbor listing
    pub async fn report(&self, registry: &NeighborRegistry) -> HaStatus {
        let record = self.role_record().await;

        let mut announces: Vec<AnnounceStatus> =
            self.announces.iter().map(|e| e.value().clone()).collect();
        announces.sort_by_key(|a| a.vip);

        let mut peers: Vec<PeerStatus> = self.peers.iter().map(|e| e.value().clone()).collect();
        peers.sort_by(|a, b| a.target.cmp(&b.target));

        HaStatus {
            role: record.role,
            role_uptime: liveness::format_uptime(record.since),
            transitions: self.transitions(),
            degraded: self.is_degraded(),
            announces,
            peers,
            neighbors: registry.status_listing(),
        }
    }

    pub(crate) async fn set_role(&self, role: HaRole) {
        let mut record = self.role.write().await;
        if record.role != role {
            *record = RoleRecord {
                role,
                since: SystemTime::now(),
            };
            self.transitions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }

    pub(crate) fn record_announce(&self, outcome: &AnnounceOutcome) {
        let status = AnnounceStatus {
            vip: outcome.request.target_ip,
            interface: outcome.request.interface.clone(),
            ok: outcome.result.is_ok(),
            error: outcome.result.as_ref().err().map(|e| e.to_string()),
            at: SystemTime::now(),
        };
        self.announces.insert(status.vip, status);
    }

    pub(crate) fn record_probe(&self, target: &str, result: &ProbeResult, consecutive_failures: u32) {
        self.peers.insert(
            target.to_string(),
            PeerStatus {
                target: target.to_string(),
                healthy: result.is_healthy(),
                consecutive_failures,
                latency_ms: result.duration.as_secs_f64() * 1000.0,
                message: result.message.clone(),
            },
        );
    }
}
