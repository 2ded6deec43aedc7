//! HA control core for a clustered load-balancer node
//!
//! Drives the active/standby role of this node and redirects traffic on
//! failover by announcing the VIPs with gratuitous ARP.
//!
//! # Components
//!
//! - **Orchestrator**: single control task owning the HA role
//! - **StatusBoard**: role, announce and probe status for the status API
//! - **MetricsServer**: Prometheus `/metrics` and JSON `/status`
//!
//! Peer probing lives in the `probe` crate, gratuitous ARP in `garp` and the
//! BGP neighbor table in `neighbors`.

pub mod config;
pub mod http_server;
pub mod metrics;
pub mod orchestrator;
pub mod server;
pub mod status;
pub mod types;

pub use config::{Config, ConfigError};
pub use http_server::{AppState, MetricsServer};
pub use metrics::MetricsRegistry;
pub use orchestrator::Orchestrator;
pub use server::{usable_announces, HaServer};
pub use status::{HaStatus, StatusBoard};
pub use types::{HaEvent, HaRole, HaSettings, KeepaliveMode};
