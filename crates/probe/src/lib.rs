//! Peer reachability probing for HA pairs
//!
//! A node decides whether its partner is alive by fetching the partner's
//! health endpoint over HTTPS. The peer counts as up only for a `200` whose
//! body matches the configured string exactly.
//!
//! # Example
//!
//! ```no_run
//! use probe::{HttpsProber, ProbeTarget, Prober};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = ProbeTarget::new("https://10.0.0.2:11111/netlox/v1/config/params")
//!     .with_expected_body("OK");
//! let prober = HttpsProber::new(target)?;
//!
//! if !prober.probe().await {
//!     println!("partner is down");
//! }
//! # Ok(())
//! # }
//! ```

pub mod checkers;
pub mod monitor;
pub mod types;

pub use checkers::{ApiLivenessProber, HttpsProber, Prober};
pub use monitor::ProbeMonitor;
pub use types::{
    ProbeError, ProbeReport, ProbeResult, ProbeStats, ProbeStatus, ProbeTarget, TlsIdentity,
};
