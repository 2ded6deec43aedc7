//! Liveness helpers for the HA control core.
//!
//! - PID-file based process liveness
//! - Local interface address and subnet membership
//! - Elapsed-time formatting for status listings

pub mod addr;
pub mod pid;
pub mod uptime;

pub use addr::{is_local_address, is_local_subnet, local_networks, LocalNetwork};
pub use pid::process_alive;
pub use uptime::{format_delta, format_uptime};
