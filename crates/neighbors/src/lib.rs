//! BGP neighbor state registry
//!
//! Holds the most recent neighbor table pushed by an external BGP state
//! source. The HA orchestrator reads it to correlate partner liveness with
//! routing adjacency, and the status API reads it for the neighbor listing.

pub mod registry;
pub mod types;

pub use registry::NeighborRegistry;
pub use types::{BgpState, NeighborEntry, NeighborStatus};
