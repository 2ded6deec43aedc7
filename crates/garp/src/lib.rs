//! Gratuitous ARP announcements for VIP failover
//!
//! When a node takes over a virtual IP it broadcasts an unsolicited ARP reply
//! so switches and neighbors update their MAC tables to point at it.
//!
//! # Features
//!
//! - RFC 826 Ethernet/IPv4 ARP payload encoding and parsing
//! - `AF_PACKET` transmission with the socket scoped to one frame
//! - Cancellation before the send attempt starts
//!
//! # Example
//!
//! ```no_run
//! use garp::{AnnounceRequest, Announcer, GarpAnnouncer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let announcer = GarpAnnouncer::new();
//! let request = AnnounceRequest::new("192.168.1.100".parse()?, "eth0");
//!
//! // Requires CAP_NET_RAW
//! announcer.announce(&request).await?;
//! # Ok(())
//! # }
//! ```

mod announcer;
mod packet;
mod socket;
mod types;

pub use announcer::{
    announce_with_cancel, Announcer, FrameTransport, GarpAnnouncer, RawSocketTransport,
};
pub use packet::ArpPacket;
pub use socket::{get_interface_index, resolve_link, ArpSocket};
pub use types::{
    AnnounceError, AnnounceOutcome, AnnounceRequest, LinkInfo, ARP_OP_REPLY, ARP_PAYLOAD_LEN,
    BROADCAST_MAC, ETH_P_ARP,
};
