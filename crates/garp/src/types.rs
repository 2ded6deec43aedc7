//! Gratuitous ARP data types.
//!
//! Based on RFC 826 (ARP) and RFC 5227 Section 3 (announcements).

use common::ErrorClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// EtherType for ARP
pub const ETH_P_ARP: u16 = 0x0806;

/// ARP hardware type for Ethernet
pub const ARP_HW_ETHERNET: u16 = 1;

/// ARP protocol type for IPv4
pub const ARP_PROTO_IPV4: u16 = 0x0800;

/// ARP operation code for a reply
pub const ARP_OP_REPLY: u16 = 2;

/// Ethernet broadcast address
pub const BROADCAST_MAC: [u8; 6] = [0xff; 6];

/// Length of an Ethernet/IPv4 ARP payload
pub const ARP_PAYLOAD_LEN: usize = 28;

/// A VIP to announce on an interface after becoming Master
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnounceRequest {
    /// Virtual IP whose ownership is announced
    pub target_ip: Ipv4Addr,

    /// Interface the announcement is sent on
    pub interface: String,
}

impl AnnounceRequest {
    pub fn new(target_ip: Ipv4Addr, interface: impl Into<String>) -> Self {
        Self {
            target_ip,
            interface: interface.into(),
        }
    }
}

impl fmt::Display for AnnounceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.target_ip, self.interface)
    }
}

/// Announcement failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnounceError {
    #[error("interface {interface}: {reason}")]
    Interface { interface: String, reason: String },

    #[error("packet socket unavailable: {0}")]
    Socket(String),

    #[error("bind on {interface} failed: {reason}")]
    Bind { interface: String, reason: String },

    #[error("transmit on {interface} failed: {reason}")]
    Transmit { interface: String, reason: String },

    #[error("announce cancelled before transmission")]
    Cancelled,
}

impl AnnounceError {
    pub fn interface(interface: &str, reason: impl fmt::Display) -> Self {
        AnnounceError::Interface {
            interface: interface.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn bind(interface: &str, reason: impl fmt::Display) -> Self {
        AnnounceError::Bind {
            interface: interface.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn transmit(interface: &str, reason: impl fmt::Display) -> Self {
        AnnounceError::Transmit {
            interface: interface.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Failure-policy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            AnnounceError::Interface { .. } => ErrorClass::Validation,
            AnnounceError::Socket(_) | AnnounceError::Bind { .. } => ErrorClass::Resource,
            AnnounceError::Transmit { .. } | AnnounceError::Cancelled => ErrorClass::Transport,
        }
    }
}

impl From<AnnounceError> for common::Error {
    fn from(e: AnnounceError) -> Self {
        match e.class() {
            ErrorClass::Validation => common::Error::validation(e),
            ErrorClass::Resource => common::Error::resource(e),
            ErrorClass::Transport => common::Error::transport(e),
            ErrorClass::Fatal => common::Error::fatal(e),
        }
    }
}

/// Result of one announce attempt, delivered on a completion channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceOutcome {
    pub request: AnnounceRequest,
    pub result: Result<(), AnnounceError>,
}

/// Resolved link-layer details of an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub name: String,
    pub index: u32,
    pub mac: [u8; 6],
    pub up: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            AnnounceError::interface("eth9", "not found").class(),
            ErrorClass::Validation
        );
        assert_eq!(AnnounceError::Socket("EPERM".into()).class(), ErrorClass::Resource);
        assert_eq!(AnnounceError::bind("eth0", "EADDRNOTAVAIL").class(), ErrorClass::Resource);
        assert_eq!(AnnounceError::transmit("eth0", "ENOBUFS").class(), ErrorClass::Transport);

        let err: common::Error = AnnounceError::bind("eth0", "denied").into();
        assert!(err.escalates());
    }

    #[test]
    fn test_request_display() {
        let req = AnnounceRequest::new("10.0.0.100".parse().unwrap(), "eth0");
        assert_eq!(req.to_string(), "10.0.0.100@eth0");
    }
}
