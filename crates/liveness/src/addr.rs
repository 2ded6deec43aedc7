//! Local interface address lookups.
//!
//! Used to check that a configured VIP is plausible for this host before it
//! is announced.

use nix::ifaddrs::getifaddrs;
use std::net::IpAddr;
use tracing::warn;

/// One address configured on a local interface, with its prefix length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNetwork {
    pub interface: String,
    pub address: IpAddr,
    pub prefix_len: u8,
}

impl LocalNetwork {
    /// Whether `ip` falls inside this network.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.address, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_v4(self.prefix_len);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_v6(self.prefix_len);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn prefix_mask_v4(len: u8) -> u32 {
    match len {
        0 => 0,
        l if l >= 32 => u32::MAX,
        l => u32::MAX << (32 - l as u32),
    }
}

fn prefix_mask_v6(len: u8) -> u128 {
    match len {
        0 => 0,
        l if l >= 128 => u128::MAX,
        l => u128::MAX << (128 - l as u32),
    }
}

/// Enumerate IPv4 and IPv6 addresses of all local interfaces.
pub fn local_networks() -> nix::Result<Vec<LocalNetwork>> {
    let mut networks = Vec::new();

    for ifaddr in getifaddrs()? {
        let Some(address) = ifaddr.address else {
            continue;
        };

        let entry = if let Some(sin) = address.as_sockaddr_in() {
            let prefix_len = ifaddr
                .netmask
                .as_ref()
                .and_then(|mask| mask.as_sockaddr_in())
                .map(|mask| u32::from(mask.ip()).count_ones() as u8)
                .unwrap_or(32);
            LocalNetwork {
                interface: ifaddr.interface_name.clone(),
                address: IpAddr::V4(sin.ip()),
                prefix_len,
            }
        } else if let Some(sin6) = address.as_sockaddr_in6() {
            let prefix_len = ifaddr
                .netmask
                .as_ref()
                .and_then(|mask| mask.as_sockaddr_in6())
                .map(|mask| u128::from(mask.ip()).count_ones() as u8)
                .unwrap_or(128);
            LocalNetwork {
                interface: ifaddr.interface_name.clone(),
                address: IpAddr::V6(sin6.ip()),
                prefix_len,
            }
        } else {
            // Link-layer and other families carry no IP address.
            continue;
        };

        networks.push(entry);
    }

    Ok(networks)
}

/// Whether `ip` is assigned to a local, non-loopback interface.
pub fn is_local_address(ip: IpAddr) -> bool {
    match local_networks() {
        Ok(networks) => networks
            .iter()
            .any(|net| !net.address.is_loopback() && net.address == ip),
        Err(e) => {
            warn!(error = %e, "Failed to enumerate interface addresses");
            false
        }
    }
}

/// Whether `ip` falls inside any network configured on a local interface.
pub fn is_local_subnet(ip: IpAddr) -> bool {
    match local_networks() {
        Ok(networks) => networks.iter().any(|net| net.contains(ip)),
        Err(e) => {
            warn!(error = %e, "Failed to enumerate interface addresses");
            false
        }
    }
}
