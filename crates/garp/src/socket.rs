//! Link-layer socket handling for gratuitous ARP.
//!
//! Implements `AF_PACKET` socket creation, device and link-layer binding, and
//! single-frame transmission. The socket is closed when `ArpSocket` drops.

use crate::types::{AnnounceError, ETH_P_ARP, LinkInfo};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use socket2::{Domain, Protocol, Socket, Type};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::AsRawFd;

/// Packet socket bound to one interface and to the broadcast link address
pub struct ArpSocket {
    socket: Socket,
    interface: String,
    ifindex: u32,
}

impl ArpSocket {
    /// Open a datagram packet socket for ARP on `link`
    ///
    /// # Arguments
    /// * `link` - Resolved interface (see [`resolve_link`])
    pub fn open(link: &LinkInfo) -> Result<Self, AnnounceError> {
        let socket = Socket::new(
            Domain::PACKET,
            Type::DGRAM,
            Some(Protocol::from(i32::from(ETH_P_ARP.to_be()))),
        )
        .map_err(|e| AnnounceError::Socket(e.to_string()))?;

        socket
            .bind_device(Some(link.name.as_bytes()))
            .map_err(|e| AnnounceError::bind(&link.name, e))?;

        let addr = broadcast_link_addr(link.index);
        let ret = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(AnnounceError::bind(&link.name, io::Error::last_os_error()));
        }

        Ok(Self {
            socket,
            interface: link.name.clone(),
            ifindex: link.index,
        })
    }

    /// Send one frame payload to the link-layer broadcast address
    pub fn send(&self, payload: &[u8]) -> Result<usize, AnnounceError> {
        let addr = broadcast_link_addr(self.ifindex);
        let sent = unsafe {
            libc::sendto(
                self.socket.as_raw_fd(),
                payload.as_ptr() as *const libc::c_void,
                payload.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };

        if sent < 0 {
            return Err(AnnounceError::transmit(
                &self.interface,
                io::Error::last_os_error(),
            ));
        }

        Ok(sent as usize)
    }
}

/// Link-layer destination: all-ones hardware address on `ifindex`
fn broadcast_link_addr(ifindex: u32) -> libc::sockaddr_ll {
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = ETH_P_ARP.to_be();
    addr.sll_ifindex = ifindex as libc::c_int;
    addr.sll_hatype = 1; // ARPHRD_ETHER
    addr.sll_pkttype = 0; // PACKET_HOST
    addr.sll_halen = 6;
    addr.sll_addr = [0xff; 8];
    addr
}

/// Get the interface index for a given interface name
pub fn get_interface_index(name: &str) -> Result<u32, AnnounceError> {
    let c_name = CString::new(name).map_err(|e| AnnounceError::interface(name, e))?;

    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };

    if index == 0 {
        Err(AnnounceError::interface(name, "not found"))
    } else {
        Ok(index)
    }
}

/// Resolve index, hardware address and admin state of `name`
pub fn resolve_link(name: &str) -> Result<LinkInfo, AnnounceError> {
    let index = get_interface_index(name)?;

    let addrs = getifaddrs().map_err(|e| AnnounceError::interface(name, e))?;

    let mut mac = None;
    let mut up = false;
    for ifaddr in addrs.filter(|a| a.interface_name == name) {
        up |= ifaddr.flags.contains(InterfaceFlags::IFF_UP);
        if let Some(link) = ifaddr.address.as_ref().and_then(|a| a.as_link_addr()) {
            if let Some(hw) = link.addr() {
                mac = Some(hw);
            }
        }
    }

    let mac = mac.ok_or_else(|| AnnounceError::interface(name, "no hardware address"))?;

    Ok(LinkInfo {
        name: name.to_string(),
        index,
        mac,
        up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_index() {
        // "lo" (loopback) should always exist
        let result = get_interface_index("lo");
        assert!(result.is_ok());
        assert!(result.unwrap() > 0);

        // Non-existent interface
        let result = get_interface_index("nonexistent99");
        assert!(matches!(result, Err(AnnounceError::Interface { .. })));
    }

    #[test]
    fn test_resolve_link() {
        // Sandboxed kernels may hide AF_PACKET entries for loopback
        if let Ok(link) = resolve_link("lo") {
            assert_eq!(link.name, "lo");
            assert!(link.index > 0);
            assert!(link.up);
        }

        assert!(matches!(
            resolve_link("nonexistent99"),
            Err(AnnounceError::Interface { .. })
        ));
    }

    #[test]
    fn test_broadcast_link_addr() {
        let addr = broadcast_link_addr(7);
        assert_eq!(addr.sll_ifindex, 7);
        assert_eq!(addr.sll_halen, 6);
        assert_eq!(u16::from_be(addr.sll_protocol), ETH_P_ARP);
        assert_eq!(&addr.sll_addr[..6], &[0xff; 6]);
    }

    #[test]
    fn test_socket_open() {
        // May fail if not running as root, so just check it doesn't panic
        if let Ok(link) = resolve_link("lo") {
            let _ = ArpSocket::open(&link);
        }
    }
}
