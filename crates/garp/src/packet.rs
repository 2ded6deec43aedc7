//! ARP packet format and parsing.
//!
//! RFC 826 payload for Ethernet/IPv4 (the link-layer header is added by the
//! packet socket):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Hardware Type         |         Protocol Type         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  HW Addr Len  | Proto Addr Len|           Operation           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Sender Hardware Address (6)                  |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               | Sender Protocol Address (4)   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                               |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                  Target Hardware Address (6)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Target Protocol Address (4)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::types::{
    ARP_HW_ETHERNET, ARP_OP_REPLY, ARP_PAYLOAD_LEN, ARP_PROTO_IPV4, BROADCAST_MAC,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

/// Ethernet/IPv4 ARP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub hw_type: u16,
    pub proto_type: u16,
    pub hw_len: u8,
    pub proto_len: u8,
    pub opcode: u16,
    pub sender_hw: [u8; 6],
    pub sender_ip: Ipv4Addr,
    pub target_hw: [u8; 6],
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Build a gratuitous ARP reply announcing that `ip` lives at `mac`.
    pub fn gratuitous_reply(mac: [u8; 6], ip: Ipv4Addr) -> Self {
        Self {
            hw_type: ARP_HW_ETHERNET,
            proto_type: ARP_PROTO_IPV4,
            hw_len: 6,
            proto_len: 4,
            opcode: ARP_OP_REPLY,
            sender_hw: mac,
            sender_ip: ip,
            target_hw: BROADCAST_MAC,
            target_ip: ip,
        }
    }

    /// Parse an ARP payload
    pub fn parse(data: &[u8]) -> Result<Self, &'static str> {
        if data.len() < ARP_PAYLOAD_LEN {
            return Err("Packet too short");
        }

        let mut buf = &data[..ARP_PAYLOAD_LEN];

        let hw_type = buf.get_u16();
        let proto_type = buf.get_u16();
        let hw_len = buf.get_u8();
        let proto_len = buf.get_u8();

        if hw_type != ARP_HW_ETHERNET || hw_len != 6 {
            return Err("Not an Ethernet ARP packet");
        }
        if proto_type != ARP_PROTO_IPV4 || proto_len != 4 {
            return Err("Not an IPv4 ARP packet");
        }

        let opcode = buf.get_u16();

        let mut sender_hw = [0u8; 6];
        buf.copy_to_slice(&mut sender_hw);
        let sender_ip = Ipv4Addr::from(buf.get_u32());

        let mut target_hw = [0u8; 6];
        buf.copy_to_slice(&mut target_hw);
        let target_ip = Ipv4Addr::from(buf.get_u32());

        Ok(Self {
            hw_type,
            proto_type,
            hw_len,
            proto_len,
            opcode,
            sender_hw,
            sender_ip,
            target_hw,
            target_ip,
        })
    }

    /// Serialize the payload in network byte order
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ARP_PAYLOAD_LEN);

        buf.put_u16(self.hw_type);
        buf.put_u16(self.proto_type);
        buf.put_u8(self.hw_len);
        buf.put_u8(self.proto_len);
        buf.put_u16(self.opcode);
        buf.put_slice(&self.sender_hw);
        buf.put_slice(&self.sender_ip.octets());
        buf.put_slice(&self.target_hw);
        buf.put_slice(&self.target_ip.octets());

        buf.freeze()
    }

    /// Whether this is a broadcast reply announcing the sender's own address
    pub fn is_gratuitous_reply(&self) -> bool {
        self.opcode == ARP_OP_REPLY
            && self.sender_ip == self.target_ip
            && self.target_hw == BROADCAST_MAC
    }
}
