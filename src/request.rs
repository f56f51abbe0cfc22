//! Client requests as the server acts on them.
//!
//! Parsing happens in two phases. The wire packet ([`DhcpPacket`]) is kept
//! exactly as received. The [`ClientRequest`] built on top of it carries the
//! *effective* message type and client address, after two option overrides:
//!
//! - A Message Type option (53) of length 1 replaces the header `op`.
//! - A Requested IP Address option (50) of length 4 replaces `ciaddr`.
//!
//! Options of any other length are ignored for override purposes.

use std::net::{Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::mac::MacAddress;
use crate::options::MessageType;
use crate::packet::{DHCP_CLIENT_PORT, DhcpPacket};

/// A validated inbound datagram with overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// The packet as it arrived on the wire.
    pub packet: DhcpPacket,

    /// Message type used for dispatch.
    pub message_type: u8,

    /// Client address used for lease verification.
    pub client_addr: Ipv4Addr,

    /// Where the datagram came from.
    pub source: SocketAddr,
}

impl ClientRequest {
    /// Validates the source port, decodes the datagram and applies overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedSourcePort`] if `source` is not port 68, and
    /// [`Error::InvalidPacket`] if the header or options fail to decode.
    pub fn parse(data: &[u8], source: SocketAddr) -> Result<Self> {
        if source.port() != DHCP_CLIENT_PORT {
            return Err(Error::UnexpectedSourcePort(source.port()));
        }

        let packet = DhcpPacket::parse(data)?;

        let message_type = packet
            .options
            .message_type()
            .unwrap_or(packet.header.op);

        let client_addr = packet
            .options
            .requested_ip()
            .unwrap_or(packet.header.ciaddr);

        Ok(Self {
            packet,
            message_type,
            client_addr,
            source,
        })
    }

    /// The effective message type, or the raw value if it is not a known type.
    pub fn kind(&self) -> std::result::Result<MessageType, u8> {
        MessageType::try_from(self.message_type)
    }

    pub fn mac(&self) -> MacAddress {
        self.packet.header.chaddr
    }

    pub fn xid(&self) -> u32 {
        self.packet.header.xid
    }

    /// Client hostname (Option 12), used as the allocation hint.
    pub fn hostname(&self) -> Option<String> {
        self.packet.options.hostname()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionCode;
    use crate::packet::DhcpHeader;

    fn client_source() -> SocketAddr {
        "0.0.0.0:68".parse().unwrap()
    }

    fn build(op: u8, ciaddr: Ipv4Addr, options: &[(OptionCode, Vec<u8>)]) -> Vec<u8> {
        let mut packet = DhcpPacket {
            header: DhcpHeader {
                op,
                ciaddr,
                xid: 0xcafe,
                chaddr: MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
                ..Default::default()
            },
            ..Default::default()
        };
        for (code, data) in options {
            packet.options.set(*code, data.clone()).unwrap();
        }
        packet.encode()
    }

    #[test]
    fn test_wrong_source_port_rejected() {
        let data = build(1, Ipv4Addr::UNSPECIFIED, &[]);
        let source: SocketAddr = "10.0.0.5:6800".parse().unwrap();

        let result = ClientRequest::parse(&data, source);
        assert!(matches!(result, Err(Error::UnexpectedSourcePort(6800))));
    }

    #[test]
    fn test_malformed_packet_rejected() {
        assert!(matches!(
            ClientRequest::parse(&[0u8; 64], client_source()),
            Err(Error::InvalidPacket(_))
        ));
    }

    #[test]
    fn test_op_used_without_message_type_option() {
        let data = build(3, Ipv4Addr::UNSPECIFIED, &[]);
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.message_type, 3);
        assert_eq!(request.kind(), Ok(MessageType::Request));
    }

    #[test]
    fn test_message_type_option_overrides_op() {
        let data = build(1, Ipv4Addr::UNSPECIFIED, &[(OptionCode::MessageType, vec![3])]);
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.kind(), Ok(MessageType::Request));
        assert_eq!(request.packet.header.op, 1);
    }

    #[test]
    fn test_message_type_option_with_bad_length_ignored() {
        let data = build(1, Ipv4Addr::UNSPECIFIED, &[(OptionCode::MessageType, vec![3, 3])]);
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.kind(), Ok(MessageType::Discover));
    }

    #[test]
    fn test_requested_ip_overrides_ciaddr() {
        let ciaddr = Ipv4Addr::new(192, 168, 1, 50);
        let data = build(
            3,
            ciaddr,
            &[(OptionCode::RequestedIpAddress, vec![192, 168, 1, 100])],
        );
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.client_addr, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(request.packet.header.ciaddr, ciaddr);
    }

    #[test]
    fn test_requested_ip_with_bad_length_ignored() {
        let ciaddr = Ipv4Addr::new(192, 168, 1, 50);
        let data = build(3, ciaddr, &[(OptionCode::RequestedIpAddress, vec![192, 168, 1])]);
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.client_addr, ciaddr);
    }

    #[test]
    fn test_unknown_message_type() {
        let data = build(1, Ipv4Addr::UNSPECIFIED, &[(OptionCode::MessageType, vec![42])]);
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.kind(), Err(42));
    }

    #[test]
    fn test_accessors() {
        let data = build(1, Ipv4Addr::UNSPECIFIED, &[(OptionCode::Hostname, b"printer".to_vec())]);
        let request = ClientRequest::parse(&data, client_source()).unwrap();

        assert_eq!(request.mac().to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(request.xid(), 0xcafe);
        assert_eq!(request.hostname(), Some("printer".to_string()));
    }
}
