//! DHCP packet parsing and encoding.
//!
//! A DHCP packet consists of a fixed 236-byte header followed by a 4-byte
//! magic cookie and variable-length options. [`DhcpHeader`] covers the fixed
//! part including the cookie; [`DhcpPacket`] pairs it with the option area.
//!
//! # Packet Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
//! +---------------+---------------+---------------+---------------+
//! |                            xid (4)                            |
//! +-------------------------------+-------------------------------+
//! |           secs (2)            |           flags (2)           |
//! +-------------------------------+-------------------------------+
//! |                          ciaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          yiaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          siaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          giaddr (4)                           |
//! +---------------------------------------------------------------+
//! |              chaddr (6)  +  chaddr padding (10)               |
//! +---------------------------------------------------------------+
//! |                          sname (64)                           |
//! +---------------------------------------------------------------+
//! |                          file (128)                           |
//! +---------------------------------------------------------------+
//! |                    magic cookie (4) = 99.130.83.99            |
//! +---------------------------------------------------------------+
//! |                          options (variable)                   |
//! +---------------------------------------------------------------+
//! ```
//!
//! The multi-byte integers `xid`, `secs` and `flags` are little-endian on
//! this server's wire. `xid` is only ever echoed back, so clients see their
//! own bytes regardless.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::mac::{MAC_LEN, MacAddress};
use crate::options::DhcpOptions;

/// DHCP magic cookie that identifies DHCP packets (vs BOOTP).
pub const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const DHCP_OP_HTYPE_HLEN_HOPS_SIZE: usize = 4;
const DHCP_XID_SIZE: usize = 4;
const DHCP_SECS_SIZE: usize = 2;
const DHCP_FLAGS_SIZE: usize = 2;
const DHCP_ADDR_SIZE: usize = 4;
const DHCP_CHADDR_SIZE: usize = 16;
const DHCP_CHADDR_PADDING_SIZE: usize = DHCP_CHADDR_SIZE - MAC_LEN;
const DHCP_SNAME_SIZE: usize = 64;
const DHCP_FILE_SIZE: usize = 128;

const DHCP_XID_OFFSET: usize = DHCP_OP_HTYPE_HLEN_HOPS_SIZE;
const DHCP_SECS_OFFSET: usize = DHCP_XID_OFFSET + DHCP_XID_SIZE;
const DHCP_FLAGS_OFFSET: usize = DHCP_SECS_OFFSET + DHCP_SECS_SIZE;
const DHCP_CIADDR_OFFSET: usize = DHCP_FLAGS_OFFSET + DHCP_FLAGS_SIZE;
const DHCP_YIADDR_OFFSET: usize = DHCP_CIADDR_OFFSET + DHCP_ADDR_SIZE;
const DHCP_SIADDR_OFFSET: usize = DHCP_YIADDR_OFFSET + DHCP_ADDR_SIZE;
const DHCP_GIADDR_OFFSET: usize = DHCP_SIADDR_OFFSET + DHCP_ADDR_SIZE;
const DHCP_CHADDR_OFFSET: usize = DHCP_GIADDR_OFFSET + DHCP_ADDR_SIZE;
const DHCP_SNAME_OFFSET: usize = DHCP_CHADDR_OFFSET + DHCP_CHADDR_SIZE;
const DHCP_FILE_OFFSET: usize = DHCP_SNAME_OFFSET + DHCP_SNAME_SIZE;
const DHCP_MAGIC_COOKIE_OFFSET: usize = DHCP_FILE_OFFSET + DHCP_FILE_SIZE;

/// Size of the fixed header portion including magic cookie.
pub const DHCP_HEADER_SIZE: usize = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();

/// Minimum DHCP packet size per RFC 2131 §2.
///
/// DHCP requires packets to be at least 300 bytes for compatibility
/// with BOOTP relay agents.
pub const DHCP_MIN_PACKET_SIZE: usize = 300;

/// Initial capacity for packet encoding buffer.
///
/// 576 bytes is the minimum MTU that all hosts must accept per RFC 791.
const DHCP_ENCODE_CAPACITY: usize = 576;

/// UDP port the server listens on.
pub const DHCP_SERVER_PORT: u16 = 67;

/// UDP port clients send from and receive replies on.
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Hardware type for Ethernet, the only one supported.
pub const HTYPE_ETHERNET: u8 = 1;

/// Hardware address length for Ethernet (6 bytes).
pub const HLEN_ETHERNET: u8 = MAC_LEN as u8;

/// The fixed-layout header of a DHCP datagram, exactly as received or sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpHeader {
    /// Operation code. For replies this carries the reply message type.
    pub op: u8,

    /// Hardware address type. Always [`HTYPE_ETHERNET`] once parsed.
    pub htype: u8,

    /// Hardware address length. Always [`HLEN_ETHERNET`] once parsed.
    pub hlen: u8,

    /// Hop count, incremented by relay agents.
    pub hops: u8,

    /// Transaction ID chosen by client, echoed in replies.
    pub xid: u32,

    /// Seconds elapsed since client began address acquisition.
    pub secs: u16,

    pub flags: u16,

    /// Client IP address.
    pub ciaddr: Ipv4Addr,

    /// "Your" IP address - the address being assigned to the client.
    pub yiaddr: Ipv4Addr,

    /// Next server IP address.
    pub siaddr: Ipv4Addr,

    /// Relay agent (gateway) IP address.
    pub giaddr: Ipv4Addr,

    /// Client hardware address.
    pub chaddr: MacAddress,

    /// Remainder of the 16-byte chaddr field.
    pub chaddr_padding: [u8; DHCP_CHADDR_PADDING_SIZE],

    /// Server host name field.
    pub sname: [u8; DHCP_SNAME_SIZE],

    /// Boot file name field.
    pub file: [u8; DHCP_FILE_SIZE],

    pub magic: [u8; 4],
}

impl Default for DhcpHeader {
    /// An all-zero Ethernet header carrying the magic cookie.
    fn default() -> Self {
        Self {
            op: 0,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: MacAddress::default(),
            chaddr_padding: [0u8; DHCP_CHADDR_PADDING_SIZE],
            sname: [0u8; DHCP_SNAME_SIZE],
            file: [0u8; DHCP_FILE_SIZE],
            magic: DHCP_MAGIC_COOKIE,
        }
    }
}

fn read_ipv4(data: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    )
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&data[offset..offset + N]);
    array
}

impl DhcpHeader {
    /// Parses the fixed header from the start of `data`.
    ///
    /// Bytes past [`DHCP_HEADER_SIZE`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] if:
    /// - `data` is shorter than 240 bytes
    /// - Hardware type is not Ethernet (1)
    /// - Hardware length is not 6
    /// - Magic cookie is not 99.130.83.99
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DHCP_HEADER_SIZE {
            return Err(Error::InvalidPacket(format!(
                "Packet too short: {} bytes (minimum {})",
                data.len(),
                DHCP_HEADER_SIZE
            )));
        }

        let header = Self {
            op: data[0],
            htype: data[1],
            hlen: data[2],
            hops: data[3],
            xid: u32::from_le_bytes(read_array(data, DHCP_XID_OFFSET)),
            secs: u16::from_le_bytes(read_array(data, DHCP_SECS_OFFSET)),
            flags: u16::from_le_bytes(read_array(data, DHCP_FLAGS_OFFSET)),
            ciaddr: read_ipv4(data, DHCP_CIADDR_OFFSET),
            yiaddr: read_ipv4(data, DHCP_YIADDR_OFFSET),
            siaddr: read_ipv4(data, DHCP_SIADDR_OFFSET),
            giaddr: read_ipv4(data, DHCP_GIADDR_OFFSET),
            chaddr: MacAddress::new(read_array(data, DHCP_CHADDR_OFFSET)),
            chaddr_padding: read_array(data, DHCP_CHADDR_OFFSET + MAC_LEN),
            sname: read_array(data, DHCP_SNAME_OFFSET),
            file: read_array(data, DHCP_FILE_OFFSET),
            magic: read_array(data, DHCP_MAGIC_COOKIE_OFFSET),
        };

        if header.htype != HTYPE_ETHERNET {
            return Err(Error::InvalidPacket(format!(
                "Only type {} (ethernet) supported, not {}",
                HTYPE_ETHERNET, header.htype
            )));
        }

        if header.hlen != HLEN_ETHERNET {
            return Err(Error::InvalidPacket(format!(
                "Only {} byte hardware addresses supported, not {}",
                HLEN_ETHERNET, header.hlen
            )));
        }

        if header.magic != DHCP_MAGIC_COOKIE {
            return Err(Error::InvalidPacket("Invalid magic cookie".to_string()));
        }

        Ok(header)
    }

    /// Appends exactly [`DHCP_HEADER_SIZE`] bytes to `buffer`.
    ///
    /// No validation is performed; a header that breaks the Ethernet or
    /// cookie invariants is written as-is and will not parse back.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.op);
        buffer.push(self.htype);
        buffer.push(self.hlen);
        buffer.push(self.hops);

        buffer.extend_from_slice(&self.xid.to_le_bytes());
        buffer.extend_from_slice(&self.secs.to_le_bytes());
        buffer.extend_from_slice(&self.flags.to_le_bytes());

        buffer.extend_from_slice(&self.ciaddr.octets());
        buffer.extend_from_slice(&self.yiaddr.octets());
        buffer.extend_from_slice(&self.siaddr.octets());
        buffer.extend_from_slice(&self.giaddr.octets());

        buffer.extend_from_slice(&self.chaddr.octets());
        buffer.extend_from_slice(&self.chaddr_padding);
        buffer.extend_from_slice(&self.sname);
        buffer.extend_from_slice(&self.file);

        buffer.extend_from_slice(&self.magic);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(DHCP_HEADER_SIZE);
        self.encode_into(&mut buffer);
        buffer
    }
}

/// A whole DHCP datagram: fixed header plus option area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpPacket {
    pub header: DhcpHeader,
    pub options: DhcpOptions,
}

impl DhcpPacket {
    /// Parses a DHCP packet from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] if the header is rejected by
    /// [`DhcpHeader::parse`] or the options are truncated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = DhcpHeader::parse(data)?;
        let options = DhcpOptions::parse(&data[DHCP_HEADER_SIZE..])?;
        Ok(Self { header, options })
    }

    /// Encodes the packet to bytes for transmission.
    ///
    /// Options are followed by an End marker and the buffer is zero-padded
    /// to at least 300 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(DHCP_ENCODE_CAPACITY);

        self.header.encode_into(&mut packet);
        self.options.encode_into(&mut packet);

        if packet.len() < DHCP_MIN_PACKET_SIZE {
            packet.resize(DHCP_MIN_PACKET_SIZE, 0);
        }

        packet
    }
}
