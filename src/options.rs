//! DHCP options as defined in RFC 2132.
//!
//! DHCP uses options to convey configuration parameters between servers and clients.
//! Each option has a code (1 byte), length (1 byte), and variable-length data.
//!
//! Options are kept as raw TLV units in arrival order. Nothing is interpreted at
//! decode time, so unknown codes survive untouched and a code that appears twice
//! is stored twice. Lookups return the first occurrence.
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Largest payload the one-byte length field can describe.
pub const MAX_OPTION_LEN: usize = u8::MAX as usize;

/// DHCP option codes used by this server.
///
/// Any other code is carried as an opaque [`DhcpOption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding (no operation). Used for alignment.
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway addresses (RFC 2132 §3.5).
    Router = 3,
    /// DNS server addresses (RFC 2132 §3.8).
    DnsServer = 6,
    /// Client hostname (RFC 2132 §3.14).
    Hostname = 12,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedIpAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// End of options marker.
    End = 255,
}

impl From<OptionCode> for u8 {
    fn from(code: OptionCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for OptionCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pad),
            1 => Ok(Self::SubnetMask),
            3 => Ok(Self::Router),
            6 => Ok(Self::DnsServer),
            12 => Ok(Self::Hostname),
            50 => Ok(Self::RequestedIpAddress),
            51 => Ok(Self::LeaseTime),
            53 => Ok(Self::MessageType),
            54 => Ok(Self::ServerIdentifier),
            255 => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
///
/// The server only answers [`Discover`](Self::Discover) and
/// [`Request`](Self::Request); the rest are named so they can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate servers.
    Discover = 1,
    /// Server response to DISCOVER with IP offer.
    Offer = 2,
    /// Client request for offered parameters.
    Request = 3,
    /// Client indicates address is already in use.
    Decline = 4,
    /// Server acknowledgement with configuration.
    Ack = 5,
    /// Server negative acknowledgement.
    Nak = 6,
    /// Client releases IP address.
    Release = 7,
    /// Client requests config without IP allocation.
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DHCPDISCOVER"),
            Self::Offer => write!(f, "DHCPOFFER"),
            Self::Request => write!(f, "DHCPREQUEST"),
            Self::Decline => write!(f, "DHCPDECLINE"),
            Self::Ack => write!(f, "DHCPACK"),
            Self::Nak => write!(f, "DHCPNAK"),
            Self::Release => write!(f, "DHCPRELEASE"),
            Self::Inform => write!(f, "DHCPINFORM"),
        }
    }
}

/// A single option TLV: code, and a payload of at most 255 bytes.
///
/// The code is never Pad (0) or End (255); those are markers, not options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpOption {
    code: u8,
    data: Vec<u8>,
}

impl DhcpOption {
    /// Creates an option, rejecting anything that would not decode back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedOptionCode`] for codes 0 and 255, and
    /// [`Error::OptionTooLong`] if `data` is longer than 255 bytes.
    pub fn new(code: impl Into<u8>, data: Vec<u8>) -> Result<Self> {
        let code = code.into();
        if code == OptionCode::Pad as u8 || code == OptionCode::End as u8 {
            return Err(Error::ReservedOptionCode(code));
        }

        if data.len() > MAX_OPTION_LEN {
            return Err(Error::OptionTooLong {
                code,
                length: data.len(),
            });
        }
        Ok(Self { code, data })
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Value of the length byte on the wire.
    pub fn length(&self) -> u8 {
        self.data.len() as u8
    }

    /// Interprets a 4-byte payload as an IPv4 address.
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = self.data.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    /// Appends the wire format (code + length + data) to `buffer`.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.code);
        buffer.push(self.length());
        buffer.extend_from_slice(&self.data);
    }
}

/// The ordered option area following the fixed header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpOptions {
    options: Vec<DhcpOption>,
}

impl DhcpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes TLV units until the buffer is exhausted or an End marker is seen.
    ///
    /// Pad bytes are skipped. Unknown codes are kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] when a code has no length byte, or the
    /// length byte asks for more data than remains.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut options = Vec::new();
        let mut index = 0;

        while index < data.len() {
            let code = data[index];

            if code == OptionCode::Pad as u8 {
                index += 1;
                continue;
            }

            if code == OptionCode::End as u8 {
                break;
            }

            if index + 1 >= data.len() {
                return Err(Error::InvalidPacket(format!(
                    "Option {} length missing",
                    code
                )));
            }

            let length = data[index + 1] as usize;

            if index + 2 + length > data.len() {
                return Err(Error::InvalidPacket(format!(
                    "Option {} wants {} bytes, {} remain",
                    code,
                    length,
                    data.len() - index - 2
                )));
            }

            options.push(DhcpOption {
                code,
                data: data[index + 2..index + 2 + length].to_vec(),
            });

            index += 2 + length;
        }

        Ok(Self { options })
    }

    /// Returns the first option with the given code.
    pub fn get(&self, code: impl Into<u8>) -> Option<&DhcpOption> {
        let code = code.into();
        self.options.iter().find(|option| option.code == code)
    }

    /// Replaces the first option with the given code, or appends a new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptionTooLong`] if `data` is longer than 255 bytes;
    /// the set is left unchanged.
    pub fn set(&mut self, code: impl Into<u8>, data: impl Into<Vec<u8>>) -> Result<()> {
        let option = DhcpOption::new(code, data.into())?;
        match self
            .options
            .iter_mut()
            .find(|existing| existing.code == option.code)
        {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DhcpOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Appends every option in order, followed by an End marker.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        for option in &self.options {
            option.encode_into(buffer);
        }
        buffer.push(OptionCode::End as u8);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.encode_into(&mut buffer);
        buffer
    }

    /// Raw message type (Option 53), only when the payload is exactly one byte.
    pub fn message_type(&self) -> Option<u8> {
        self.get(OptionCode::MessageType)
            .filter(|option| option.data.len() == 1)
            .map(|option| option.data[0])
    }

    /// Requested IP address (Option 50), only when the payload is exactly four bytes.
    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.get(OptionCode::RequestedIpAddress)
            .and_then(DhcpOption::as_ipv4)
    }

    /// Client hostname (Option 12), lossily decoded and trimmed of NULs.
    pub fn hostname(&self) -> Option<String> {
        self.get(OptionCode::Hostname)
            .map(|option| {
                String::from_utf8_lossy(&option.data)
                    .trim_end_matches('\0')
                    .to_string()
            })
            .filter(|name| !name.is_empty())
    }
}

/// Concatenates addresses into the payload of a list option (Router, DNS).
pub fn encode_addresses(addresses: &[Ipv4Addr]) -> Vec<u8> {
    addresses
        .iter()
        .flat_map(|address| address.octets())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_conversions() {
        for value in 1..=8u8 {
            let msg_type = MessageType::try_from(value).unwrap();
            assert_eq!(msg_type as u8, value);
        }
        assert!(MessageType::try_from(0).is_err());
        assert!(MessageType::try_from(9).is_err());
    }

    #[test]
    fn test_option_code_conversions() {
        assert_eq!(OptionCode::try_from(53), Ok(OptionCode::MessageType));
        assert_eq!(OptionCode::try_from(200), Err(200));
        assert_eq!(u8::from(OptionCode::ServerIdentifier), 54);
    }

    #[test]
    fn test_set_appends_in_order() {
        let mut options = DhcpOptions::new();
        options.set(OptionCode::MessageType, vec![2]).unwrap();
        options
            .set(OptionCode::SubnetMask, vec![255, 255, 255, 0])
            .unwrap();
        options.set(OptionCode::LeaseTime, vec![0, 0, 14, 16]).unwrap();

        let codes: Vec<u8> = options.iter().map(DhcpOption::code).collect();
        assert_eq!(codes, vec![53, 1, 51]);
    }

    #[test]
    fn test_set_replaces_existing() {
        let mut options = DhcpOptions::new();
        options.set(OptionCode::MessageType, vec![1]).unwrap();
        options
            .set(OptionCode::SubnetMask, vec![255, 255, 0, 0])
            .unwrap();
        options.set(OptionCode::MessageType, vec![3]).unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options.iter().next().unwrap().data(), &[3]);
        assert_eq!(options.message_type(), Some(3));
    }

    #[test]
    fn test_set_rejects_oversized_payload() {
        let mut options = DhcpOptions::new();
        let result = options.set(OptionCode::DnsServer, vec![8u8; 256]);
        assert!(matches!(
            result,
            Err(Error::OptionTooLong {
                code: 6,
                length: 256
            })
        ));
        assert!(options.is_empty());

        assert!(options.set(OptionCode::DnsServer, vec![8u8; 255]).is_ok());
        assert_eq!(options.get(OptionCode::DnsServer).unwrap().length(), 255);
    }

    #[test]
    fn test_set_rejects_pad_and_end_codes() {
        let mut options = DhcpOptions::new();

        assert!(matches!(
            options.set(OptionCode::Pad, vec![1, 2]),
            Err(Error::ReservedOptionCode(0))
        ));
        assert!(matches!(
            options.set(OptionCode::End, vec![7]),
            Err(Error::ReservedOptionCode(255))
        ));
        assert!(options.is_empty());

        options.set(OptionCode::MessageType, vec![1]).unwrap();
        let reparsed = DhcpOptions::parse(&options.encode()).unwrap();
        assert_eq!(reparsed, options);
        assert_eq!(reparsed.message_type(), Some(1));
    }

    #[test]
    fn test_new_option_rejects_reserved_codes() {
        assert!(DhcpOption::new(0u8, vec![]).is_err());
        assert!(DhcpOption::new(255u8, vec![]).is_err());

        let option = DhcpOption::new(1u8, vec![255, 255, 255, 0]).unwrap();
        assert_eq!(option.code(), 1);
        assert_eq!(option.as_ipv4(), Some(Ipv4Addr::new(255, 255, 255, 0)));
    }

    #[test]
    fn test_get_returns_first_duplicate() {
        let data = [53, 1, 1, 53, 1, 3, 255];
        let options = DhcpOptions::parse(&data).unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options.message_type(), Some(1));
    }

    #[test]
    fn test_parse_unknown_option_preserved() {
        let data = [200, 4, 0xde, 0xad, 0xbe, 0xef];
        let options = DhcpOptions::parse(&data).unwrap();

        let option = options.get(200u8).unwrap();
        assert_eq!(option.data(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_parse_stops_at_end_of_buffer_without_marker() {
        let data = [53, 1, 3, 50, 4, 10, 0, 0, 7];
        let options = DhcpOptions::parse(&data).unwrap();

        assert_eq!(options.message_type(), Some(3));
        assert_eq!(options.requested_ip(), Some(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn test_parse_skips_pad_and_stops_at_end() {
        let data = [0, 0, 53, 1, 1, 255, 99, 200, 200];
        let options = DhcpOptions::parse(&data).unwrap();

        assert_eq!(options.len(), 1);
        assert_eq!(options.message_type(), Some(1));
    }

    #[test]
    fn test_parse_truncated_options() {
        assert!(DhcpOptions::parse(&[51]).is_err());
        assert!(DhcpOptions::parse(&[51, 4, 0, 0]).is_err());
        assert!(DhcpOptions::parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_zero_length_option() {
        let options = DhcpOptions::parse(&[55, 0, 255]).unwrap();
        assert!(options.get(55u8).unwrap().data().is_empty());
    }

    #[test]
    fn test_typed_accessors_require_exact_length() {
        let options = DhcpOptions::parse(&[53, 2, 1, 1, 50, 3, 10, 0, 0]).unwrap();
        assert_eq!(options.message_type(), None);
        assert_eq!(options.requested_ip(), None);
    }

    #[test]
    fn test_hostname() {
        let mut options = DhcpOptions::new();
        assert_eq!(options.hostname(), None);

        options.set(OptionCode::Hostname, b"laptop\0".to_vec()).unwrap();
        assert_eq!(options.hostname(), Some("laptop".to_string()));
    }

    #[test]
    fn test_encode_roundtrip() {
        let mut options = DhcpOptions::new();
        options.set(OptionCode::MessageType, vec![5]).unwrap();
        let routers = [Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)];
        options
            .set(OptionCode::Router, encode_addresses(&routers))
            .unwrap();
        options.set(200u8, vec![9, 9]).unwrap();

        let encoded = options.encode();
        assert_eq!(encoded.last(), Some(&(OptionCode::End as u8)));
        assert_eq!(DhcpOptions::parse(&encoded).unwrap(), options);
    }

    #[test]
    fn test_encode_addresses() {
        let payload = encode_addresses(&[Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)]);
        assert_eq!(payload, vec![8, 8, 8, 8, 1, 1, 1, 1]);
        assert!(encode_addresses(&[]).is_empty());
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(format!("{}", MessageType::Discover), "DHCPDISCOVER");
        assert_eq!(format!("{}", MessageType::Offer), "DHCPOFFER");
        assert_eq!(format!("{}", MessageType::Request), "DHCPREQUEST");
        assert_eq!(format!("{}", MessageType::Ack), "DHCPACK");
    }
}
