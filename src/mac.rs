//! Ethernet hardware addresses as they appear on the wire.

use std::fmt;

/// Length of an Ethernet hardware address.
pub const MAC_LEN: usize = 6;

/// A 6-byte Ethernet hardware address.
///
/// This is the key of the lease table. Formatting yields the colon-separated
/// lowercase form, e.g. `aa:bb:cc:dd:ee:ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress([u8; MAC_LEN]);

impl MacAddress {
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}
