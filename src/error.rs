//! Error types for the DHCP server.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants.

/// Errors that can occur during DHCP server operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or network I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed DHCP packet received.
    ///
    /// This includes packets that are too short, have an invalid magic cookie,
    /// a hardware type other than Ethernet, a hardware length other than 6,
    /// or an option whose length runs past the end of the datagram.
    #[error("Invalid DHCP packet: {0}")]
    InvalidPacket(String),

    /// Datagram did not originate from the DHCP client port (68).
    #[error("Source port is {0} rather than 68")]
    UnexpectedSourcePort(u16),

    /// Option payload does not fit in the one-byte length field.
    #[error("Option {code} payload of {length} bytes exceeds 255")]
    OptionTooLong { code: u8, length: usize },

    /// Pad (0) and End (255) are markers and cannot carry a payload.
    #[error("Option code {0} is reserved")]
    ReservedOptionCode(u8),

    /// The IP address pool is exhausted.
    ///
    /// Every address between pool_start and pool_end is bound to a client.
    /// Leases are never reclaimed, so only a restart or a larger pool helps.
    #[error("No available IP addresses in pool")]
    PoolExhausted,

    /// Invalid server configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate) when the
    /// configuration contains invalid values (e.g., pool_start > pool_end).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket creation or configuration error.
    ///
    /// Typically occurs when binding to port 67 without administrator privileges.
    #[error("Socket error: {0}")]
    Socket(String),
}

/// A specialized Result type for DHCP operations.
pub type Result<T> = std::result::Result<T, Error>;
