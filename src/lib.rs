//! # minidhcp
//!
//! A minimal DHCPv4 server library. It hands out addresses from a single
//! contiguous pool and answers DISCOVER with OFFER and REQUEST with ACK.
//!
//! ## Features
//!
//! - DHCP header and TLV option codec
//! - First-free address allocation with one lease per client MAC
//! - Broadcast replies carrying subnet mask, routers, DNS servers, lease time
//!   and server identifier
//! - Async/await with Tokio, one task per datagram
//!
//! ## Quick Start
//!
//! ```no_run
//! use minidhcp::{Config, DhcpServer};
//!
//! #[tokio::main]
//! async fn main() -> minidhcp::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let server = DhcpServer::new(config).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] - Server configuration (IP pool, lease duration, DNS, etc.)
//! - [`DhcpServer`] - Listener on UDP port 67
//! - [`PacketHandler`] - Turns one datagram into at most one reply
//! - [`ClientRequest`] - Inbound packet with option overrides applied
//! - [`LeasePool`] - Thread-safe lease table and free address set
//! - [`DhcpPacket`] - DHCP packet parsing and encoding
//! - [`DhcpOptions`] - Ordered option list per RFC 2132

pub mod config;
pub mod error;
pub mod lease;
pub mod mac;
pub mod options;
pub mod packet;
pub mod request;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use lease::{Allocation, Lease, LeasePool};
pub use mac::MacAddress;
pub use options::{DhcpOption, DhcpOptions, MessageType, OptionCode};
pub use packet::{DhcpHeader, DhcpPacket};
pub use request::ClientRequest;
pub use server::{DhcpServer, PacketHandler};
