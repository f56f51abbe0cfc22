use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lease::{Allocation, Lease, LeasePool};
use crate::options::{DhcpOptions, MessageType, OptionCode, encode_addresses};
use crate::packet::{
    DHCP_CLIENT_PORT, DHCP_SERVER_PORT, DhcpHeader, DhcpPacket, HLEN_ETHERNET, HTYPE_ETHERNET,
};
use crate::request::ClientRequest;

const RECV_BUFFER_SIZE: usize = 1500;

pub struct DhcpServer {
    pool: Arc<LeasePool>,
    socket: Arc<UdpSocket>,
}

impl DhcpServer {
    /// Validates `config`, builds the pool and binds `0.0.0.0:67`.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let pool = Arc::new(LeasePool::new(Arc::clone(&config)));

        let socket = Arc::new(Self::create_socket()?);

        info!(
            "DHCP server starting on {}:{}",
            config.server_ip, DHCP_SERVER_PORT
        );
        info!(
            "IP pool: {} - {} ({} addresses)",
            config.pool_start,
            config.pool_end,
            config.pool_size()
        );
        info!(
            "Replies broadcast to {}:{}",
            config.calculate_broadcast(),
            DHCP_CLIENT_PORT
        );

        Ok(Self { pool, socket })
    }

    fn create_socket() -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

        socket
            .set_reuse_address(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

        socket
            .set_broadcast(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

        socket
            .set_nonblocking(true)
            .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DHCP_SERVER_PORT);
        socket.bind(&bind_addr.into()).map_err(|error| {
            Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error))
        })?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket).map_err(|error| {
            Error::Socket(format!("Failed to convert to tokio socket: {}", error))
        })?;

        Ok(tokio_socket)
    }

    /// Receives datagrams forever, handling each one on its own task.
    pub async fn run(&self) -> Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        info!("DHCP server ready and listening");

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((size, source)) => {
                    let data = buffer[..size].to_vec();
                    let handler =
                        PacketHandler::new(Arc::clone(&self.pool), Arc::clone(&self.socket));

                    tokio::spawn(async move {
                        handler.handle(&data, source).await;
                    });
                }
                Err(error) => {
                    error!("Error receiving packet: {}", error);
                }
            }
        }
    }

    pub fn pool(&self) -> &LeasePool {
        &self.pool
    }
}

/// Per-datagram request engine.
///
/// Holds no state of its own; everything that outlives a datagram lives in
/// the shared [`LeasePool`].
#[derive(Clone)]
pub struct PacketHandler {
    pool: Arc<LeasePool>,
    socket: Arc<UdpSocket>,
    reply_port: u16,
}

impl PacketHandler {
    pub fn new(pool: Arc<LeasePool>, socket: Arc<UdpSocket>) -> Self {
        Self {
            pool,
            socket,
            reply_port: DHCP_CLIENT_PORT,
        }
    }

    #[cfg(test)]
    fn with_reply_port(mut self, reply_port: u16) -> Self {
        self.reply_port = reply_port;
        self
    }

    /// Handles one inbound datagram end to end.
    ///
    /// Every outcome is reported through logging and, on success, a single
    /// broadcast reply. A failed send is not retried and the lease stays bound.
    pub async fn handle(&self, data: &[u8], source: SocketAddr) {
        let Some(reply) = self.respond(data, source).await else {
            return;
        };

        if let Err(error) = self.send_broadcast(&reply).await {
            error!("Failed sending reply to {}: {}", reply.header.chaddr, error);
        }
    }

    /// Parses and dispatches a datagram, returning the reply to transmit.
    ///
    /// `None` means the datagram was dropped; the reason has been logged.
    pub async fn respond(&self, data: &[u8], source: SocketAddr) -> Option<DhcpPacket> {
        let request = match ClientRequest::parse(data, source) {
            Ok(request) => request,
            Err(error) => {
                warn!("Failed parsing request from {}: {}", source, error);
                return None;
            }
        };

        match request.kind() {
            Ok(MessageType::Discover) => self.handle_discover(&request).await,
            Ok(MessageType::Request) => self.handle_request(&request).await,
            Ok(other) => {
                warn!("Unimplemented {} from {}", other, request.mac());
                None
            }
            Err(op) => {
                warn!("Unimplemented op {} from {}", op, request.mac());
                None
            }
        }
    }

    async fn handle_discover(&self, request: &ClientRequest) -> Option<DhcpPacket> {
        let mac = request.mac();
        info!("DHCPDISCOVER from {}", mac);

        let hostname = request.hostname();
        let allocation = match self.pool.lease_for(mac, hostname.as_deref()).await {
            Ok(allocation) => allocation,
            Err(error) => {
                warn!("Could not get a new lease for {}: {}", mac, error);
                return None;
            }
        };

        match &allocation {
            Allocation::Existing(lease) => {
                info!("Have old lease for {}: {}", mac, lease.ip_address)
            }
            Allocation::New(lease) => info!("Got a new lease for {}: {}", mac, lease.ip_address),
        }

        self.lease_reply(request, allocation.lease(), MessageType::Offer)
    }

    async fn handle_request(&self, request: &ClientRequest) -> Option<DhcpPacket> {
        let mac = request.mac();
        info!("DHCPREQUEST from {}", mac);

        let Some(lease) = self.pool.get_lease_by_mac(mac).await else {
            info!("Unrecognized lease for {}, handling as DHCPDISCOVER", mac);
            return self.handle_discover(request).await;
        };

        if request.client_addr != lease.ip_address {
            warn!(
                "Client IP does not match for {}: {} != {} (expected)",
                mac, request.client_addr, lease.ip_address
            );
            return None;
        }

        self.lease_reply(request, &lease, MessageType::Ack)
    }

    fn lease_reply(
        &self,
        request: &ClientRequest,
        lease: &Lease,
        message_type: MessageType,
    ) -> Option<DhcpPacket> {
        match self.build_reply(request, lease, message_type) {
            Ok(reply) => {
                info!(
                    "Sending {} with {} to {}",
                    message_type,
                    lease.ip_address,
                    request.mac()
                );
                Some(reply)
            }
            Err(error) => {
                error!(
                    "Failed building {} for {}: {}",
                    message_type,
                    request.mac(),
                    error
                );
                None
            }
        }
    }

    /// Builds an OFFER or ACK for `lease`.
    ///
    /// Options are emitted in a fixed order: message type, subnet mask,
    /// routers, DNS servers, lease time, server identifier. Empty router and
    /// DNS lists are omitted.
    fn build_reply(
        &self,
        request: &ClientRequest,
        lease: &Lease,
        message_type: MessageType,
    ) -> Result<DhcpPacket> {
        let config = self.pool.config();

        let header = DhcpHeader {
            op: message_type as u8,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid: request.xid(),
            yiaddr: lease.ip_address,
            siaddr: config.server_ip,
            chaddr: request.mac(),
            ..Default::default()
        };

        let mut options = DhcpOptions::new();
        options.set(OptionCode::MessageType, vec![message_type as u8])?;
        options.set(OptionCode::SubnetMask, config.subnet_mask.octets())?;

        if !config.routers.is_empty() {
            options.set(OptionCode::Router, encode_addresses(&config.routers))?;
        }

        if !config.dns_servers.is_empty() {
            options.set(OptionCode::DnsServer, encode_addresses(&config.dns_servers))?;
        }

        options.set(
            OptionCode::LeaseTime,
            config.lease_duration_seconds.to_be_bytes(),
        )?;
        options.set(OptionCode::ServerIdentifier, config.server_ip.octets())?;

        Ok(DhcpPacket { header, options })
    }

    async fn send_broadcast(&self, reply: &DhcpPacket) -> Result<()> {
        let destination =
            SocketAddr::from((self.pool.config().calculate_broadcast(), self.reply_port));

        self.socket.send_to(&reply.encode(), destination).await?;

        Ok(())
    }
}
