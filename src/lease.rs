//! DHCP lease management.
//!
//! This module owns the address pool: which hardware address holds which
//! IPv4 address, and which addresses are still free. It provides:
//!
//! - Lookup of an existing lease by hardware address
//! - Allocation of the lowest free address in the configured range
//! - An atomic "existing or new" allocation for DISCOVER handling
//!
//! Leases are held in memory for the lifetime of the process. Expiry is
//! recorded on every lease but addresses are never reclaimed.
//!
//! # Thread Safety
//!
//! All operations are thread-safe. The [`LeasePool`] keeps its table behind a
//! [`RwLock`]; every allocation happens under the write lock, so two
//! concurrent requests can never be handed the same address.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mac::MacAddress;

/// An active DHCP lease.
///
/// Binds one hardware address to one IPv4 address until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// The IP address assigned to this client.
    pub ip_address: Ipv4Addr,

    /// Hardware address of the client holding the lease.
    pub mac: MacAddress,

    /// Hostname hint supplied when the lease was allocated.
    pub hostname: Option<String>,

    /// When this lease expires (UTC).
    pub expires_at: DateTime<Utc>,

    /// When this lease was created (UTC).
    pub created_at: DateTime<Utc>,
}

impl Lease {
    /// Creates a new lease with the specified duration.
    pub fn new(ip_address: Ipv4Addr, mac: MacAddress, duration_seconds: u32) -> Self {
        let now = Utc::now();
        Self {
            ip_address,
            mac,
            hostname: None,
            expires_at: now + TimeDelta::seconds(duration_seconds as i64),
            created_at: now,
        }
    }

    /// Returns true if the lease has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns seconds remaining until expiration, or 0 if expired.
    pub fn remaining_seconds(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

/// Outcome of [`LeasePool::lease_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// The client already held this lease.
    Existing(Lease),
    /// A free address was bound to the client.
    New(Lease),
}

impl Allocation {
    pub fn lease(&self) -> &Lease {
        match self {
            Self::Existing(lease) | Self::New(lease) => lease,
        }
    }
}

#[derive(Debug)]
struct PoolState {
    leases: HashMap<MacAddress, Lease>,
    /// Reverse lookup: IP address → holder.
    ip_to_mac: HashMap<Ipv4Addr, MacAddress>,
    /// Unleased addresses, ordered so allocation always takes the lowest.
    free_ips: BTreeSet<Ipv4Addr>,
}

/// Thread-safe in-memory lease table plus the static pool configuration.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use minidhcp::{Config, LeasePool, MacAddress};
///
/// # async fn example() -> minidhcp::Result<()> {
/// let pool = LeasePool::new(Arc::new(Config::default()));
///
/// let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
/// let lease = pool.get_next_lease(mac, None).await?;
/// assert_eq!(pool.get_lease_by_mac(mac).await, Some(lease));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LeasePool {
    state: RwLock<PoolState>,
    config: Arc<Config>,
}

impl LeasePool {
    /// Creates an empty pool covering `pool_start..=pool_end`.
    ///
    /// The server's own address is never handed out, even if it falls
    /// inside the range.
    pub fn new(config: Arc<Config>) -> Self {
        let start = u32::from(config.pool_start);
        let end = u32::from(config.pool_end);
        let free_ips = (start..=end)
            .map(Ipv4Addr::from)
            .filter(|ip| *ip != config.server_ip)
            .collect();

        let state = PoolState {
            leases: HashMap::new(),
            ip_to_mac: HashMap::new(),
            free_ips,
        };

        Self {
            state: RwLock::new(state),
            config,
        }
    }

    /// Static configuration: server address, netmask, routers, DNS, lease time.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the lease held by `mac`, if any. Never allocates.
    pub async fn get_lease_by_mac(&self, mac: MacAddress) -> Option<Lease> {
        let state = self.state.read().await;
        state.leases.get(&mac).cloned()
    }

    /// Binds the lowest free address to `mac`.
    ///
    /// Callers are expected to check [`get_lease_by_mac`](Self::get_lease_by_mac)
    /// first, or use [`lease_for`](Self::lease_for). If `mac` does hold a lease
    /// already, that lease is replaced and its address returned to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every address in the range is leased.
    pub async fn get_next_lease(&self, mac: MacAddress, hint: Option<&str>) -> Result<Lease> {
        let mut state = self.state.write().await;
        self.allocate(&mut state, mac, hint)
    }

    /// Returns the existing lease for `mac`, or allocates one, under a single lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if `mac` has no lease and none is free.
    pub async fn lease_for(&self, mac: MacAddress, hint: Option<&str>) -> Result<Allocation> {
        let mut state = self.state.write().await;

        if let Some(lease) = state.leases.get(&mac) {
            return Ok(Allocation::Existing(lease.clone()));
        }

        self.allocate(&mut state, mac, hint).map(Allocation::New)
    }

    fn allocate(
        &self,
        state: &mut PoolState,
        mac: MacAddress,
        hint: Option<&str>,
    ) -> Result<Lease> {
        let ip = state.free_ips.pop_first().ok_or(Error::PoolExhausted)?;

        let mut lease = Lease::new(ip, mac, self.config.lease_duration_seconds);
        lease.hostname = hint.map(str::to_string);

        if let Some(previous) = state.leases.insert(mac, lease.clone()) {
            debug!(
                "Replacing lease {} for {} with {}",
                previous.ip_address, mac, ip
            );
            state.ip_to_mac.remove(&previous.ip_address);
            state.free_ips.insert(previous.ip_address);
        }
        state.ip_to_mac.insert(ip, mac);

        Ok(lease)
    }

    /// Returns the holder of `ip`, if leased.
    pub async fn get_lease_by_ip(&self, ip: Ipv4Addr) -> Option<Lease> {
        let state = self.state.read().await;
        state
            .ip_to_mac
            .get(&ip)
            .and_then(|mac| state.leases.get(mac).cloned())
    }

    /// Returns all leases (including expired ones), ordered by address.
    pub async fn list_leases(&self) -> Vec<Lease> {
        let state = self.state.read().await;
        let mut leases: Vec<Lease> = state.leases.values().cloned().collect();
        leases.sort_by_key(|lease| lease.ip_address);
        leases
    }

    /// Returns the count of non-expired leases.
    pub async fn active_lease_count(&self) -> usize {
        let state = self.state.read().await;
        state
            .leases
            .values()
            .filter(|lease| !lease.is_expired())
            .count()
    }

    /// Returns the count of available IPs in the pool.
    pub async fn free_ip_count(&self) -> usize {
        let state = self.state.read().await;
        state.free_ips.len()
    }
}
