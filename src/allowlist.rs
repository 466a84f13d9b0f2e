//! IP allowlist with CIDR support.
//!
//! Gated HTTP endpoints are only reachable from networks listed here.
//! Entries are parsed once at startup; the set is immutable afterwards and
//! shared across request handlers without further synchronization.

use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{SyncError, SyncResult};

/// An immutable set of allowed networks.
///
/// Built from a comma-separated configuration string. Individual IPs are
/// widened to host networks (/32 for IPv4, /128 for IPv6), and IPv6 literals
/// may be enclosed in brackets. An empty allowlist denies all gated traffic
/// (fail-closed); the health endpoint is never gated, so probes keep working.
#[derive(Debug, Clone, Default)]
pub struct IpAllowlist {
    networks: Vec<IpNetwork>,
}

impl IpAllowlist {
    /// Parse a comma-separated list of CIDRs and plain IPs.
    ///
    /// Parsing is atomic: one bad entry rejects the whole configuration, so a
    /// typo can never silently narrow the policy.
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let mut networks = Vec::new();

        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            // Bracketed IPv6 literals: [2001:db8::1]
            let entry = entry
                .strip_prefix('[')
                .and_then(|e| e.strip_suffix(']'))
                .unwrap_or(entry);

            let network = if entry.contains('/') {
                IpNetwork::from_str(entry)
                    .map_err(|_| SyncError::InvalidAllowlist(entry.to_string()))?
            } else {
                // Single IP without a mask becomes a host network.
                let addr = IpAddr::from_str(entry)
                    .map_err(|_| SyncError::InvalidAllowlist(entry.to_string()))?;
                let prefix = match addr {
                    IpAddr::V4(_) => 32,
                    IpAddr::V6(_) => 128,
                };
                IpNetwork::new(addr, prefix)
                    .map_err(|_| SyncError::InvalidAllowlist(entry.to_string()))?
            };
            networks.push(network);
        }

        Ok(Self { networks })
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Check whether a remote address may reach gated endpoints.
    ///
    /// Accepts `ip`, `ip:port`, `[ipv6]` and `[ipv6]:port` forms. Addresses
    /// that cannot be parsed are denied and logged as a security anomaly.
    pub fn is_allowed(&self, remote: &str) -> bool {
        if self.networks.is_empty() {
            return false;
        }

        let host = strip_port(remote);
        let ip = match IpAddr::from_str(host) {
            Ok(ip) => ip,
            Err(_) => {
                tracing::warn!(remote, "failed to parse remote address, denying");
                return false;
            }
        };

        self.networks.iter().any(|network| network.contains(ip))
    }
}

/// Strip an optional `:port` suffix from a remote address.
fn strip_port(remote: &str) -> &str {
    if let Some(rest) = remote.strip_prefix('[') {
        // Bracketed IPv6, with or without a trailing port.
        return rest.split(']').next().unwrap_or(rest);
    }
    match remote.matches(':').count() {
        // IPv4 (or hostname) with a port.
        1 => remote.rsplit_once(':').map(|(host, _)| host).unwrap_or(remote),
        // Zero colons: bare IPv4. Two or more: bare IPv6.
        _ => remote,
    }
}
