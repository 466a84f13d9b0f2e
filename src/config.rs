//! Environment configuration.
//!
//! Every variable has a default, so the daemon runs usefully inside a
//! typical gluetun sidecar pod with no configuration at all — apart from
//! `ALLOWED_IPS`, which defaults to empty and therefore denies all gated
//! traffic until set.

use std::path::PathBuf;

use crate::allowlist::IpAllowlist;
use crate::error::{SyncError, SyncResult};

pub const DEFAULT_QBIT_ADDR: &str = "http://localhost:8080";
pub const DEFAULT_PORT_FILE: &str = "/tmp/gluetun/forwarded_port";
pub const DEFAULT_LISTEN_PORT: u16 = 9090;

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// qBittorrent Web API base URL (`QBIT_ADDR`).
    pub qbit_addr: String,
    /// Web API username (`QBIT_USER`), empty for no-auth mode.
    pub qbit_user: String,
    /// Web API password (`QBIT_PASS`).
    pub qbit_pass: String,
    /// Path to the forwarded-port file (`PORT_FILE`).
    pub port_file: PathBuf,
    /// Local listen port for the proxy (`LISTEN_PORT`).
    pub listen_port: u16,
    /// Networks allowed to reach gated endpoints (`ALLOWED_IPS`).
    pub allowlist: IpAllowlist,
}

impl Config {
    /// Resolve configuration from process environment variables.
    ///
    /// Log verbosity is handled separately via `RUST_LOG`.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let listen_port_raw =
            lookup("LISTEN_PORT").unwrap_or_else(|| DEFAULT_LISTEN_PORT.to_string());
        let listen_port = listen_port_raw.trim().parse::<u16>().map_err(|_| {
            SyncError::Configuration(format!(
                "LISTEN_PORT must be a port number, got '{}'",
                listen_port_raw
            ))
        })?;

        let allowlist = IpAllowlist::parse(&lookup("ALLOWED_IPS").unwrap_or_default())?;

        Ok(Self {
            qbit_addr: lookup("QBIT_ADDR").unwrap_or_else(|| DEFAULT_QBIT_ADDR.to_string()),
            qbit_user: lookup("QBIT_USER").unwrap_or_default(),
            qbit_pass: lookup("QBIT_PASS").unwrap_or_default(),
            port_file: PathBuf::from(
                lookup("PORT_FILE").unwrap_or_else(|| DEFAULT_PORT_FILE.to_string()),
            ),
            listen_port,
            allowlist,
        })
    }
}
