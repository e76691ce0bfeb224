//! Configuration loading.
//!
//! Settings come from, in increasing precedence: built-in defaults, the
//! JSON config file, `IPHO_*` environment variables, and command-line flags
//! (applied by `main`).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DATA_PORT, DEFAULT_BIND_ADDRESS, HEARTBEAT_PORT, MAILBOX_POLL_INTERVAL, MAX_POLL_INTERVAL,
    MIN_POLL_INTERVAL, PROBE_INTERVAL,
};

/// Configuration for the relay and the companion receiver.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Address both channels listen on (relay) or connect to (receiver).
    pub bind_address: String,
    /// Port of the data channel.
    pub data_port: u16,
    /// Port of the heartbeat channel.
    pub heartbeat_port: u16,
    /// Milliseconds between heartbeat probes.
    pub probe_interval_ms: u64,
    /// Milliseconds the forwarder waits on an empty mailbox before
    /// re-checking liveness.
    pub poll_interval_ms: u64,
    /// Named pipe the photobooth writes commands into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifo_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            data_port: DATA_PORT,
            heartbeat_port: HEARTBEAT_PORT,
            probe_interval_ms: PROBE_INTERVAL.as_millis() as u64,
            poll_interval_ms: MAILBOX_POLL_INTERVAL.as_millis() as u64,
            fifo_path: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `IPHO_CONFIG_DIR` overrides the platform config dir
    /// (`~/.config/ipho-relay` on Linux).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("IPHO_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ipho-relay"))
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing config file means defaults; an unreadable or malformed one
    /// is logged and ignored.
    pub fn load() -> Result<Self> {
        let path = Self::config_dir()?.join("config.json");
        let mut config = if path.exists() {
            Self::load_from_file(&path).unwrap_or_else(|e| {
                log::warn!("Ignoring config file {}: {e:#}", path.display());
                Self::default()
            })
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply `IPHO_*` overrides looked up through `lookup`.
    ///
    /// Values that do not parse are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("IPHO_BIND_ADDRESS") {
            self.bind_address = addr;
        }

        if let Some(port) = lookup("IPHO_DATA_PORT").and_then(|v| v.parse().ok()) {
            self.data_port = port;
        }

        if let Some(port) = lookup("IPHO_HEARTBEAT_PORT").and_then(|v| v.parse().ok()) {
            self.heartbeat_port = port;
        }

        if let Some(ms) = lookup("IPHO_PROBE_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.probe_interval_ms = ms;
        }

        if let Some(ms) = lookup("IPHO_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = ms;
        }

        if let Some(fifo) = lookup("IPHO_FIFO") {
            self.fifo_path = Some(PathBuf::from(fifo));
        }
    }

    fn ip(&self) -> Result<IpAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_address))
    }

    /// Socket address of the data channel.
    pub fn data_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.ip()?, self.data_port))
    }

    /// Socket address of the heartbeat channel.
    pub fn heartbeat_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.ip()?, self.heartbeat_port))
    }

    /// Interval between heartbeat probes (at least one millisecond).
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms.max(1))
    }

    /// Mailbox poll interval, clamped to the supported tuning range.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }
}
