//! Liveness monitor for the display client.
//!
//! Runs on its own thread and cycles through two states forever:
//!
//! ```text
//! AwaitingClient ──accept──► Connected ──probe write fails──► AwaitingClient
//!   (bind fresh listener)      (Probe every interval)           (listener dropped)
//! ```
//!
//! Accepting a heartbeat client marks the [`LivenessFlag`] ALIVE; the first
//! failed probe write marks it DEAD. A failed probe is the expected signal
//! that the client vanished and never fatal. Failing to bind the heartbeat
//! channel is fatal: there is nothing to fall back to.

// Rust guideline compliant 2026-02

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::constants::ACCEPT_RETRY_DELAY;
use crate::liveness::LivenessFlag;
use crate::protocol::Frame;
use crate::transport::{self, Channel};

/// Probes the heartbeat client and owns the DEAD/ALIVE transitions.
#[derive(Debug)]
pub struct LivenessMonitor {
    liveness: Arc<LivenessFlag>,
    addr: SocketAddr,
    probe_interval: Duration,
}

impl LivenessMonitor {
    /// Create a monitor for the heartbeat channel at `addr`.
    pub fn new(liveness: Arc<LivenessFlag>, addr: SocketAddr, probe_interval: Duration) -> Self {
        Self {
            liveness,
            addr,
            probe_interval,
        }
    }

    /// Run the accept/probe cycle forever, binding a fresh listener per cycle.
    ///
    /// # Errors
    ///
    /// Returns only if the heartbeat channel cannot be bound.
    pub fn run(&self) -> Result<()> {
        loop {
            let listener = transport::bind(Channel::Heartbeat, self.addr)?;
            self.serve(&listener);
        }
    }

    /// Serve one heartbeat client on `listener`: accept it, mark the client
    /// ALIVE, and probe until a write fails.
    ///
    /// Failed accepts are logged and retried on the same listener.
    pub fn serve(&self, listener: &TcpListener) {
        log::info!("Waiting for a client to connect to the heartbeat channel");
        let mut stream = loop {
            match transport::accept(Channel::Heartbeat, listener) {
                Ok(stream) => break stream,
                Err(e) => {
                    log::warn!("[heartbeat] accept failed: {e}");
                    thread::sleep(ACCEPT_RETRY_DELAY);
                }
            }
        };

        if self.liveness.mark_alive() {
            log::info!("Display client is alive");
        }

        let err = self.probe_until_failure(&mut stream);
        log::warn!("[heartbeat] probe failed, client considered dead: {err}");
        if self.liveness.mark_dead() {
            log::info!("Display client is dead");
        }
    }

    /// Send a `Probe` every interval until a write fails.
    fn probe_until_failure<W: Write>(&self, writer: &mut W) -> io::Error {
        loop {
            if let Err(e) = Frame::Probe.write_to(writer) {
                return e;
            }
            log::trace!("[heartbeat] probe sent");
            thread::sleep(self.probe_interval);
        }
    }
}
