//! Top-level wiring of the relay.
//!
//! [`Relay::run`] owns the shared [`Mailbox`] and [`LivenessFlag`], starts
//! the command source and the liveness monitor on named threads, and drives
//! the session loop on the calling thread. Any of the three failing fatally
//! terminates the process.

// Rust guideline compliant 2026-02

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};

use crate::command_source::{self, FifoSource};
use crate::config::Config;
use crate::forwarder::Forwarder;
use crate::liveness::LivenessFlag;
use crate::mailbox::Mailbox;
use crate::monitor::LivenessMonitor;
use crate::session::SessionLoop;

/// The photo relay: one command source, one heartbeat monitor, one data
/// session at a time.
#[derive(Debug)]
pub struct Relay {
    config: Config,
    fifo: PathBuf,
}

impl Relay {
    /// Create a relay from `config`.
    ///
    /// # Errors
    ///
    /// Fails if no FIFO path is configured.
    pub fn new(config: Config) -> Result<Self> {
        let fifo = config
            .fifo_path
            .clone()
            .context("No command FIFO configured (pass it to `serve` or set IPHO_FIFO)")?;
        Ok(Self { config, fifo })
    }

    /// Run the relay. Only returns on a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if the FIFO cannot be created, a worker thread
    /// cannot be spawned, an address is invalid, or the data channel cannot
    /// be bound.
    pub fn run(self) -> Result<()> {
        let data_addr = self.config.data_addr()?;
        let heartbeat_addr = self.config.heartbeat_addr()?;

        command_source::create_fifo(&self.fifo)?;

        let mailbox = Arc::new(Mailbox::new());
        let liveness = Arc::new(LivenessFlag::new());

        let source = FifoSource::new(self.fifo.clone());
        let producer_mailbox = Arc::clone(&mailbox);
        spawn_critical("command-source", move || source.run(&producer_mailbox))?;

        let monitor = LivenessMonitor::new(
            Arc::clone(&liveness),
            heartbeat_addr,
            self.config.probe_interval(),
        );
        spawn_critical("liveness-monitor", move || monitor.run())?;

        log::info!(
            "Relay started: fifo={}, data={data_addr}, heartbeat={heartbeat_addr}",
            self.fifo.display()
        );

        let forwarder = Forwarder::new(mailbox, Arc::clone(&liveness), self.config.poll_interval());
        SessionLoop::new(liveness, forwarder, data_addr).run()
    }
}

/// Spawn a named worker whose failure takes the whole process down.
fn spawn_critical<F>(name: &str, work: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            if let Err(e) = work() {
                log::error!("[{thread_name}] fatal: {e:#}");
                std::process::exit(1);
            }
        })
        .with_context(|| format!("Failed to spawn {name} thread"))?;
    Ok(())
}
