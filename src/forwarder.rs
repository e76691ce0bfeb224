//! Drains the mailbox into one data-channel session.
//!
//! Each command taken from the [`Mailbox`] becomes one frame on the client
//! socket:
//!
//! - `Notify` → `[1]`
//! - `Deliver(path)` → `[2][length prefix][file bytes]`
//!
//! While idle, the forwarder wakes every poll interval to check the
//! [`LivenessFlag`]; that bounded wait is the only way a client that
//! vanished without closing its data socket gets noticed.

// Rust guideline compliant 2026-02

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::liveness::LivenessFlag;
use crate::mailbox::{Command, Mailbox, Take};
use crate::payload;
use crate::protocol::Frame;

/// Why a forwarding session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The liveness monitor reported the client dead while the mailbox was idle.
    LivenessLost,
    /// Writing a frame to the client failed.
    WriteFailed(io::Error),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LivenessLost => write!(f, "heartbeat reported the client dead"),
            Self::WriteFailed(e) => write!(f, "write to client failed: {e}"),
        }
    }
}

/// Forwards mailbox commands to a connected display client.
#[derive(Debug, Clone)]
pub struct Forwarder {
    mailbox: Arc<Mailbox>,
    liveness: Arc<LivenessFlag>,
    poll_interval: Duration,
}

impl Forwarder {
    /// Create a forwarder that re-checks liveness every `poll_interval`
    /// while the mailbox is empty.
    pub fn new(mailbox: Arc<Mailbox>, liveness: Arc<LivenessFlag>, poll_interval: Duration) -> Self {
        Self {
            mailbox,
            liveness,
            poll_interval,
        }
    }

    /// Forward commands to `sink` until the session ends.
    ///
    /// A photo that cannot be read is logged and skipped; the session stays
    /// open. The liveness flag is left untouched: only the monitor moves it.
    pub fn run<W: Write>(&self, sink: &mut W) -> SessionEnd {
        loop {
            let command = match self.mailbox.take_with_timeout(self.poll_interval) {
                Take::Timeout => {
                    if self.liveness.is_alive() {
                        continue;
                    }
                    log::info!("While waiting for commands, the heartbeat signaled that the client is dead");
                    return SessionEnd::LivenessLost;
                }
                Take::Empty => {
                    log::debug!("Ignoring empty command line");
                    continue;
                }
                Take::Command(command) => command,
            };

            if let Err(e) = self.forward(command, sink) {
                return SessionEnd::WriteFailed(e);
            }
        }
    }

    /// Send one command. Only write errors are returned.
    fn forward<W: Write>(&self, command: Command, sink: &mut W) -> io::Result<()> {
        match command {
            Command::Notify => {
                log::info!("Sending 'image taken' notification");
                Frame::Notify.write_to(sink)
            }
            Command::Deliver(path) => {
                log::info!("Trying to read file {}", path.display());
                let data = match payload::read_file(&path) {
                    Ok(data) => data,
                    Err(e) => {
                        log::warn!("Skipping delivery: {e}");
                        return Ok(());
                    }
                };

                log::info!("Transmitting file {} ({} bytes)", path.display(), data.len());
                Frame::Deliver(data).write_to(sink)?;
                log::info!("File {} has been transmitted", path.display());
                Ok(())
            }
        }
    }
}
