//! Data-channel session loop.
//!
//! Serves exactly one display client at a time:
//!
//! 1. Block until the liveness monitor reports a heartbeat client.
//! 2. Bind a fresh listener on the data channel and accept one client.
//! 3. Run the [`Forwarder`] until the session ends.
//! 4. Close the client socket and the listener, then start over.
//!
//! `accept` is only called again after the previous session's sockets are
//! closed, so two data sessions can never overlap.

// Rust guideline compliant 2026-02

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use anyhow::Result;

use crate::constants::ACCEPT_RETRY_DELAY;
use crate::forwarder::{Forwarder, SessionEnd};
use crate::liveness::LivenessFlag;
use crate::transport::{self, Channel};

/// Accepts data-channel clients one session at a time.
#[derive(Debug)]
pub struct SessionLoop {
    liveness: Arc<LivenessFlag>,
    forwarder: Forwarder,
    addr: SocketAddr,
}

impl SessionLoop {
    /// Create a session loop serving the data channel at `addr`.
    pub fn new(liveness: Arc<LivenessFlag>, forwarder: Forwarder, addr: SocketAddr) -> Self {
        Self {
            liveness,
            forwarder,
            addr,
        }
    }

    /// Serve sessions forever.
    ///
    /// # Errors
    ///
    /// Returns only if the data channel cannot be bound.
    pub fn run(&self) -> Result<()> {
        loop {
            log::info!("Waiting for the client heartbeat");
            self.liveness.wait_until_alive();

            let listener = transport::bind(Channel::Data, self.addr)?;
            if let Some(end) = self.run_session(&listener) {
                log::info!("Data session closed: {end}");
            }
            // listener dropped here, before the next bind
        }
    }

    /// Accept one client on `listener` and forward to it until the session
    /// ends. The client socket is closed before returning.
    ///
    /// Returns `None` if the accept failed.
    pub fn run_session(&self, listener: &TcpListener) -> Option<SessionEnd> {
        log::info!("Waiting for an image receiver to connect");
        let mut stream = match transport::accept(Channel::Data, listener) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("[data] accept failed: {e}");
                thread::sleep(ACCEPT_RETRY_DELAY);
                return None;
            }
        };

        let end = self.forwarder.run(&mut stream);
        if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
            log::debug!("[data] shutdown after session end: {e}");
        }
        Some(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Mailbox;
    use std::io::Read;
    use std::net::TcpStream;
    use std::time::{Duration, Instant};

    const FAST_POLL: Duration = Duration::from_millis(20);

    #[test]
    fn test_session_forwards_until_liveness_lost() {
        let mailbox = Arc::new(Mailbox::new());
        let liveness = Arc::new(LivenessFlag::new());
        liveness.mark_alive();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let sessions = SessionLoop::new(
            Arc::clone(&liveness),
            Forwarder::new(Arc::clone(&mailbox), Arc::clone(&liveness), FAST_POLL),
            addr,
        );
        let handle = thread::spawn(move || sessions.run_session(&listener));

        let mut client = TcpStream::connect(addr).unwrap();
        mailbox.publish("+");

        let mut buf = [0u8; 1];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1]);

        liveness.mark_dead();
        let end = handle.join().unwrap();
        assert!(matches!(end, Some(SessionEnd::LivenessLost)));

        // Server side closed the socket: the client sees EOF
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_data_channel_bound_only_while_alive() {
        let mailbox = Arc::new(Mailbox::new());
        let liveness = Arc::new(LivenessFlag::new());

        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let sessions = SessionLoop::new(
            Arc::clone(&liveness),
            Forwarder::new(Arc::clone(&mailbox), Arc::clone(&liveness), FAST_POLL),
            addr,
        );
        // Runs forever; the thread ends with the test process
        thread::spawn(move || sessions.run());

        // Flag is DEAD: nothing listens on the data port
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            assert!(TcpStream::connect(addr).is_err(), "data channel bound while client dead");
            thread::sleep(Duration::from_millis(20));
        }

        liveness.mark_alive();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut client = loop {
            match TcpStream::connect(addr) {
                Ok(stream) => break stream,
                Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                Err(e) => panic!("data channel never bound after ALIVE: {e}"),
            }
        };

        mailbox.publish("+");
        let mut buf = [0u8; 1];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1]);
    }
}
