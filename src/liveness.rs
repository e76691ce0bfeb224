//! Shared reachability state of the display client.
//!
//! The [`LivenessFlag`] is written only by the liveness monitor: it goes
//! ALIVE when a client connects to the heartbeat channel and DEAD when a
//! probe write fails. The forwarder reads it after every mailbox timeout and
//! the session loop blocks on it before accepting a data connection.
//!
//! Every DEAD→ALIVE transition wakes all waiters exactly once; repeated
//! writes of the current state are no-ops and wake nobody.

// Rust guideline compliant 2026-02

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Whether the display client is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientStatus {
    /// No heartbeat client, or the last probe failed.
    #[default]
    Dead,
    /// A heartbeat client is connected and probes succeed.
    Alive,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dead => write!(f, "dead"),
            Self::Alive => write!(f, "alive"),
        }
    }
}

/// Mutex-guarded [`ClientStatus`] with a condition variable signalled on
/// every transition to ALIVE.
///
/// Starts DEAD.
#[derive(Debug, Default)]
pub struct LivenessFlag {
    status: Mutex<ClientStatus>,
    alive: Condvar,
}

impl LivenessFlag {
    /// Create a flag in the DEAD state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClientStatus> {
        self.status.lock().expect("liveness mutex poisoned")
    }

    /// Current status.
    pub fn status(&self) -> ClientStatus {
        *self.lock()
    }

    /// Returns `true` if the client is currently ALIVE.
    pub fn is_alive(&self) -> bool {
        self.status() == ClientStatus::Alive
    }

    /// Mark the client ALIVE and wake every waiter.
    ///
    /// Returns `true` if this call performed a DEAD→ALIVE transition.
    /// Waiters are only notified on an actual transition.
    pub fn mark_alive(&self) -> bool {
        let mut status = self.lock();
        if *status == ClientStatus::Alive {
            return false;
        }
        *status = ClientStatus::Alive;
        drop(status);
        self.alive.notify_all();
        true
    }

    /// Mark the client DEAD.
    ///
    /// Returns `true` if this call performed an ALIVE→DEAD transition.
    pub fn mark_dead(&self) -> bool {
        let mut status = self.lock();
        let was_alive = *status == ClientStatus::Alive;
        *status = ClientStatus::Dead;
        was_alive
    }

    /// Block until the client is ALIVE. Returns immediately if it already is.
    pub fn wait_until_alive(&self) {
        let status = self.lock();
        let _status = self
            .alive
            .wait_while(status, |s| *s == ClientStatus::Dead)
            .expect("liveness mutex poisoned");
    }

    /// Block until the client is ALIVE or `timeout` elapses.
    ///
    /// Returns `true` if the client is ALIVE on return.
    pub fn wait_until_alive_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.lock();
        while *status == ClientStatus::Dead {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            status = self
                .alive
                .wait_timeout(status, deadline - now)
                .expect("liveness mutex poisoned")
                .0;
        }
        true
    }
}
