//! Application-wide constants for ipho-relay.
//!
//! Centralizes the well-known ports, timing intervals and buffer limits
//! shared by the relay and the companion receiver.
//!
//! # Categories
//!
//! - **Channels**: TCP ports the display client connects to
//! - **Timing**: Probe cadence and mailbox poll interval
//! - **Commands**: Mailbox capacity and the notify sentinel

use std::time::Duration;

// ============================================================================
// Channels
// ============================================================================

/// Port of the main (data) channel carrying `Notify` and `Deliver` frames.
pub const DATA_PORT: u16 = 1338;

/// Port of the heartbeat channel carrying `Probe` frames.
pub const HEARTBEAT_PORT: u16 = 1339;

/// Default listen address for both channels (all IPv4 interfaces).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

// ============================================================================
// Timing
// ============================================================================

/// Interval between two heartbeat probes while a client is connected.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Bounded wait of the forwarder on the mailbox before re-checking liveness.
///
/// This is the worst-case latency for noticing a dead client while idle.
pub const MAILBOX_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Smallest accepted mailbox poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Largest accepted mailbox poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound on a single blocking socket write.
///
/// A client that vanished without closing its socket eventually fills the
/// send buffer; the timeout turns that stall into a write error.
pub const SOCKET_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before retrying after a failed `accept`.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Delay before retrying after a failed FIFO read.
pub const FIFO_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Pause of the receiver between two connection attempts to the relay.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How many times the receiver tries the data channel after its heartbeat
/// connection was accepted.
///
/// The relay only binds the data channel once it has seen the heartbeat, so
/// the first attempts may be refused.
pub const DATA_CONNECT_ATTEMPTS: u32 = 20;

/// Pause between two data-channel connection attempts.
pub const DATA_CONNECT_RETRY_DELAY: Duration = Duration::from_millis(250);

// ============================================================================
// Commands
// ============================================================================

/// Capacity of the command buffer, terminator included.
pub const COMMAND_CAPACITY: usize = 255;

/// Longest command text kept by the mailbox, in bytes.
///
/// One slot of [`COMMAND_CAPACITY`] is reserved for the terminator, so
/// anything longer is truncated to this length.
pub const MAX_COMMAND_LEN: usize = COMMAND_CAPACITY - 1;

/// First byte of a command line that announces "a photo was taken".
pub const NOTIFY_SENTINEL: u8 = b'+';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_distinct() {
        assert_ne!(DATA_PORT, HEARTBEAT_PORT);
    }

    #[test]
    fn test_poll_interval_within_tuning_range() {
        assert!(MAILBOX_POLL_INTERVAL >= MIN_POLL_INTERVAL);
        assert!(MAILBOX_POLL_INTERVAL <= MAX_POLL_INTERVAL);
    }

    #[test]
    fn test_command_len_leaves_room_for_terminator() {
        assert_eq!(MAX_COMMAND_LEN + 1, COMMAND_CAPACITY);
    }
}
