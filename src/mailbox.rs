//! Single-slot command handoff between the command source and the forwarder.
//!
//! The mailbox holds at most one pending command. Publishing overwrites any
//! command the forwarder has not taken yet (last write wins): the display
//! only ever shows the latest photo, so stale commands are dropped instead
//! of queued.
//!
//! ```text
//! command source ──publish──► [ slot | available ] ──take_with_timeout──► forwarder
//! ```

// Rust guideline compliant 2026-02

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::constants::{MAX_COMMAND_LEN, NOTIFY_SENTINEL};

/// A command for the display client, parsed from one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A photo was just taken.
    Notify,
    /// Send the photo stored at this path.
    Deliver(PathBuf),
}

impl Command {
    /// Classify raw command bytes.
    ///
    /// A line starting with [`NOTIFY_SENTINEL`] is a `Notify`; any other
    /// non-empty line is a path to deliver, taken byte for byte (file names
    /// need not be UTF-8). An empty line is no command at all.
    pub fn parse(line: &[u8]) -> Option<Self> {
        match line.first() {
            None => None,
            Some(&first) if first == NOTIFY_SENTINEL => Some(Self::Notify),
            Some(_) => Some(Self::Deliver(PathBuf::from(OsStr::from_bytes(line)))),
        }
    }
}

/// Result of [`Mailbox::take_with_timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Take {
    /// A command was pending and has been consumed.
    Command(Command),
    /// An empty line was pending and has been consumed; nothing to send.
    Empty,
    /// Nothing was published before the deadline.
    Timeout,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Vec<u8>,
    available: bool,
}

/// Overwrite-on-write single-slot mailbox.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    published: Condvar,
}

impl Mailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().expect("mailbox mutex poisoned")
    }

    /// Store `line` as the pending command, replacing any unconsumed one.
    ///
    /// Lines longer than [`MAX_COMMAND_LEN`] bytes are truncated. Never
    /// blocks beyond the mailbox lock.
    pub fn publish(&self, line: impl AsRef<[u8]>) {
        let line = line.as_ref();
        let line = &line[..line.len().min(MAX_COMMAND_LEN)];
        {
            let mut slot = self.lock();
            slot.pending.clear();
            slot.pending.extend_from_slice(line);
            slot.available = true;
        }
        self.published.notify_one();
    }

    /// Take the pending command, waiting at most `max_wait` for one.
    ///
    /// The wait is bounded by an absolute deadline, so spurious wakeups do
    /// not extend it.
    pub fn take_with_timeout(&self, max_wait: Duration) -> Take {
        let deadline = Instant::now() + max_wait;
        let mut slot = self.lock();
        while !slot.available {
            let now = Instant::now();
            if now >= deadline {
                return Take::Timeout;
            }
            slot = self
                .published
                .wait_timeout(slot, deadline - now)
                .expect("mailbox mutex poisoned")
                .0;
        }

        let line = std::mem::take(&mut slot.pending);
        slot.available = false;
        drop(slot);

        match Command::parse(&line) {
            Some(command) => Take::Command(command),
            None => Take::Empty,
        }
    }

    /// Returns `true` if a published command has not been taken yet.
    pub fn has_pending(&self) -> bool {
        self.lock().available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_parse_notify_sentinel() {
        assert_eq!(Command::parse(b"+"), Some(Command::Notify));
        assert_eq!(Command::parse(b"+anything"), Some(Command::Notify));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            Command::parse(b"/srv/photos/img_0001.jpg"),
            Some(Command::Deliver(PathBuf::from("/srv/photos/img_0001.jpg")))
        );
    }

    #[test]
    fn test_parse_empty_is_no_command() {
        assert_eq!(Command::parse(b""), None);
    }

    #[test]
    fn test_publish_then_take() {
        let mailbox = Mailbox::new();
        mailbox.publish("+");
        assert!(mailbox.has_pending());
        assert_eq!(mailbox.take_with_timeout(Duration::ZERO), Take::Command(Command::Notify));
        assert!(!mailbox.has_pending());
    }

    #[test]
    fn test_last_write_wins() {
        let mailbox = Mailbox::new();
        mailbox.publish("/tmp/a.jpg");
        mailbox.publish("/tmp/b.jpg");
        assert_eq!(
            mailbox.take_with_timeout(Duration::ZERO),
            Take::Command(Command::Deliver(PathBuf::from("/tmp/b.jpg")))
        );
        // The overwritten value is gone, not queued
        assert_eq!(mailbox.take_with_timeout(Duration::from_millis(20)), Take::Timeout);
    }

    #[test]
    fn test_take_consumes_exactly_once() {
        let mailbox = Mailbox::new();
        mailbox.publish("+");
        assert_eq!(mailbox.take_with_timeout(Duration::ZERO), Take::Command(Command::Notify));
        assert_eq!(mailbox.take_with_timeout(Duration::ZERO), Take::Timeout);
    }

    #[test]
    fn test_timeout_waits_at_least_max_wait() {
        let mailbox = Mailbox::new();
        let start = Instant::now();
        assert_eq!(mailbox.take_with_timeout(Duration::from_millis(150)), Take::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_empty_line_is_consumed_as_empty() {
        let mailbox = Mailbox::new();
        mailbox.publish("");
        assert!(mailbox.has_pending());
        assert_eq!(mailbox.take_with_timeout(Duration::ZERO), Take::Empty);
        assert!(!mailbox.has_pending());
    }

    #[test]
    fn test_long_command_is_truncated() {
        let mailbox = Mailbox::new();
        let long = "x".repeat(MAX_COMMAND_LEN + 40);
        mailbox.publish(&long);
        match mailbox.take_with_timeout(Duration::ZERO) {
            Take::Command(Command::Deliver(path)) => {
                assert_eq!(path.as_os_str().len(), MAX_COMMAND_LEN);
            }
            other => panic!("Expected Deliver, got: {other:?}"),
        }
    }

    #[test]
    fn test_non_utf8_path_is_kept_byte_for_byte() {
        let mailbox = Mailbox::new();
        mailbox.publish(b"/srv/photos/ph\xe9.jpg");
        assert_eq!(
            mailbox.take_with_timeout(Duration::ZERO),
            Take::Command(Command::Deliver(PathBuf::from(OsStr::from_bytes(
                b"/srv/photos/ph\xe9.jpg"
            ))))
        );
    }

    #[test]
    fn test_publish_wakes_waiting_consumer() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.take_with_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        mailbox.publish("+");

        assert_eq!(consumer.join().unwrap(), Take::Command(Command::Notify));
        assert!(start.elapsed() < Duration::from_secs(2), "consumer should wake promptly");
    }
}
