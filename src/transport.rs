//! TCP plumbing for the data and heartbeat channels.
//!
//! Thin wrappers over `std::net` that attach channel names to errors and
//! log lines. A fresh listener is bound for every session or probe cycle
//! and dropped with it; listeners are never reused across sessions.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use anyhow::{Context, Result};

use crate::constants::SOCKET_WRITE_TIMEOUT;

/// One of the two well-known channels a display client connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Main channel: `Notify` and `Deliver` frames.
    Data,
    /// Heartbeat channel: `Probe` frames.
    Heartbeat,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::Heartbeat => write!(f, "heartbeat"),
        }
    }
}

/// Bind a listening socket for `channel` on `addr`.
///
/// `SO_REUSEADDR` is set by the standard library on Unix, so a channel can
/// be rebound right after the previous session's listener is dropped.
pub fn bind(channel: Channel, addr: SocketAddr) -> Result<TcpListener> {
    log::info!("Binding {channel} channel to {addr}");
    TcpListener::bind(addr).with_context(|| format!("Failed to bind {channel} channel to {addr}"))
}

/// Accept one client on `listener`.
///
/// The accepted stream gets a write timeout so a peer that stops reading
/// without closing its socket turns into a write error instead of a
/// permanently blocked writer.
pub fn accept(channel: Channel, listener: &TcpListener) -> io::Result<TcpStream> {
    let (stream, peer) = listener.accept()?;
    stream.set_write_timeout(Some(SOCKET_WRITE_TIMEOUT))?;
    if let Err(e) = stream.set_nodelay(true) {
        log::debug!("[{channel}] could not disable Nagle for {peer}: {e}");
    }
    log::info!("[{channel}] connection accepted from {peer}");
    Ok(stream)
}

/// Write every byte of `bytes`, retrying partial writes.
pub fn write_fully<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(Channel::Data.to_string(), "data");
        assert_eq!(Channel::Heartbeat.to_string(), "heartbeat");
    }

    #[test]
    fn test_bind_accept_write() {
        let listener = bind(Channel::Data, loopback()).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let mut server_side = accept(Channel::Data, &listener).unwrap();
        write_fully(&mut server_side, b"hello").unwrap();

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_bind_conflict_names_channel() {
        let first = bind(Channel::Heartbeat, loopback()).unwrap();
        let taken = first.local_addr().unwrap();
        let err = bind(Channel::Heartbeat, taken).unwrap_err();
        assert!(format!("{err:#}").contains("heartbeat channel"), "got: {err:#}");
    }

    #[test]
    fn test_write_fully_to_partial_writer() {
        // Writer that accepts at most two bytes per call
        struct Trickle(Vec<u8>);
        impl Write for Trickle {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let n = buf.len().min(2);
                self.0.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut writer = Trickle(Vec::new());
        write_fully(&mut writer, b"ABCDE").unwrap();
        assert_eq!(writer.0, b"ABCDE");
    }
}
