//! Companion display client.
//!
//! Connects to a running relay the way a photo display does: heartbeat
//! channel first, then the data channel. Delivered photos are written to an
//! output directory; notifications are logged. When the relay drops the
//! session, both sockets are closed and the receiver reconnects.

// Rust guideline compliant 2026-02

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};

use crate::constants::{DATA_CONNECT_ATTEMPTS, DATA_CONNECT_RETRY_DELAY, RECONNECT_DELAY};
use crate::protocol::{Frame, FrameDecoder};

/// Read buffer size for both channels.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Receives frames from a relay and stores delivered photos.
#[derive(Debug)]
pub struct Receiver {
    data_addr: SocketAddr,
    heartbeat_addr: SocketAddr,
    out_dir: PathBuf,
    saved: u64,
}

impl Receiver {
    /// Create a receiver for the relay at the given channel addresses.
    pub fn new(data_addr: SocketAddr, heartbeat_addr: SocketAddr, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_addr,
            heartbeat_addr,
            out_dir: out_dir.into(),
            saved: 0,
        }
    }

    /// Number of photos written so far.
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Receive from the relay forever, reconnecting after every session.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directory cannot be created.
    pub fn run(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create output directory {}", self.out_dir.display()))?;

        loop {
            match self.receive_session() {
                Ok(()) => log::info!("Relay closed the data channel"),
                Err(e) => log::warn!("Session failed: {e:#}"),
            }
            thread::sleep(RECONNECT_DELAY);
        }
    }

    /// Run one session: connect both channels and process data frames until
    /// the relay closes the data channel.
    ///
    /// # Errors
    ///
    /// Returns an error if a channel cannot be connected, the data stream is
    /// malformed, or a photo cannot be saved.
    pub fn receive_session(&mut self) -> Result<()> {
        let heartbeat = TcpStream::connect(self.heartbeat_addr)
            .with_context(|| format!("Failed to connect heartbeat channel {}", self.heartbeat_addr))?;
        log::info!("[heartbeat] connected to {}", self.heartbeat_addr);

        let reader = heartbeat.try_clone().context("Failed to clone heartbeat socket")?;
        let drain = thread::Builder::new()
            .name("heartbeat-reader".to_string())
            .spawn(move || drain_probes(reader))
            .context("Failed to spawn heartbeat-reader thread")?;

        let result = self.connect_data().and_then(|data| self.process(data));

        // Closing the heartbeat tells the relay's monitor we are gone
        if let Err(e) = heartbeat.shutdown(Shutdown::Both) {
            log::debug!("[heartbeat] shutdown after session end: {e}");
        }
        if drain.join().is_err() {
            log::warn!("[heartbeat] reader thread panicked");
        }
        result
    }

    /// Connect the data channel, retrying while the relay has not bound it yet.
    fn connect_data(&self) -> Result<TcpStream> {
        let mut attempt = 1;
        loop {
            match TcpStream::connect(self.data_addr) {
                Ok(stream) => {
                    log::info!("[data] connected to {}", self.data_addr);
                    return Ok(stream);
                }
                Err(e) if attempt < DATA_CONNECT_ATTEMPTS => {
                    log::debug!("[data] connect attempt {attempt} failed: {e}");
                    attempt += 1;
                    thread::sleep(DATA_CONNECT_RETRY_DELAY);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to connect data channel {}", self.data_addr));
                }
            }
        }
    }

    /// Decode frames from `stream` until EOF.
    fn process<R: Read>(&mut self, mut stream: R) -> Result<()> {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];

        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read data channel"),
            };
            for frame in decoder.feed(&buf[..n])? {
                self.handle_frame(frame)?;
            }
        }

        if decoder.has_partial() {
            log::warn!("[data] connection closed in the middle of a frame");
        }
        Ok(())
    }

    /// Act on one data-channel frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a delivered photo cannot be written.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Notify => log::info!("A photo was just taken"),
            Frame::Deliver(bytes) => {
                self.saved += 1;
                let path = save_photo(&self.out_dir, self.saved, &bytes)?;
                log::info!("Saved photo {} ({} bytes)", path.display(), bytes.len());
            }
            Frame::Probe => log::debug!("[data] unexpected probe frame"),
        }
        Ok(())
    }
}

/// Write one delivered photo into `dir` under a timestamped name.
fn save_photo(dir: &Path, seq: u64, bytes: &[u8]) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("photo-{stamp}-{seq:04}.jpg"));
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Read and discard heartbeat probes until the relay or we close the socket.
fn drain_probes(mut stream: TcpStream) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => match decoder.feed(&buf[..n]) {
                Ok(frames) => log::trace!("[heartbeat] {} probe(s)", frames.len()),
                Err(e) => {
                    log::warn!("[heartbeat] {e}");
                    break;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("[heartbeat] read ended: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn photos_in(dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_deliver_frame_is_saved() {
        let tmp = tempfile::TempDir::new().unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], 1));
        let mut receiver = Receiver::new(addr, addr, tmp.path());

        receiver.handle_frame(Frame::Notify).unwrap();
        receiver.handle_frame(Frame::Deliver(b"ABCDE".to_vec())).unwrap();

        let photos = photos_in(tmp.path());
        assert_eq!(photos.len(), 1);
        assert_eq!(std::fs::read(&photos[0]).unwrap(), b"ABCDE");
        assert_eq!(receiver.saved(), 1);
    }

    #[test]
    fn test_process_handles_split_frames() {
        let tmp = tempfile::TempDir::new().unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], 1));
        let mut receiver = Receiver::new(addr, addr, tmp.path());

        let mut stream = Frame::Notify.encode().unwrap();
        stream.extend(Frame::Deliver(vec![7; 300]).encode().unwrap());
        stream.extend(Frame::Deliver(b"second".to_vec()).encode().unwrap());
        receiver.process(stream.as_slice()).unwrap();

        assert_eq!(receiver.saved(), 2);
        assert_eq!(photos_in(tmp.path()).len(), 2);
    }

    #[test]
    fn test_process_rejects_garbage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], 1));
        let mut receiver = Receiver::new(addr, addr, tmp.path());

        assert!(receiver.process([0x09u8].as_slice()).is_err());
    }

    #[test]
    fn test_session_against_fake_relay() {
        let tmp = tempfile::TempDir::new().unwrap();
        let heartbeat = TcpListener::bind("127.0.0.1:0").unwrap();
        let data = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut receiver = Receiver::new(
            data.local_addr().unwrap(),
            heartbeat.local_addr().unwrap(),
            tmp.path(),
        );

        let relay = thread::spawn(move || {
            let (mut hb, _) = heartbeat.accept().unwrap();
            hb.write_all(&[3, 3]).unwrap();
            let (mut stream, _) = data.accept().unwrap();
            Frame::Notify.write_to(&mut stream).unwrap();
            Frame::Deliver(b"JPEG".to_vec()).write_to(&mut stream).unwrap();
            // Dropping both sockets ends the session
        });

        receiver.receive_session().unwrap();
        relay.join().unwrap();

        let photos = photos_in(tmp.path());
        assert_eq!(photos.len(), 1);
        assert_eq!(std::fs::read(&photos[0]).unwrap(), b"JPEG");
    }
}
