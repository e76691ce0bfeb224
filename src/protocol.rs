//! Wire protocol codec for the display-client channels.
//!
//! A stream of frames, each a tag byte optionally followed by a length
//! prefix and a payload:
//!
//! ```text
//! [u8 tag] [4-byte base-255 length]? [payload]?
//! ```
//!
//! Frame tags:
//! - `0x01`: Notify, a photo was just taken (data channel, tag only)
//! - `0x02`: Deliver, photo bytes (data channel, tag + length + payload)
//! - `0x03`: Probe, liveness probe (heartbeat channel, tag only)
//!
//! # Length prefix
//!
//! The length is written as four base-255 digits, least significant first:
//! byte `i` holds `(n mod 255) & 0xFF`, then `n` is divided by 255. Deployed
//! receivers decode exactly this scheme, so it is kept even though a
//! base-256 encoding would be the byte-accurate one. Consequences:
//!
//! - no digit is ever `0xFF`;
//! - the largest representable value is [`MAX_LENGTH_PREFIX`]
//!   (`255^4 - 1 = 4_228_250_624`), below `u32::MAX`;
//! - larger values wrap modulo `255^4`.

use std::io::{self, Write};

use anyhow::{bail, Result};

use crate::transport::write_fully;

/// Number of bytes in a length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Radix of the length prefix digits.
const RADIX: u32 = 255;

/// Largest payload length the length prefix can express (`255^4 - 1`).
pub const MAX_LENGTH_PREFIX: u32 = 4_228_250_624;

/// Largest `Deliver` payload the [`FrameDecoder`] accepts (256 MB).
const MAX_DECODED_PAYLOAD: u32 = 256 * 1024 * 1024;

/// Frame tag constants.
pub mod tag {
    /// A photo was just taken.
    pub const NOTIFY: u8 = 0x01;
    /// Photo payload delivery.
    pub const DELIVER: u8 = 0x02;
    /// Heartbeat probe.
    pub const PROBE: u8 = 0x03;
}

/// Encode `n` as four base-255 digits, least significant first.
///
/// Values above [`MAX_LENGTH_PREFIX`] wrap modulo `255^4`, matching the
/// receivers' decoder.
#[must_use]
pub fn encode_length_prefix(n: u32) -> [u8; LENGTH_PREFIX_LEN] {
    let mut remaining = n;
    let mut out = [0u8; LENGTH_PREFIX_LEN];
    for digit in &mut out {
        *digit = ((remaining % RADIX) & 0xFF) as u8;
        remaining /= RADIX;
    }
    out
}

/// Decode four base-255 digits (least significant first) back into a length.
#[must_use]
pub fn decode_length_prefix(bytes: [u8; LENGTH_PREFIX_LEN]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, &digit| acc.wrapping_mul(RADIX).wrapping_add(u32::from(digit)))
}

/// Payload length as a length-prefix value.
///
/// Lengths above [`MAX_LENGTH_PREFIX`] would wrap on the wire, so they are
/// refused instead.
pub fn checked_length(len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|&n| n <= MAX_LENGTH_PREFIX)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("payload of {len} bytes exceeds the {MAX_LENGTH_PREFIX}-byte frame limit"),
            )
        })
}

/// A single frame of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// "A photo was taken" notification.
    Notify,
    /// Full contents of a photo file.
    Deliver(Vec<u8>),
    /// Heartbeat probe.
    Probe,
}

impl Frame {
    /// Tag byte of this frame.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Frame::Notify => tag::NOTIFY,
            Frame::Deliver(_) => tag::DELIVER,
            Frame::Probe => tag::PROBE,
        }
    }

    /// Tag byte plus, for `Deliver`, the length prefix.
    fn header(&self) -> io::Result<Vec<u8>> {
        match self {
            Frame::Notify | Frame::Probe => Ok(vec![self.tag()]),
            Frame::Deliver(data) => {
                let len = checked_length(data.len())?;
                let mut header = Vec::with_capacity(1 + LENGTH_PREFIX_LEN);
                header.push(tag::DELIVER);
                header.extend_from_slice(&encode_length_prefix(len));
                Ok(header)
            }
        }
    }

    /// Encode this frame into a wire-format byte vector.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidInput` if a `Deliver` payload is longer than
    /// [`MAX_LENGTH_PREFIX`].
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = self.header()?;
        if let Frame::Deliver(data) = self {
            buf.extend_from_slice(data);
        }
        Ok(buf)
    }

    /// Write this frame fully to `writer`.
    ///
    /// The payload is written straight from the frame without building an
    /// intermediate buffer. Partial writes are retried until every byte is
    /// sent or the writer fails. An oversized `Deliver` payload is rejected
    /// before anything is written.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        write_fully(writer, &self.header()?)?;
        if let Frame::Deliver(data) = self {
            write_fully(writer, data)?;
        }
        Ok(())
    }
}

/// Incremental frame decoder that handles partial reads.
///
/// Used on the receiving side of a channel: feed whatever the socket
/// returned and collect every frame completed by it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the decoder and extract all complete frames.
    ///
    /// Incomplete data is buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown tag, a length prefix containing a
    /// `0xFF` digit, or a payload larger than the decoder accepts. The
    /// stream cannot be resynchronized after an error.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(&frame_tag) = self.buf.first() {
            match frame_tag {
                tag::NOTIFY => {
                    frames.push(Frame::Notify);
                    self.buf.drain(..1);
                }
                tag::PROBE => {
                    frames.push(Frame::Probe);
                    self.buf.drain(..1);
                }
                tag::DELIVER => {
                    let header_len = 1 + LENGTH_PREFIX_LEN;
                    if self.buf.len() < header_len {
                        break;
                    }
                    let mut digits = [0u8; LENGTH_PREFIX_LEN];
                    digits.copy_from_slice(&self.buf[1..header_len]);
                    if digits.contains(&0xFF) {
                        bail!("Malformed length prefix: {digits:02x?}");
                    }
                    let length = decode_length_prefix(digits);
                    if length > MAX_DECODED_PAYLOAD {
                        bail!("Deliver frame too large: {length} bytes (max {MAX_DECODED_PAYLOAD})");
                    }
                    let total = header_len + length as usize;
                    if self.buf.len() < total {
                        break;
                    }
                    frames.push(Frame::Deliver(self.buf[header_len..total].to_vec()));
                    self.buf.drain(..total);
                }
                other => bail!("Unknown frame tag: 0x{other:02x}"),
            }
        }

        Ok(frames)
    }

    /// Returns true if the decoder has buffered partial data.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}
