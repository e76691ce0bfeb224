//! Command lines read from a local named pipe.
//!
//! The photobooth writes one command per line into a FIFO: `+` when a photo
//! was taken, or the path of the finished photo. Every line read is
//! published into the [`Mailbox`]; the reader never blocks on the consumer.
//!
//! The FIFO is opened read-only and then once more write-only. Holding that
//! extra write handle means the reader never sees EOF when a producer closes
//! its end, so short-lived writers (`echo + > fifo`) do not force a reopen.

// Rust guideline compliant 2026-02

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};

use crate::constants::{FIFO_RETRY_DELAY, MAX_COMMAND_LEN};
use crate::mailbox::Mailbox;

/// Outcome of reading one line from the command source.
#[derive(Debug)]
pub enum ReadLine {
    /// A complete line, without its newline, truncated to [`MAX_COMMAND_LEN`] bytes.
    ///
    /// Kept as raw bytes: a photo path is whatever the file system accepts.
    Line(Vec<u8>),
    /// The writer side closed and nothing was pending.
    EndOfInput,
    /// The read failed; trying again may succeed.
    TransientError(io::Error),
}

/// Create the FIFO at `path` with owner read/write permissions.
///
/// An existing FIFO is reused. Any other existing file is an error.
pub fn create_fifo(path: &Path) -> Result<()> {
    log::info!("Creating named pipe {} for accepting commands", path.display());

    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("FIFO path contains a NUL byte: {}", path.display()))?;
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), libc::S_IRUSR | libc::S_IWUSR) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.kind() != io::ErrorKind::AlreadyExists {
        return Err(err).with_context(|| format!("Failed to create FIFO {}", path.display()));
    }

    let file_type = std::fs::metadata(path)
        .with_context(|| format!("Failed to inspect {}", path.display()))?
        .file_type();
    if !file_type.is_fifo() {
        bail!("{} exists and is not a FIFO", path.display());
    }
    log::debug!("Reusing existing FIFO {}", path.display());
    Ok(())
}

/// Read one newline-terminated line from `reader`.
///
/// The newline is not stored. Bytes past [`MAX_COMMAND_LEN`] are discarded
/// up to the end of the line. A final line without a newline is returned
/// as-is; EOF with nothing buffered is [`ReadLine::EndOfInput`].
pub fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> ReadLine {
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) if buf.is_empty() => return ReadLine::EndOfInput,
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return ReadLine::TransientError(e),
        }
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    buf.truncate(MAX_COMMAND_LEN);
    ReadLine::Line(buf)
}

/// Reader over the command FIFO that reopens it after EOF.
#[derive(Debug)]
pub struct FifoSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    /// Extra write handle that keeps the FIFO from reporting EOF.
    keepalive: Option<File>,
}

impl FifoSource {
    /// Create a source for the FIFO at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            keepalive: None,
        }
    }

    /// Open the FIFO for reading, blocking until a writer appears.
    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open FIFO {}", self.path.display()))?;
        let keepalive = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open keep-alive handle on {}", self.path.display()))?;

        self.reader = Some(BufReader::new(file));
        self.keepalive = Some(keepalive);
        Ok(())
    }

    /// Read the next line, opening the FIFO first if needed.
    ///
    /// On EOF the FIFO is closed so the next call reopens it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the FIFO cannot be opened.
    pub fn next_line(&mut self) -> Result<ReadLine> {
        if self.reader.is_none() {
            self.open()?;
        }
        let reader = self.reader.as_mut().context("FIFO reader missing after open")?;

        let line = read_line(reader);
        if matches!(line, ReadLine::EndOfInput) {
            self.reader = None;
            self.keepalive = None;
        }
        Ok(line)
    }

    /// Publish every line read from the FIFO into `mailbox`, forever.
    ///
    /// # Errors
    ///
    /// Returns only if the FIFO cannot be (re)opened.
    pub fn run(mut self, mailbox: &Mailbox) -> Result<()> {
        loop {
            log::info!("Waiting for a command on the FIFO {}", self.path.display());
            match self.next_line()? {
                ReadLine::Line(line) => {
                    log::debug!("Received command {:?}", String::from_utf8_lossy(&line));
                    mailbox.publish(&line);
                }
                ReadLine::EndOfInput => {
                    log::warn!("Received EOF on the FIFO, reopening");
                }
                ReadLine::TransientError(e) => {
                    log::warn!("Error while reading from the FIFO: {e}. Trying again");
                    thread::sleep(FIFO_RETRY_DELAY);
                }
            }
        }
    }
}
