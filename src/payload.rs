//! Photo file loading for `Deliver` commands.
//!
//! Read failures are never fatal: the forwarder logs them and keeps the
//! session open, so a bad file name only costs the client one photo.

use std::io;
use std::path::{Path, PathBuf};

use crate::protocol::MAX_LENGTH_PREFIX;

/// Why a photo could not be loaded.
#[derive(Debug)]
pub enum PayloadError {
    /// No file at the given path.
    NotFound(PathBuf),
    /// The file exists but could not be read completely.
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file is larger than the length prefix can express.
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
    },
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, source } => write!(f, "could not read {}: {source}", path.display()),
            Self::TooLarge { path, size } => write!(
                f,
                "{} is {size} bytes, larger than the {MAX_LENGTH_PREFIX}-byte frame limit",
                path.display()
            ),
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) | Self::TooLarge { .. } => None,
        }
    }
}

/// Read the full contents of the photo at `path`.
pub fn read_file(path: &Path) -> Result<Vec<u8>, PayloadError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            PayloadError::NotFound(path.to_path_buf())
        } else {
            PayloadError::Io { path: path.to_path_buf(), source }
        }
    };

    // Checked again after the read: the file may grow in between
    check_size(path, std::fs::metadata(path).map_err(io_error)?.len())?;

    let data = std::fs::read(path).map_err(io_error)?;
    check_size(path, data.len() as u64)?;
    log::debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

fn check_size(path: &Path, size: u64) -> Result<(), PayloadError> {
    if size > u64::from(MAX_LENGTH_PREFIX) {
        return Err(PayloadError::TooLarge { path: path.to_path_buf(), size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_whole_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        std::fs::write(&path, b"ABCDE").unwrap();

        assert_eq!(read_file(&path).unwrap(), b"ABCDE");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing.jpg");

        match read_file(&path) {
            Err(PayloadError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_directory_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = read_file(tmp.path()).unwrap_err();
        assert!(matches!(err, PayloadError::Io { .. }), "got: {err:?}");
        assert!(err.to_string().contains("could not read"));
    }

    #[test]
    fn test_size_limit_matches_length_prefix() {
        let path = Path::new("/srv/photos/huge.jpg");
        assert!(check_size(path, u64::from(MAX_LENGTH_PREFIX)).is_ok());

        match check_size(path, u64::from(MAX_LENGTH_PREFIX) + 1) {
            Err(PayloadError::TooLarge { size, .. }) => {
                assert_eq!(size, u64::from(MAX_LENGTH_PREFIX) + 1);
            }
            other => panic!("Expected TooLarge, got: {other:?}"),
        }
    }
}
