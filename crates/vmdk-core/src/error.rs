//! Error types for the vmdk-core library.

use std::path::PathBuf;

/// The main error type for vmdk-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// Header magic number did not match `VMDK_MAGIC`.
    #[error("bad VMDK magic: found 0x{found:08x}")]
    BadMagic { found: u32 },

    /// A footer search did not find a footer marker at the expected sector.
    #[error("cannot find footer at sector {sector}")]
    BadFooter { sector: u64 },

    /// Input below the minimum size required for the requested operation.
    #[error("file too small: need at least {needed} bytes, got {got}")]
    FileTooSmall { needed: u64, got: u64 },

    /// Stream-extract requested on an input lacking the streamOptimized descriptor marker.
    #[error("not a stream-optimized VMDK")]
    NotStreamOptimized,

    /// Stream-extract requested on a file with an unsupported compression algorithm.
    #[error("unsupported compression algorithm: 0x{algorithm:04x}")]
    UnsupportedCompression { algorithm: u16 },

    /// A grain's decoded marker failed an invariant (size, lba, or inflate mismatch).
    #[error("corrupt grain: {message}")]
    CorruptGrain { message: String },
}

/// A specialized Result type for vmdk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a corrupt-grain error.
    pub fn corrupt_grain(message: impl Into<String>) -> Self {
        Self::CorruptGrain {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io(io_err, "/path/to/file.vmdk");
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("/path/to/file.vmdk"));
    }

    #[test]
    fn test_io_error_without_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io_simple(io_err);
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(!msg.contains("at '"));
    }

    #[test]
    fn test_bad_magic_message() {
        let err = Error::BadMagic { found: 0xdead_beef };
        assert!(err.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { path: None, .. }));
    }
}
