//! Crate-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout diskonion.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the crate can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// A CLI argument, size, or existing-file check failed before any image
    /// bytes were touched.
    Configuration(String),
    /// An RNG source hit EOF or an I/O error before delivering the requested
    /// bytes.
    Entropy(io::Error),
    /// The cipher rejected a key length or other parameter.
    Cipher(&'static str),
    /// The header sector failed to validate after decryption - either a
    /// wrong passphrase or a corrupt image. Indistinguishable by design.
    HeaderValidation,
    /// The image is already locked by another mount.
    LockHeld,
    /// A read stopped short of the requested byte count.
    ShortRead,
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(s) => write!(f, "configuration error: {s}"),
            Error::Entropy(e) => write!(f, "entropy source failed: {e}"),
            Error::Cipher(s) => write!(f, "cipher error: {s}"),
            Error::HeaderValidation => {
                write!(f, "header validation failed (wrong passphrase or corrupt image)")
            }
            Error::LockHeld => write!(f, "image is locked by another process"),
            Error::ShortRead => {
                write!(f, "short read: source ended before the requested bytes were available")
            }
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Entropy(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
