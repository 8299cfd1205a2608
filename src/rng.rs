//! Entropy sources.
//!
//! Two kinds:
//!
//! * [`StrongRng`] reads `/dev/random` and is used once per volume, for the
//!   sector-key blob. It may block waiting for entropy; every 128 bytes
//!   collected it prints a `.` to stderr as progress feedback.
//! * [`FastRng`] reads `/dev/urandom` and never blocks; it is used for every
//!   per-block IV and IV re-randomization.
//!
//! Neither source may be replaced by a deterministic stream outside of
//! `#[cfg(test)]` builds, where [`FastRng`] stands in for both so the test
//! suite does not depend on `/dev/random`'s entropy pool.

use std::fs::File;
use std::io::{self, Read};

use crate::bytes::read_full;
use crate::{Error, Result};

/// A byte stream that can fill a buffer with fresh entropy or fail.
pub trait EntropySource {
    /// Fill `buf` completely with entropy, or return an error.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

const PROGRESS_INTERVAL: usize = 128;

/// Blocking strong entropy source, backed by `/dev/random`.
pub struct StrongRng(File);

impl StrongRng {
    /// Open `/dev/random`.
    pub fn open() -> Result<Self> {
        File::open("/dev/random")
            .map(Self)
            .map_err(Error::Entropy)
    }
}

impl EntropySource for StrongRng {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        let mut dots = 0;
        while filled < buf.len() {
            let got = self
                .0
                .read(&mut buf[filled..])
                .map_err(Error::Entropy)?;
            if got == 0 {
                return Err(Error::Entropy(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "/dev/random closed before delivering requested bytes",
                )));
            }
            filled += got;
            while filled > dots * PROGRESS_INTERVAL {
                eprint!(".");
                dots += 1;
            }
        }
        Ok(())
    }
}

/// Non-blocking entropy source, backed by `/dev/urandom`.
pub struct FastRng(File);

impl FastRng {
    /// Open `/dev/urandom`.
    pub fn open() -> Result<Self> {
        File::open("/dev/urandom")
            .map(Self)
            .map_err(Error::Entropy)
    }
}

impl EntropySource for FastRng {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let got = read_full(&mut self.0, buf.len()).map_err(|e| match e {
            Error::ShortRead => {
                Error::Entropy(io::Error::new(io::ErrorKind::UnexpectedEof, "/dev/urandom short read"))
            }
            Error::Io(e) => Error::Entropy(e),
            other => other,
        })?;
        buf.copy_from_slice(&got);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_rng_fills_and_varies() {
        let mut rng = FastRng::open().expect("/dev/urandom must exist on this platform");
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        rng.fill(&mut a).unwrap();
        rng.fill(&mut b).unwrap();
        assert_ne!(a, b, "two draws should not collide");
    }
}
