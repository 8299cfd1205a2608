//! Low-level byte codecs and whole-buffer I/O shared by every other module.
//!
//! Each read/write function moves exactly the bytes it promises or returns
//! an error - there is no partial-transfer ambiguity.

use std::io::{Read, Write};

use crate::{Error, Result};

/// Encode `v` as big-endian into `buf[0..4]`.
pub fn u32_be_encode(v: u32, buf: &mut [u8]) {
    buf[..4].copy_from_slice(&v.to_be_bytes());
}

/// Decode a big-endian `u32` from `buf[0..4]`.
pub fn u32_be_decode(buf: &[u8]) -> u32 {
    u32::from_be_bytes(buf[..4].try_into().unwrap())
}

/// Read exactly `n` bytes from `src`, looping over short reads.
///
/// Returns the accumulated bytes on success. Per the accumulated-count
/// resolution of the original implementation's ambiguous `readall`, a read
/// that returns `Ok(0)` before `n` bytes have been collected is a short
/// read, reported as [`Error::ShortRead`] rather than as a partial success.
pub fn read_full<R: Read + ?Sized>(src: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let got = src.read(&mut buf[filled..])?;
        if got == 0 {
            return Err(Error::ShortRead);
        }
        filled += got;
    }
    Ok(buf)
}

/// Write all of `bytes` to `dst`, looping over short writes.
pub fn write_full<W: Write + ?Sized>(dst: &mut W, bytes: &[u8]) -> Result<()> {
    dst.write_all(bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn u32_be_round_trips() {
        let mut buf = [0u8; 4];
        u32_be_encode(0xDEAD_BEEF, &mut buf);
        assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(u32_be_decode(&buf), 0xDEAD_BEEF);
    }

    #[test]
    fn read_full_collects_short_reads() {
        struct Dribble(Vec<u8>);
        impl Read for Dribble {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = 1.min(buf.len()).min(self.0.len());
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0.drain(..n);
                Ok(n)
            }
        }
        let mut src = Dribble(vec![1, 2, 3, 4, 5]);
        let got = read_full(&mut src, 5).unwrap();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn read_full_short_is_an_error() {
        let mut src = Cursor::new(vec![1, 2, 3]);
        assert!(matches!(read_full(&mut src, 5), Err(Error::ShortRead)));
    }

    #[test]
    fn write_full_writes_everything() {
        let mut dst = Cursor::new(Vec::new());
        write_full(&mut dst, b"hello").unwrap();
        assert_eq!(dst.into_inner(), b"hello");
    }
}
