//! Per-block key derivation by stride-walking a sector-key blob.
//!
//! Given a blob `B` of length `L`, a desired key length `k <= L`, a stride
//! `s` coprime to `L`, and a block index `i`, the starting offset
//! `R = (s * (i mod L)) mod L` is distinct for every `i mod L` (because
//! `gcd(s, L) = 1`), so `L` distinct keys are produced before the
//! derivation cycles.

use crate::{Error, Result};

/// Greatest common divisor, used to validate `stride` against `blob_len`.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Derive the `key_len`-byte key for block `index` from `blob`.
///
/// `blob` must be non-empty and `key_len <= blob.len()`; callers are
/// expected to have validated `gcd(stride, blob.len()) == 1` once, at
/// header-construction or mount time (see `image::Header`), rather than on
/// every call.
pub fn derive_key(blob: &[u8], key_len: usize, stride: u64, index: u64) -> Result<Vec<u8>> {
    let len = blob.len() as u64;
    if len == 0 {
        return Err(Error::Configuration("sector-key blob must not be empty".into()));
    }
    if key_len as u64 > len {
        return Err(Error::Configuration(
            "key length must not exceed the sector-key blob length".into(),
        ));
    }
    let r = (stride.wrapping_mul(index % len)) % len;
    let mut key = Vec::with_capacity(key_len);
    for j in 0..key_len as u64 {
        key.push(blob[((r + j) % len) as usize]);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn deterministic() {
        let b = blob(480);
        let k1 = derive_key(&b, 32, 13, 7).unwrap();
        let k2 = derive_key(&b, 32, 13, 7).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn cyclic_over_blob_length() {
        let b = blob(480);
        let k1 = derive_key(&b, 32, 13, 7).unwrap();
        let k2 = derive_key(&b, 32, 13, 7 + 480).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn distinct_offsets_when_coprime() {
        let len = 480u64;
        let stride = 13u64;
        assert_eq!(gcd(stride, len), 1);
        let mut seen = std::collections::HashSet::new();
        for i in 0..len {
            let r = (stride * (i % len)) % len;
            seen.insert(r);
        }
        assert_eq!(seen.len(), len as usize);
    }

    #[test]
    fn rejects_key_longer_than_blob() {
        let b = blob(8);
        assert!(derive_key(&b, 32, 3, 0).is_err());
    }
}
