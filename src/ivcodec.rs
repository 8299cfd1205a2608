//! IV/keystream codec.
//!
//! An IV is a 16-byte random string that doubles as the ciphertext carrier
//! for an 8-byte keystream slot. `decode` recovers the slot; `encode`
//! produces a fresh IV carrying a given slot; `rerandomize` changes the IV
//! without changing the slot it decodes to.

use crate::image::IV_LENGTH;

/// Size of the keystream slot carried inside each IV.
pub const KS_BLKLEN: usize = IV_LENGTH / 2;

/// Recover the 8-byte keystream slot from a 16-byte IV.
///
/// `ks[i] = iv[2i] XOR iv[2i+1]`.
pub fn decode(iv: &[u8; IV_LENGTH]) -> [u8; KS_BLKLEN] {
    let mut ks = [0u8; KS_BLKLEN];
    for i in 0..KS_BLKLEN {
        ks[i] = iv[2 * i] ^ iv[2 * i + 1];
    }
    ks
}

/// Produce a fresh IV carrying `ks`, using `r` as fresh randomness.
///
/// `iv[2i] = ks[i] XOR r[i]`, `iv[2i+1] = r[i]`. For any `ks`, this is a
/// bijection from 8-byte `r` onto the 2^64 sixteen-byte strings that decode
/// to `ks`, so the resulting IV is uniform given `ks`.
pub fn encode(ks: &[u8; KS_BLKLEN], r: &[u8; KS_BLKLEN]) -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    for i in 0..KS_BLKLEN {
        iv[2 * i] = ks[i] ^ r[i];
        iv[2 * i + 1] = r[i];
    }
    iv
}

/// Replace `iv` with a new IV that decodes to the same keystream slot,
/// using fresh randomness `h`.
///
/// `(iv[2i], iv[2i+1]) <- (iv[2i] XOR h[i], iv[2i+1] XOR h[i])`; the
/// pairwise XOR `iv[2i] XOR iv[2i+1]` is invariant under this operation.
pub fn rerandomize(iv: &[u8; IV_LENGTH], h: &[u8; KS_BLKLEN]) -> [u8; IV_LENGTH] {
    let mut out = *iv;
    for i in 0..KS_BLKLEN {
        out[2 * i] ^= h[i];
        out[2 * i + 1] ^= h[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let ks = [1, 2, 3, 4, 5, 6, 7, 8];
        let r = [9, 10, 11, 12, 13, 14, 15, 16];
        let iv = encode(&ks, &r);
        assert_eq!(decode(&iv), ks);
    }

    #[test]
    fn re_encoding_after_decode_preserves_fold() {
        let iv = [0x3Au8; IV_LENGTH];
        let ks = decode(&iv);
        for seed in 0u8..=255 {
            let r = [seed; KS_BLKLEN];
            let re_iv = encode(&ks, &r);
            assert_eq!(decode(&re_iv), ks);
        }
    }

    #[test]
    fn rerandomize_preserves_decode_and_changes_iv_iff_h_nonzero() {
        let iv = [0x7Cu8; IV_LENGTH];
        let zero = [0u8; KS_BLKLEN];
        assert_eq!(rerandomize(&iv, &zero), iv);

        let h = [1, 0, 0, 0, 0, 0, 0, 0];
        let out = rerandomize(&iv, &h);
        assert_ne!(out, iv);
        assert_eq!(decode(&out), decode(&iv));
    }
}
