//! On-disk block layout and header sector.

use crate::cipher::{decrypt_sector, encrypt_sector};
use crate::keyderiv::gcd;
use crate::{Error, Result};

/// Bytes per on-disk block: one IV followed by one encrypted sector.
pub const BLOCK_LENGTH: usize = 512;
/// AES block size, also the IV length.
pub const IV_LENGTH: usize = 16;
/// Bytes of plaintext/ciphertext payload per block.
pub const SECTOR_LENGTH: usize = BLOCK_LENGTH - IV_LENGTH;

/// Passphrase/sector-key length the header itself is always encrypted
/// under, and the default per-block key length.
pub const KEY_LENGTH_HIGH: usize = 32;
/// Default sector-key blob length (`SECTOR_LENGTH - 16`).
pub const SECTOR_KEY_LENGTH: usize = SECTOR_LENGTH - 16;
/// Default sector-key stride; coprime to [`SECTOR_KEY_LENGTH`].
pub const SECTOR_KEY_STRIDE: u64 = 13;

const LEN_OFFSET: usize = 0x00;
const KEY_LEN_OFFSET: usize = 0x04;
const BLOB_LEN_OFFSET: usize = 0x08;
const STRIDE_OFFSET: usize = 0x0C;
const BLOB_OFFSET: usize = 0x10;

/// The decrypted header sector: per-block key parameters plus the
/// sector-key blob they derive keys from.
#[derive(Debug, Clone)]
pub struct Header {
    /// AES key length (bytes) used for both the header and every data block.
    pub key_size: usize,
    /// Stride used to walk the sector-key blob.
    pub stride: u64,
    /// The sector-key blob itself.
    pub blob: Vec<u8>,
}

impl Header {
    /// Build a header plaintext from its fields and write it into a
    /// `SECTOR_LENGTH`-byte buffer (the remainder is left as supplied,
    /// callers fill it with random padding before encrypting).
    pub fn to_plaintext(&self, padding: &[u8]) -> Result<[u8; SECTOR_LENGTH]> {
        if self.blob.len() as u64 <= self.key_size as u64 {
            return Err(Error::Configuration(
                "sector-key blob length must exceed the key length".into(),
            ));
        }
        if gcd(self.stride, self.blob.len() as u64) != 1 {
            return Err(Error::Configuration(
                "sector-key stride must be coprime to the blob length".into(),
            ));
        }
        if BLOB_OFFSET + self.blob.len() > SECTOR_LENGTH {
            return Err(Error::Configuration("sector-key blob does not fit in the header sector".into()));
        }
        let mut buf = [0u8; SECTOR_LENGTH];
        crate::bytes::u32_be_encode(BLOCK_LENGTH as u32, &mut buf[LEN_OFFSET..]);
        crate::bytes::u32_be_encode(self.key_size as u32, &mut buf[KEY_LEN_OFFSET..]);
        crate::bytes::u32_be_encode(self.blob.len() as u32, &mut buf[BLOB_LEN_OFFSET..]);
        crate::bytes::u32_be_encode(self.stride as u32, &mut buf[STRIDE_OFFSET..]);
        buf[BLOB_OFFSET..BLOB_OFFSET + self.blob.len()].copy_from_slice(&self.blob);
        let tail = BLOB_OFFSET + self.blob.len();
        let pad_len = (SECTOR_LENGTH - tail).min(padding.len());
        buf[tail..tail + pad_len].copy_from_slice(&padding[..pad_len]);
        Ok(buf)
    }

    /// Parse and validate a decrypted header plaintext.
    ///
    /// A declared block length other than [`BLOCK_LENGTH`] is, per the
    /// scheme's design, indistinguishable from a wrong passphrase - both
    /// surface as [`Error::HeaderValidation`].
    pub fn from_plaintext(buf: &[u8; SECTOR_LENGTH]) -> Result<Self> {
        let declared_len = crate::bytes::u32_be_decode(&buf[LEN_OFFSET..]);
        if declared_len as usize != BLOCK_LENGTH {
            return Err(Error::HeaderValidation);
        }
        let key_size = crate::bytes::u32_be_decode(&buf[KEY_LEN_OFFSET..]) as usize;
        if !matches!(key_size, 16 | 24 | 32) {
            return Err(Error::HeaderValidation);
        }
        let blob_len = crate::bytes::u32_be_decode(&buf[BLOB_LEN_OFFSET..]) as usize;
        let stride = crate::bytes::u32_be_decode(&buf[STRIDE_OFFSET..]) as u64;
        if blob_len <= key_size || BLOB_OFFSET + blob_len > SECTOR_LENGTH {
            return Err(Error::HeaderValidation);
        }
        if gcd(stride, blob_len as u64) != 1 {
            return Err(Error::HeaderValidation);
        }
        let blob = buf[BLOB_OFFSET..BLOB_OFFSET + blob_len].to_vec();
        Ok(Header { key_size, stride, blob })
    }

    /// Encrypt this header under `passphrase` (truncated/zero-padded to
    /// [`KEY_LENGTH_HIGH`] bytes) and a given IV, producing the ciphertext
    /// half of block 0.
    pub fn encrypt(&self, passphrase: &[u8; KEY_LENGTH_HIGH], iv: &[u8; IV_LENGTH], padding: &[u8]) -> Result<[u8; SECTOR_LENGTH]> {
        let plaintext = self.to_plaintext(padding)?;
        encrypt_sector(passphrase, iv, &plaintext)
    }

    /// Decrypt and validate block 0's ciphertext under `passphrase`.
    pub fn decrypt(passphrase: &[u8; KEY_LENGTH_HIGH], iv: &[u8; IV_LENGTH], ciphertext: &[u8; SECTOR_LENGTH]) -> Result<Self> {
        let plaintext = decrypt_sector(passphrase, iv, ciphertext).map_err(|_| Error::HeaderValidation)?;
        Self::from_plaintext(&plaintext)
    }
}

/// Truncate/zero-pad `passphrase` to exactly [`KEY_LENGTH_HIGH`] bytes; the
/// passphrase is used directly as the header's AES key, not stretched
/// through a KDF.
pub fn pad_passphrase(passphrase: &[u8]) -> [u8; KEY_LENGTH_HIGH] {
    let mut out = [0u8; KEY_LENGTH_HIGH];
    let n = passphrase.len().min(KEY_LENGTH_HIGH);
    out[..n].copy_from_slice(&passphrase[..n]);
    out
}

/// Number of data blocks for an image of `file_size` bytes, validating that
/// the size is a positive multiple of [`BLOCK_LENGTH`] holding at least a
/// header block and one data block.
pub fn nblk_for_size(file_size: u64) -> Result<u64> {
    if file_size == 0 || file_size % BLOCK_LENGTH as u64 != 0 {
        return Err(Error::Configuration(format!(
            "image size {file_size} is not a positive multiple of {BLOCK_LENGTH}"
        )));
    }
    let total_blocks = file_size / BLOCK_LENGTH as u64;
    if total_blocks < 2 {
        return Err(Error::Configuration(
            "image must hold at least a header block and one data block".into(),
        ));
    }
    Ok(total_blocks - 1)
}
