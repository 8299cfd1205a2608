//! AES-CBC sector cipher.
//!
//! Sectors are exactly 496 bytes - 31 AES blocks - so no padding is ever
//! applied; [`cipher::block_padding::NoPadding`] exists purely to satisfy
//! the RustCrypto API, it never actually pads anything here.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

use crate::image::{IV_LENGTH, SECTOR_LENGTH};
use crate::{Error, Result};

/// Encrypt a 496-byte plaintext sector under `key` and `iv`.
///
/// `key` must be 16, 24, or 32 bytes. `iv` is read, not mutated - the
/// caller may read it again afterward.
pub fn encrypt_sector(key: &[u8], iv: &[u8; IV_LENGTH], plaintext: &[u8; SECTOR_LENGTH]) -> Result<[u8; SECTOR_LENGTH]> {
    let mut buf = *plaintext;
    match key.len() {
        16 => {
            let mut enc = cbc::Encryptor::<Aes128>::new(key.into(), iv.into());
            enc.encrypt_padded_mut::<NoPadding>(&mut buf, SECTOR_LENGTH)
                .map_err(|_| Error::Cipher("encrypt_padded_mut failed"))?;
        }
        24 => {
            let mut enc = cbc::Encryptor::<Aes192>::new(key.into(), iv.into());
            enc.encrypt_padded_mut::<NoPadding>(&mut buf, SECTOR_LENGTH)
                .map_err(|_| Error::Cipher("encrypt_padded_mut failed"))?;
        }
        32 => {
            let mut enc = cbc::Encryptor::<Aes256>::new(key.into(), iv.into());
            enc.encrypt_padded_mut::<NoPadding>(&mut buf, SECTOR_LENGTH)
                .map_err(|_| Error::Cipher("encrypt_padded_mut failed"))?;
        }
        _ => return Err(Error::Cipher("key length must be 16, 24, or 32 bytes")),
    }
    Ok(buf)
}

/// Decrypt a 496-byte ciphertext sector under `key` and `iv`.
pub fn decrypt_sector(key: &[u8], iv: &[u8; IV_LENGTH], ciphertext: &[u8; SECTOR_LENGTH]) -> Result<[u8; SECTOR_LENGTH]> {
    let mut buf = *ciphertext;
    match key.len() {
        16 => {
            let dec = cbc::Decryptor::<Aes128>::new(key.into(), iv.into());
            dec.decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::Cipher("decrypt_padded_mut failed"))?;
        }
        24 => {
            let dec = cbc::Decryptor::<Aes192>::new(key.into(), iv.into());
            dec.decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::Cipher("decrypt_padded_mut failed"))?;
        }
        32 => {
            let dec = cbc::Decryptor::<Aes256>::new(key.into(), iv.into());
            dec.decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::Cipher("decrypt_padded_mut failed"))?;
        }
        _ => return Err(Error::Cipher("key length must be 16, 24, or 32 bytes")),
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_key_length() {
        let iv = [0u8; IV_LENGTH];
        let pt = [0u8; SECTOR_LENGTH];
        assert!(matches!(encrypt_sector(&[0u8; 20], &iv, &pt), Err(Error::Cipher(_))));
    }

    #[test]
    fn round_trips_for_every_key_size() {
        for key_len in [16, 24, 32] {
            let key = vec![0x42u8; key_len];
            let iv = [0x11u8; IV_LENGTH];
            let mut pt = [0u8; SECTOR_LENGTH];
            for (i, b) in pt.iter_mut().enumerate() {
                *b = i as u8;
            }
            let ct = encrypt_sector(&key, &iv, &pt).unwrap();
            assert_ne!(ct.to_vec(), pt.to_vec());
            let back = decrypt_sector(&key, &iv, &ct).unwrap();
            assert_eq!(back, pt);
        }
    }

    #[test]
    fn iv_buffer_is_not_mutated() {
        let key = vec![0u8; 32];
        let iv = [0x55u8; IV_LENGTH];
        let iv_before = iv;
        let pt = [0u8; SECTOR_LENGTH];
        let _ = encrypt_sector(&key, &iv, &pt).unwrap();
        assert_eq!(iv, iv_before);
    }
}
