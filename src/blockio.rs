//! Block-walk read/write logic shared by `/data` and `/keystream`.
//!
//! These functions operate on a plain `&mut [u8]` standing in for the
//! mapped image, so they can be unit-tested without mmap or a live FUSE
//! mount. [`crate::server`] drives them against the mmap'd region under the
//! image lock.
//!
//! Each walk handles a leading partial block, any number of full middle
//! blocks, and a trailing partial block, so a request can start and end at
//! arbitrary byte offsets without touching bytes outside the requested
//! range.

use crate::cipher::{decrypt_sector, encrypt_sector};
use crate::image::{BLOCK_LENGTH, Header, IV_LENGTH, SECTOR_LENGTH};
use crate::ivcodec::{self, KS_BLKLEN};
use crate::keyderiv::derive_key;
use crate::rng::EntropySource;
use crate::Result;

/// Byte offset of data block `blk` (0-indexed, excluding the header block)
/// within the full image.
fn block_offset(blk: u64) -> usize {
    (blk as usize + 1) * BLOCK_LENGTH
}

fn read_iv(image: &[u8], blk: u64) -> [u8; IV_LENGTH] {
    let off = block_offset(blk);
    image[off..off + IV_LENGTH].try_into().unwrap()
}

fn read_ciphertext(image: &[u8], blk: u64) -> [u8; SECTOR_LENGTH] {
    let off = block_offset(blk) + IV_LENGTH;
    image[off..off + SECTOR_LENGTH].try_into().unwrap()
}

fn write_block(image: &mut [u8], blk: u64, iv: &[u8; IV_LENGTH], ciphertext: &[u8; SECTOR_LENGTH]) {
    let off = block_offset(blk);
    image[off..off + IV_LENGTH].copy_from_slice(iv);
    image[off + IV_LENGTH..off + BLOCK_LENGTH].copy_from_slice(ciphertext);
}

/// Read up to `out.len()` plaintext bytes from the `/data` view starting at
/// `offset`. Returns the number of bytes actually copied (short of
/// `out.len()` at end of volume).
pub fn read_data(image: &[u8], header: &Header, nblk: u64, offset: u64, out: &mut [u8]) -> Result<usize> {
    let mut copied = 0;
    let mut cursor = offset;
    while copied < out.len() {
        let blk = cursor / SECTOR_LENGTH as u64;
        if blk >= nblk {
            break;
        }
        let in_off = (cursor % SECTOR_LENGTH as u64) as usize;
        let take = (out.len() - copied).min(SECTOR_LENGTH - in_off);

        let key = derive_key(&header.blob, header.key_size, header.stride, blk)?;
        let iv = read_iv(image, blk);
        let ciphertext = read_ciphertext(image, blk);
        let plaintext = decrypt_sector(&key, &iv, &ciphertext)?;
        out[copied..copied + take].copy_from_slice(&plaintext[in_off..in_off + take]);

        copied += take;
        cursor += take as u64;
    }
    Ok(copied)
}

/// Write `buf` into the `/data` view starting at `offset`, re-randomizing
/// the IV of every touched block without altering its keystream slot.
/// Returns the number of bytes actually written (short at end of volume).
pub fn write_data(
    image: &mut [u8],
    header: &Header,
    nblk: u64,
    offset: u64,
    buf: &[u8],
    fast: &mut impl EntropySource,
) -> Result<usize> {
    let mut written = 0;
    let mut cursor = offset;
    while written < buf.len() {
        let blk = cursor / SECTOR_LENGTH as u64;
        if blk >= nblk {
            break;
        }
        let in_off = (cursor % SECTOR_LENGTH as u64) as usize;
        let take = (buf.len() - written).min(SECTOR_LENGTH - in_off);
        let full_sector = in_off == 0 && take == SECTOR_LENGTH;

        let key = derive_key(&header.blob, header.key_size, header.stride, blk)?;
        let iv = read_iv(image, blk);

        let mut sector = [0u8; SECTOR_LENGTH];
        if !full_sector {
            let ciphertext = read_ciphertext(image, blk);
            sector = decrypt_sector(&key, &iv, &ciphertext)?;
        }
        sector[in_off..in_off + take].copy_from_slice(&buf[written..written + take]);

        let mut h = [0u8; KS_BLKLEN];
        fast.fill(&mut h)?;
        let new_iv = ivcodec::rerandomize(&iv, &h);
        let ciphertext = encrypt_sector(&key, &new_iv, &sector)?;
        write_block(image, blk, &new_iv, &ciphertext);

        written += take;
        cursor += take as u64;
    }
    Ok(written)
}

/// Read up to `out.len()` keystream bytes starting at `offset`.
pub fn read_keystream(image: &[u8], nblk: u64, offset: u64, out: &mut [u8]) -> Result<usize> {
    let mut copied = 0;
    let mut cursor = offset;
    while copied < out.len() {
        let blk = cursor / KS_BLKLEN as u64;
        if blk >= nblk {
            break;
        }
        let in_off = (cursor % KS_BLKLEN as u64) as usize;
        let take = (out.len() - copied).min(KS_BLKLEN - in_off);

        let iv = read_iv(image, blk);
        let ks = ivcodec::decode(&iv);
        out[copied..copied + take].copy_from_slice(&ks[in_off..in_off + take]);

        copied += take;
        cursor += take as u64;
    }
    Ok(copied)
}

/// Write `buf` into the `/keystream` view starting at `offset`. The
/// underlying sector plaintext is preserved; only the IV (hence the
/// keystream slot it encodes) changes.
pub fn write_keystream(
    image: &mut [u8],
    header: &Header,
    nblk: u64,
    offset: u64,
    buf: &[u8],
    fast: &mut impl EntropySource,
) -> Result<usize> {
    let mut written = 0;
    let mut cursor = offset;
    while written < buf.len() {
        let blk = cursor / KS_BLKLEN as u64;
        if blk >= nblk {
            break;
        }
        let in_off = (cursor % KS_BLKLEN as u64) as usize;
        let take = (buf.len() - written).min(KS_BLKLEN - in_off);

        let key = derive_key(&header.blob, header.key_size, header.stride, blk)?;
        let iv = read_iv(image, blk);
        let ciphertext = read_ciphertext(image, blk);
        let sector = decrypt_sector(&key, &iv, &ciphertext)?;

        let mut ks = ivcodec::decode(&iv);
        ks[in_off..in_off + take].copy_from_slice(&buf[written..written + take]);

        let mut r = [0u8; KS_BLKLEN];
        fast.fill(&mut r)?;
        let new_iv = ivcodec::encode(&ks, &r);
        let new_ciphertext = encrypt_sector(&key, &new_iv, &sector)?;
        write_block(image, blk, &new_iv, &new_ciphertext);

        written += take;
        cursor += take as u64;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_volume;
    use crate::image::{Header, pad_passphrase};
    use crate::rng::FastRng;
    use std::io::Cursor;

    fn fresh_image(nblk: u64) -> (Vec<u8>, Header) {
        let mut out = Cursor::new(Vec::new());
        let mut strong = FastRng::open().unwrap();
        let mut fast = FastRng::open().unwrap();
        let size = 512 * (nblk + 1);
        build_volume(&mut out, size, b"s3cret", &mut strong, &mut fast, |_| {}).unwrap();
        let bytes = out.into_inner();
        let passphrase = pad_passphrase(b"s3cret");
        let iv: [u8; IV_LENGTH] = bytes[..IV_LENGTH].try_into().unwrap();
        let ct: [u8; SECTOR_LENGTH] = bytes[IV_LENGTH..BLOCK_LENGTH].try_into().unwrap();
        let header = Header::decrypt(&passphrase, &iv, &ct).unwrap();
        (bytes, header)
    }

    #[test]
    fn fresh_data_view_is_all_zero() {
        let (image, header) = fresh_image(5);
        let mut out = vec![0xFFu8; SECTOR_LENGTH];
        let n = read_data(&image, &header, 5, 0, &mut out).unwrap();
        assert_eq!(n, SECTOR_LENGTH);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn data_write_then_read_back() {
        let (mut image, header) = fresh_image(5);
        let mut fast = FastRng::open().unwrap();
        let payload: Vec<u8> = (0..SECTOR_LENGTH as u32).map(|i| i as u8).collect();
        write_data(&mut image, &header, 5, 0, &payload, &mut fast).unwrap();
        let mut out = vec![0u8; SECTOR_LENGTH];
        read_data(&image, &header, 5, 0, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn partial_data_write_leaves_surroundings_untouched() {
        let (mut image, header) = fresh_image(3);
        let mut fast = FastRng::open().unwrap();
        write_data(&mut image, &header, 3, 100, &vec![0xAAu8; 50], &mut fast).unwrap();
        let mut out = vec![0u8; SECTOR_LENGTH];
        read_data(&image, &header, 3, 0, &mut out).unwrap();
        assert!(out[0..100].iter().all(|&b| b == 0));
        assert!(out[100..150].iter().all(|&b| b == 0xAA));
        assert!(out[150..SECTOR_LENGTH].iter().all(|&b| b == 0));
    }

    #[test]
    fn data_write_preserves_keystream() {
        let (mut image, header) = fresh_image(5);
        let mut fast = FastRng::open().unwrap();
        let mut before = vec![0u8; KS_BLKLEN];
        read_keystream(&image, 5, 0, &mut before).unwrap();

        write_data(&mut image, &header, 5, 0, &vec![0x5Au8; SECTOR_LENGTH], &mut fast).unwrap();

        let mut after = vec![0u8; KS_BLKLEN];
        read_keystream(&image, 5, 0, &mut after).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn keystream_write_preserves_data() {
        let (mut image, header) = fresh_image(5);
        let mut fast = FastRng::open().unwrap();
        let mut before = vec![0u8; SECTOR_LENGTH];
        read_data(&image, &header, 5, 0, &mut before).unwrap();

        write_keystream(&mut image, &header, 5, 0, &[0x11u8; KS_BLKLEN], &mut fast).unwrap();

        let mut after = vec![0u8; SECTOR_LENGTH];
        read_data(&image, &header, 5, 0, &mut after).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn keystream_read_after_write() {
        let (mut image, header) = fresh_image(5);
        let mut fast = FastRng::open().unwrap();
        let payload = [0x77u8; KS_BLKLEN];
        write_keystream(&mut image, &header, 5, 0, &payload, &mut fast).unwrap();
        let mut out = [0u8; KS_BLKLEN];
        read_keystream(&image, 5, 0, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn reads_short_at_end_of_volume() {
        let (image, header) = fresh_image(1);
        let mut out = vec![0u8; SECTOR_LENGTH * 2];
        let n = read_data(&image, &header, 1, 0, &mut out).unwrap();
        assert_eq!(n, SECTOR_LENGTH);
    }
}
