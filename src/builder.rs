//! Volume builder: writes a sealed header block followed by `nblk`
//! blank-but-indistinguishable data blocks.

use std::io::Write;

use crate::cipher::encrypt_sector;
use crate::image::{
    BLOCK_LENGTH, Header, IV_LENGTH, KEY_LENGTH_HIGH, SECTOR_KEY_LENGTH, SECTOR_KEY_STRIDE,
    SECTOR_LENGTH, nblk_for_size, pad_passphrase,
};
use crate::keyderiv::derive_key;
use crate::rng::EntropySource;
use crate::Result;

/// How often (in blocks) `build_volume` reports progress to the `progress`
/// callback.
const PROGRESS_INTERVAL: u64 = 1024;

/// Write a freshly sealed onion volume of `file_size` bytes to `out`.
///
/// `strong` supplies the sector-key blob; `fast` supplies every block IV.
/// `progress` is called once per [`PROGRESS_INTERVAL`] blocks written, for
/// callers that want to narrate build progress (e.g. stderr dots).
pub fn build_volume<W, S, F>(
    out: &mut W,
    file_size: u64,
    passphrase: &[u8],
    strong: &mut S,
    fast: &mut F,
    mut progress: impl FnMut(u64),
) -> Result<()>
where
    W: Write,
    S: EntropySource,
    F: EntropySource,
{
    let nblk = nblk_for_size(file_size)?;
    let passphrase = pad_passphrase(passphrase);

    let mut blob = vec![0u8; SECTOR_KEY_LENGTH];
    strong.fill(&mut blob)?;

    let header = Header {
        key_size: KEY_LENGTH_HIGH,
        stride: SECTOR_KEY_STRIDE,
        blob: blob.clone(),
    };
    let mut padding = vec![0u8; SECTOR_LENGTH];
    fast.fill(&mut padding)?;

    let mut iv = [0u8; IV_LENGTH];
    fast.fill(&mut iv)?;
    let ciphertext = header.encrypt(&passphrase, &iv, &padding)?;
    let mut block = [0u8; BLOCK_LENGTH];
    block[..IV_LENGTH].copy_from_slice(&iv);
    block[IV_LENGTH..].copy_from_slice(&ciphertext);
    out.write_all(&block)?;

    let blank = [0u8; SECTOR_LENGTH];
    for blk in 0..nblk {
        if blk % PROGRESS_INTERVAL == PROGRESS_INTERVAL - 1 {
            progress(blk + 1);
        }
        fast.fill(&mut iv)?;
        let key = derive_key(&blob, KEY_LENGTH_HIGH, SECTOR_KEY_STRIDE, blk)?;
        let ciphertext = encrypt_sector(&key, &iv, &blank)?;
        block[..IV_LENGTH].copy_from_slice(&iv);
        block[IV_LENGTH..].copy_from_slice(&ciphertext);
        out.write_all(&block)?;
    }
    Ok(())
}
