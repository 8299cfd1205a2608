//! **diskonion** - a layered, deniable block-level disk encryption scheme.
//!
//! One ciphertext image presents two independently writable plaintext
//! views through the mount server: `/data`, the encrypted payload, and
//! `/keystream`, a per-block secret folded into each block's IV. Writing
//! either view re-randomizes the affected blocks' IVs without disturbing
//! the other view, so the two are orthogonal but share one set of
//! ciphertext bytes on disk - the keystream of an outer volume can itself
//! hold the entire byte stream of an inner volume, with no way to tell the
//! inner volume exists without its own passphrase.
//!
//! # Modules
//! | Module | Role |
//! |--------|------|
//! | [`bytes`]    | big-endian field codec, exact-length read/write |
//! | [`rng`]      | blocking and non-blocking entropy sources |
//! | [`cipher`]   | AES-CBC sector encryption/decryption |
//! | [`keyderiv`] | per-block key derivation from the sector-key blob |
//! | [`ivcodec`]  | IV <-> keystream-slot codec |
//! | [`image`]    | on-disk block layout and header sector |
//! | [`builder`]  | volume construction, used by `mkonion` |
//! | [`blockio`]  | block-walk read/write logic shared by both views |
//! | [`server`]   | the FUSE filesystem, used by `onionmount` |

pub mod blockio;
pub mod builder;
pub mod bytes;
pub mod cipher;
pub mod error;
pub mod image;
pub mod ivcodec;
pub mod keyderiv;
pub mod rng;
pub mod server;

pub use error::{Error, Result};
