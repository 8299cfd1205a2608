//! `onionmount`: mount an onion image with FUSE, presenting `/data` and
//! `/keystream`.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use diskonion::image::KEY_LENGTH_HIGH;
use diskonion::rng::FastRng;
use diskonion::server::{MountState, OnionFs};

fn read_passphrase() -> io::Result<[u8; KEY_LENGTH_HIGH]> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let bytes = line.trim_end_matches(['\n', '\r']).as_bytes();
    let mut out = [0u8; KEY_LENGTH_HIGH];
    let n = bytes.len().min(KEY_LENGTH_HIGH);
    out[..n].copy_from_slice(&bytes[..n]);
    Ok(out)
}

fn run() -> Result<ExitCode, String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        return Err("Usage: onionmount <onion-image> <mountpoint> [options]".to_string());
    }
    let mountpoint = PathBuf::from(args.remove(1));
    let image = PathBuf::from(args.remove(0));
    let bridge_options = args;

    eprintln!("Enter the layer master passphrase");
    let passphrase = read_passphrase().map_err(|e| format!("Failed to read passphrase: {e}"))?;

    let state = MountState::open(&image, &passphrase).map_err(|e| {
        format!("onionmount: failed to open '{}': {e}", image.display())
    })?;
    log::info!("'{}' mmap()ed in", image.display());

    let fast = FastRng::open().map_err(|e| format!("Failed to open fast RNG: {e}"))?;
    let fs = OnionFs::new(state, fast);

    let mut options = vec![fuser::MountOption::FSName("diskonion".to_string())];
    options.extend(bridge_options.into_iter().map(fuser::MountOption::CUSTOM));

    fuser::mount2(fs, &mountpoint, &options).map_err(|e| format!("fuse session failed: {e}"))?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
