//! `mkonion`: create a new onion volume.
//!
//! Argument parsing uses a glued-flag convention (`-s1024`, `-ks4`, `-Ms1`,
//! `-Gs1`, `+s`, `-o<path>`) rather than a derive-style parser, since that
//! surface isn't expressible with one.

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use diskonion::builder::build_volume;
use diskonion::image::{BLOCK_LENGTH, KEY_LENGTH_HIGH};
use diskonion::rng::{EntropySource, FastRng, StrongRng};

enum SizeArg {
    Explicit(u64),
    FromExistingFile,
}

fn parse_args(args: &[String]) -> Result<(Option<SizeArg>, Option<String>), String> {
    let mut size = None;
    let mut outfile = None;
    for arg in args {
        if let Some(rest) = arg.strip_prefix("-ks") {
            let kib: u64 = rest.parse().map_err(|_| format!("Bad -ks, `{rest}' not numeric"))?;
            size = Some(SizeArg::Explicit(kib << 10));
        } else if let Some(rest) = arg.strip_prefix("-Ms") {
            let mib: u64 = rest.parse().map_err(|_| format!("Bad -Ms, `{rest}' not numeric"))?;
            size = Some(SizeArg::Explicit(mib << 20));
        } else if let Some(rest) = arg.strip_prefix("-Gs") {
            let gib: u64 = rest.parse().map_err(|_| format!("Bad -Gs, `{rest}' not numeric"))?;
            size = Some(SizeArg::Explicit(gib << 30));
        } else if let Some(rest) = arg.strip_prefix("-s") {
            let bytes: u64 = rest.parse().map_err(|_| format!("Bad -s, `{rest}' not numeric"))?;
            size = Some(SizeArg::Explicit(bytes));
        } else if arg == "+s" {
            size = Some(SizeArg::FromExistingFile);
        } else if let Some(rest) = arg.strip_prefix("-o") {
            outfile = Some(rest.to_string());
        }
    }
    Ok((size, outfile))
}

fn read_passphrase() -> io::Result<[u8; KEY_LENGTH_HIGH]> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let bytes = line.trim_end_matches(['\n', '\r']).as_bytes();
    let mut out = [0u8; KEY_LENGTH_HIGH];
    let n = bytes.len().min(KEY_LENGTH_HIGH);
    out[..n].copy_from_slice(&bytes[..n]);
    Ok(out)
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (size, outfile) = parse_args(&args)?;
    let outfile = outfile.ok_or_else(|| "Must supply -o<outfile>".to_string())?;

    let existing_size = std::fs::metadata(&outfile).ok().map(|m| m.len());
    let file_size = match (size, existing_size) {
        (Some(SizeArg::Explicit(sz)), Some(existing)) if sz != existing => {
            return Err(format!("Size mismatch; volume is {existing} bytes"));
        }
        (Some(SizeArg::Explicit(sz)), _) => sz,
        (Some(SizeArg::FromExistingFile), Some(existing)) | (None, Some(existing)) => existing,
        (Some(SizeArg::FromExistingFile), None) | (None, None) => {
            return Err("Failed to stat outfile and no size was given".to_string());
        }
    };

    eprintln!("Image size is {file_size} bytes");
    if file_size % BLOCK_LENGTH as u64 != 0 {
        return Err(format!("Error - image size not a multiple of BLOCK_LENGTH {BLOCK_LENGTH}"));
    }
    eprintln!("Image has {} blocks", file_size / BLOCK_LENGTH as u64 - 1);

    eprintln!(
        "Enter your layer master passphrase (at most {KEY_LENGTH_HIGH} bytes will be used)"
    );
    let passphrase = read_passphrase().map_err(|e| format!("Failed to read passphrase: {e}"))?;

    let mut out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&outfile)
        .map_err(|e| format!("Failed to open outfile: {e}"))?;

    eprintln!("Generating sector key, you may need to supply some entropy to the system");
    let mut strong = StrongRng::open().map_err(|e| format!("Failed to open strong RNG: {e}"))?;
    let mut fast = FastRng::open().map_err(|e| format!("Failed to open fast RNG: {e}"))?;

    eprintln!("Writing sector blocks");
    build_volume(&mut out, file_size, &passphrase, &mut strong, &mut fast, |blk| {
        eprint!(".");
        let _ = io::stderr().flush();
        let _ = blk;
    })
    .map_err(|e| format!("{e}"))?;

    eprintln!("\nFinished creating the image, all OK");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
