//! The `onionmount` FUSE server: maps the image once and serves `/data` and
//! `/keystream` under one reader-writer lock.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen,
    ReplyWrite, Request, TimeOrNow,
};
use memmap2::{MmapMut, MmapOptions};

use crate::blockio;
use crate::image::{BLOCK_LENGTH, Header, IV_LENGTH, SECTOR_LENGTH, nblk_for_size, pad_passphrase};
use crate::ivcodec::KS_BLKLEN;
use crate::rng::FastRng;
use crate::{Error, Result};

const TTL: Duration = Duration::from_secs(1);

const ROOT_INO: u64 = 1;
const DATA_INO: u64 = 2;
const KEYSTREAM_INO: u64 = 3;

/// Everything the server needs for the lifetime of one mount: the mapped
/// image behind a single reader-writer lock, the immutable header
/// parameters recovered at mount start, and the uid/gid to report ownership
/// as.
pub struct MountState {
    image: RwLock<MmapMut>,
    header: Header,
    nblk: u64,
    uid: u32,
    gid: u32,
    /// Holds the image file open (and hence its advisory lock) for the
    /// mount's lifetime; released on drop.
    _locked_file: File,
}

impl MountState {
    /// Open `path`, take an exclusive non-blocking advisory lock, map it,
    /// and recover the header by decrypting block 0 with `passphrase`.
    pub fn open(path: &Path, passphrase: &[u8]) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            return Err(if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Error::LockHeld
            } else {
                Error::Io(err)
            });
        }

        let file_size = file.metadata()?.len();
        let nblk = nblk_for_size(file_size)?;

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        let passphrase = pad_passphrase(passphrase);
        let iv: [u8; IV_LENGTH] = mmap[..IV_LENGTH].try_into().unwrap();
        let ciphertext: [u8; SECTOR_LENGTH] = mmap[IV_LENGTH..BLOCK_LENGTH].try_into().unwrap();
        let header = Header::decrypt(&passphrase, &iv, &ciphertext)?;

        if nblk > header.blob.len() as u64 {
            log::warn!(
                "block count ({nblk}) exceeds the sector-key blob length ({}); per-block keys will cycle",
                header.blob.len()
            );
        }

        let uid = unsafe { libc::geteuid() };
        let gid = unsafe { libc::getegid() };

        Ok(MountState {
            image: RwLock::new(mmap),
            header,
            nblk,
            uid,
            gid,
            _locked_file: file,
        })
    }
}

fn dir_attr(state: &MountState) -> FileAttr {
    let now = SystemTime::now();
    FileAttr {
        ino: ROOT_INO,
        size: 0,
        blocks: 0,
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: FileType::Directory,
        perm: 0o700,
        nlink: 2,
        uid: state.uid,
        gid: state.gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

fn file_attr(state: &MountState, ino: u64) -> FileAttr {
    let now = SystemTime::now();
    let (size, blksize) = match ino {
        DATA_INO => (state.nblk * SECTOR_LENGTH as u64, SECTOR_LENGTH as u32),
        KEYSTREAM_INO => (state.nblk * KS_BLKLEN as u64, IV_LENGTH as u32),
        _ => unreachable!("file_attr called with non-file inode"),
    };
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: FileType::RegularFile,
        perm: 0o600,
        nlink: 1,
        uid: state.uid,
        gid: state.gid,
        rdev: 0,
        blksize,
        flags: 0,
    }
}

/// The `fuser::Filesystem` implementation. Methods are dispatched with
/// `&mut self`, but all shared state lives behind [`MountState`]'s internal
/// locks, so the implementation is sound under concurrent dispatch
/// regardless of how the FUSE session schedules requests.
pub struct OnionFs {
    state: MountState,
    fast: Mutex<FastRng>,
}

impl OnionFs {
    pub fn new(state: MountState, fast: FastRng) -> Self {
        OnionFs {
            state,
            fast: Mutex::new(fast),
        }
    }
}

impl Filesystem for OnionFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let ino = match name.to_str() {
            Some("data") => DATA_INO,
            Some("keystream") => KEYSTREAM_INO,
            _ => {
                reply.error(libc::ENOENT);
                return;
            }
        };
        reply.entry(&TTL, &file_attr(&self.state, ino), 0);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match ino {
            ROOT_INO => reply.attr(&TTL, &dir_attr(&self.state)),
            DATA_INO | KEYSTREAM_INO => reply.attr(&TTL, &file_attr(&self.state, ino)),
            _ => reply.error(libc::ENOENT),
        }
    }

    /// Truncate requests are accepted as a no-op: the volume's logical size
    /// is fixed by `nblk` and never changes.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match ino {
            ROOT_INO => reply.attr(&TTL, &dir_attr(&self.state)),
            DATA_INO | KEYSTREAM_INO => reply.attr(&TTL, &file_attr(&self.state, ino)),
            _ => reply.error(libc::ENOENT),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        if ino != ROOT_INO {
            reply.error(libc::ENOTDIR);
            return;
        }
        let entries = [
            (ROOT_INO, FileType::Directory, "."),
            (ROOT_INO, FileType::Directory, ".."),
            (DATA_INO, FileType::RegularFile, "data"),
            (KEYSTREAM_INO, FileType::RegularFile, "keystream"),
        ];
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & libc::O_SYNC != 0 {
            reply.error(libc::ENOSYS);
            return;
        }
        if flags & (libc::O_TRUNC | libc::O_CREAT) != 0 {
            reply.error(libc::EACCES);
            return;
        }
        match ino {
            ROOT_INO => reply.error(libc::EISDIR),
            DATA_INO | KEYSTREAM_INO => reply.opened(0, 0),
            _ => reply.error(libc::ENOENT),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let offset = offset as u64;
        let mut buf = vec![0u8; size as usize];
        let image = self.state.image.read().unwrap();
        let result = match ino {
            DATA_INO => blockio::read_data(&image, &self.state.header, self.state.nblk, offset, &mut buf),
            KEYSTREAM_INO => blockio::read_keystream(&image, self.state.nblk, offset, &mut buf),
            _ => {
                reply.error(libc::EBADF);
                return;
            }
        };
        match result {
            Ok(n) => reply.data(&buf[..n]),
            Err(_) => reply.error(libc::EIO),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let offset = offset as u64;
        let mut image = self.state.image.write().unwrap();
        let mut fast = self.fast.lock().unwrap();
        let result = match ino {
            DATA_INO => {
                blockio::write_data(&mut image, &self.state.header, self.state.nblk, offset, data, &mut *fast)
            }
            KEYSTREAM_INO => {
                blockio::write_keystream(&mut image, &self.state.header, self.state.nblk, offset, data, &mut *fast)
            }
            _ => {
                reply.error(libc::EBADF);
                return;
            }
        };
        match result {
            Ok(n) => reply.written(n as u32),
            Err(_) => reply.error(libc::EIO),
        }
    }
}
