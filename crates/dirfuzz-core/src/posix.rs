//! Thin wrappers over the POSIX calls the fuzzer mirrors. Each one takes the
//! directory of one target and reports failures as classified [`FsError`]s.

use std::collections::BTreeSet;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::os::unix::io::RawFd;
use std::path::Path;

use serde::Serialize;

use crate::error::{ErrorKind, FsError};
use crate::tracker::EntryKind;

/// Mode bits compared by `stat`: file type plus permission bits.
const COMPARED_MODE_BITS: u32 = libc::S_IFMT as u32 | 0o7777;

fn c_path(op: &'static str, path: &Path) -> Result<CString, FsError> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| FsError::new(op, path, ErrorKind::InvalidArgument))
}

/// `mknod(path, S_IFREG | 0600)`: create an empty regular file, failing
/// with already-exists instead of truncating.
pub fn mknod(path: &Path) -> Result<(), FsError> {
    let c = c_path("mknod", path)?;
    // SAFETY: `c` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mknod(c.as_ptr(), libc::S_IFREG | 0o600, 0) };
    if rc == 0 {
        Ok(())
    } else {
        Err(FsError::last_os_error("mknod", path))
    }
}

pub fn mkdir(path: &Path) -> Result<(), FsError> {
    fs::create_dir(path).map_err(|e| FsError::from_io("mkdir", path, &e))
}

pub fn unlink(path: &Path) -> Result<(), FsError> {
    fs::remove_file(path).map_err(|e| FsError::from_io("unlink", path, &e))
}

pub fn rmdir(path: &Path) -> Result<(), FsError> {
    fs::remove_dir(path).map_err(|e| FsError::from_io("rmdir", path, &e))
}

pub fn link(source: &Path, link: &Path) -> Result<(), FsError> {
    fs::hard_link(source, link).map_err(|e| FsError::from_io("link", link, &e))
}

/// The part of `stat(2)` that two independent filesystems must agree on.
/// Timestamps, inode and device numbers, link counts and directory sizes
/// legitimately differ and are left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatSummary {
    pub kind: EntryKind,
    pub mode: u32,
}

pub fn stat(path: &Path) -> Result<StatSummary, FsError> {
    let meta = fs::metadata(path).map_err(|e| FsError::from_io("stat", path, &e))?;
    let kind = if meta.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Ok(StatSummary {
        kind,
        mode: meta.mode() & COMPARED_MODE_BITS,
    })
}

/// Inode number of `path`, used for identity checks on one target only.
pub fn inode(path: &Path) -> Result<u64, FsError> {
    fs::metadata(path)
        .map(|meta| meta.ino())
        .map_err(|e| FsError::from_io("stat", path, &e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

impl AccessMode {
    pub const ALL: [AccessMode; 3] = [AccessMode::Read, AccessMode::Write, AccessMode::Execute];

    fn flag(&self) -> libc::c_int {
        match self {
            AccessMode::Read => libc::R_OK,
            AccessMode::Write => libc::W_OK,
            AccessMode::Execute => libc::X_OK,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "R_OK",
            AccessMode::Write => "W_OK",
            AccessMode::Execute => "X_OK",
        }
    }
}

/// `access(2)`. A denied check is a failure with its errno, so a missing
/// entry and a permission refusal stay distinguishable.
pub fn access(path: &Path, mode: AccessMode) -> Result<(), FsError> {
    let c = c_path("access", path)?;
    // SAFETY: `c` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::access(c.as_ptr(), mode.flag()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(FsError::last_os_error("access", path))
    }
}

pub fn chmod(path: &Path, mode: u32) -> Result<(), FsError> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| FsError::from_io("chmod", path, &e))
}

/// Names in `dir`, without `.` and `..`.
pub fn list_names(dir: &Path) -> Result<BTreeSet<String>, FsError> {
    let entries = fs::read_dir(dir).map_err(|e| FsError::from_io("readdir", dir, &e))?;
    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| FsError::from_io("readdir", dir, &e))?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// What one open-read-write-close cycle observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWrite {
    pub read: Vec<u8>,
    pub written: usize,
}

/// An open descriptor that is closed exactly once: explicitly through
/// [`OpenFile::close`], or on drop if the caller bailed out early.
pub struct OpenFile<'a> {
    fd: RawFd,
    path: &'a Path,
    open: bool,
}

impl<'a> OpenFile<'a> {
    pub fn open_rdwr(path: &'a Path) -> Result<Self, FsError> {
        let c = c_path("open", path)?;
        // SAFETY: `c` is a valid NUL-terminated string for the duration of the call.
        let fd = unsafe { libc::open(c.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(FsError::last_os_error("open", path));
        }
        Ok(OpenFile {
            fd,
            path,
            open: true,
        })
    }

    /// One `read(2)` of at most `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>, FsError> {
        let mut buf = vec![0u8; len];
        // SAFETY: `buf` is valid for `len` writable bytes and `fd` is open.
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), len) };
        if n < 0 {
            return Err(FsError::last_os_error("read", self.path));
        }
        buf.truncate(n as usize);
        Ok(buf)
    }

    /// One `write(2)` of `buf`; returns the byte count accepted.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        // SAFETY: `buf` is valid for `buf.len()` readable bytes and `fd` is open.
        let n = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(FsError::last_os_error("write", self.path));
        }
        Ok(n as usize)
    }

    pub fn close(mut self) -> Result<(), FsError> {
        self.open = false;
        // SAFETY: `fd` came from `open` and is closed only here.
        let rc = unsafe { libc::close(self.fd) };
        if rc == 0 {
            Ok(())
        } else {
            Err(FsError::last_os_error("close", self.path))
        }
    }
}

impl Drop for OpenFile<'_> {
    fn drop(&mut self) {
        if self.open {
            // SAFETY: `fd` came from `open` and was not closed yet.
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

/// Open `path` read-write, read up to `read_len` bytes, write `buf`, and
/// close. The descriptor is released on every path; a body failure wins
/// over a close failure, and a close failure alone fails the whole cycle.
pub fn open_read_write_close(path: &Path, read_len: usize, buf: &[u8]) -> Result<ReadWrite, FsError> {
    let mut file = OpenFile::open_rdwr(path)?;
    let body = file
        .read(read_len)
        .and_then(|read| file.write(buf).map(|written| ReadWrite { read, written }));
    let closed = file.close();
    let rw = body?;
    closed?;
    Ok(rw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mknod_then_exists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        mknod(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(mknod(&path).unwrap_err().kind, ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_unlink_and_rmdir_kinds() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("d");
        let file = tmp.path().join("f");
        mkdir(&dir).unwrap();
        mknod(&file).unwrap();

        assert_eq!(rmdir(&file).unwrap_err().kind, ErrorKind::NotADirectory);
        assert_eq!(unlink(&tmp.path().join("missing")).unwrap_err().kind, ErrorKind::NotFound);
        unlink(&file).unwrap();
        rmdir(&dir).unwrap();
        assert_eq!(rmdir(&dir).unwrap_err().kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_link_shares_inode() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        mknod(&a).unwrap();
        link(&a, &b).unwrap();
        assert_eq!(inode(&a).unwrap(), inode(&b).unwrap());
        assert_eq!(link(&a, &b).unwrap_err().kind, ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_stat_after_chmod() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        mknod(&a).unwrap();
        chmod(&a, 0o640).unwrap();
        let st = stat(&a).unwrap();
        assert_eq!(st.kind, EntryKind::File);
        assert_eq!(st.mode, libc::S_IFREG as u32 | 0o640);
    }

    #[test]
    fn test_list_names() {
        let tmp = TempDir::new().unwrap();
        mknod(&tmp.path().join("x")).unwrap();
        mkdir(&tmp.path().join("y")).unwrap();
        let names: Vec<_> = list_names(tmp.path()).unwrap().into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_open_read_write_close_cycle() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        mknod(&a).unwrap();

        let first = open_read_write_close(&a, 4, b"hello").unwrap();
        assert!(first.read.is_empty());
        assert_eq!(first.written, 5);

        let second = open_read_write_close(&a, 4, b"world").unwrap();
        assert_eq!(second.read, b"hell");
        assert_eq!(fs::read(&a).unwrap(), b"hellworld");
    }

    #[test]
    fn test_open_directory_is_classified() {
        let tmp = TempDir::new().unwrap();
        let err = open_read_write_close(tmp.path(), 4, b"x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IsADirectory);
        assert_eq!(err.op, "open");
    }

    #[test]
    fn test_access_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let err = access(&tmp.path().join("missing"), AccessMode::Read).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        access(tmp.path(), AccessMode::Execute).unwrap();
    }
}
