use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::report::DivergenceReport;

/// Filesystem failure classified by errno, so that two different
/// filesystems failing "the same way" compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    NotPermitted,
    NotEmpty,
    IsADirectory,
    NotADirectory,
    ReadOnly,
    InvalidArgument,
    TooManyLinks,
    NameTooLong,
    Busy,
    StaleHandle,
    CrossDevice,
    Io,
    /// Any errno without a dedicated variant.
    Other(i32),
}

impl ErrorKind {
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::ENOENT => ErrorKind::NotFound,
            libc::EEXIST => ErrorKind::AlreadyExists,
            libc::EACCES => ErrorKind::PermissionDenied,
            libc::EPERM => ErrorKind::NotPermitted,
            libc::ENOTEMPTY => ErrorKind::NotEmpty,
            libc::EISDIR => ErrorKind::IsADirectory,
            libc::ENOTDIR => ErrorKind::NotADirectory,
            libc::EROFS => ErrorKind::ReadOnly,
            libc::EINVAL => ErrorKind::InvalidArgument,
            libc::EMLINK => ErrorKind::TooManyLinks,
            libc::ENAMETOOLONG => ErrorKind::NameTooLong,
            libc::EBUSY => ErrorKind::Busy,
            libc::ESTALE => ErrorKind::StaleHandle,
            libc::EXDEV => ErrorKind::CrossDevice,
            libc::EIO => ErrorKind::Io,
            other => ErrorKind::Other(other),
        }
    }

    /// Classify an `io::Error`, preferring the raw errno when there is one.
    pub fn from_io(err: &io::Error) -> Self {
        if let Some(errno) = err.raw_os_error() {
            return ErrorKind::from_errno(errno);
        }
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
            _ => ErrorKind::Io,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::NotPermitted => "not-permitted",
            ErrorKind::NotEmpty => "not-empty",
            ErrorKind::IsADirectory => "is-a-directory",
            ErrorKind::NotADirectory => "not-a-directory",
            ErrorKind::ReadOnly => "read-only",
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::TooManyLinks => "too-many-links",
            ErrorKind::NameTooLong => "name-too-long",
            ErrorKind::Busy => "busy",
            ErrorKind::StaleHandle => "stale-handle",
            ErrorKind::CrossDevice => "cross-device",
            ErrorKind::Io => "io",
            ErrorKind::Other(_) => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Other(errno) => write!(f, "errno {}", errno),
            kind => f.write_str(kind.as_str()),
        }
    }
}

/// A failed filesystem call. Expected during fuzzing: it is data for the
/// oracle, never a reason to abort an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} {}: {kind}", .path.display())]
pub struct FsError {
    pub kind: ErrorKind,
    /// Name of the failing system call.
    pub op: &'static str,
    pub path: PathBuf,
}

impl FsError {
    pub fn new(op: &'static str, path: &Path, kind: ErrorKind) -> Self {
        FsError {
            kind,
            op,
            path: path.to_path_buf(),
        }
    }

    pub fn from_io(op: &'static str, path: &Path, err: &io::Error) -> Self {
        FsError::new(op, path, ErrorKind::from_io(err))
    }

    /// Capture `errno` right after a failed libc call.
    pub fn last_os_error(op: &'static str, path: &Path) -> Self {
        FsError::from_io(op, path, &io::Error::last_os_error())
    }
}

/// Precondition violations detected before the first iteration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SetupError {
    #[error("{role} root does not exist: {}", .path.display())]
    MissingRoot { role: &'static str, path: PathBuf },

    #[error("{role} root is not a directory: {}", .path.display())]
    NotADirectory { role: &'static str, path: PathBuf },

    #[error("{role} root is not writable: {} ({kind})", .path.display())]
    NotWritable {
        role: &'static str,
        path: PathBuf,
        kind: ErrorKind,
    },

    #[error("reference root {} and {role} root {} are the same directory", .reference.display(), .sut.display())]
    SameStorage {
        role: &'static str,
        reference: PathBuf,
        sut: PathBuf,
    },

    #[error("Failed to create fuzzing subtree {}: {source}", .path.display())]
    CreateSubtree {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid subtree name '{0}'")]
    InvalidSubtree(String),

    /// Left over from an earlier run; the tracker could not mirror it.
    #[error("{role} subtree already exists and is not empty: {}", .path.display())]
    DirtySubtree { role: &'static str, path: PathBuf },

    #[error("Config error: {0}")]
    Config(#[from] dirfuzz_config::ConfigError),
}

/// Errors that end a fuzzing run.
#[derive(Debug, thiserror::Error)]
pub enum FuzzError {
    /// The two targets disagreed. Boxed: reports carry both outcomes.
    #[error("{0}")]
    Divergence(Box<DivergenceReport>),

    #[error("Setup fault: {0}")]
    Setup(#[from] SetupError),
}

impl From<DivergenceReport> for FuzzError {
    fn from(report: DivergenceReport) -> Self {
        FuzzError::Divergence(Box::new(report))
    }
}
