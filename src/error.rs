//! File system error types.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const EPERM: i32 = 1;
pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EEXIST: i32 = 17;
pub const ENOTDIR: i32 = 20;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const ENOTEMPTY: i32 = 39;

/// Errors raised by tree operations. Every variant corresponds to one POSIX errno.
#[derive(Debug, Error)]
pub enum FsError {
    /// No such file or directory.
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("{} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// A path component (or the target itself) was expected to be a directory.
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("{} is a directory", path.display())]
    IsADirectory { path: PathBuf },

    #[error("{} is not empty", path.display())]
    DirectoryNotEmpty { path: PathBuf },

    #[error("operation not permitted: {}", path.display())]
    OperationNotPermitted { path: PathBuf },

    /// Bad path or glob pattern.
    #[error("invalid argument {input}: {reason}")]
    InvalidArgument { input: String, reason: String },

    /// Host I/O failure that does not map onto another variant (real backend only).
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type FsResult<T> = std::result::Result<T, FsError>;

impl FsError {
    pub fn not_found<P: AsRef<Path>>(path: P) -> Self {
        Self::NotFound { path: path.as_ref().to_path_buf() }
    }

    pub fn already_exists<P: AsRef<Path>>(path: P) -> Self {
        Self::AlreadyExists { path: path.as_ref().to_path_buf() }
    }

    pub fn not_a_directory<P: AsRef<Path>>(path: P) -> Self {
        Self::NotADirectory { path: path.as_ref().to_path_buf() }
    }

    pub fn is_a_directory<P: AsRef<Path>>(path: P) -> Self {
        Self::IsADirectory { path: path.as_ref().to_path_buf() }
    }

    pub fn not_empty<P: AsRef<Path>>(path: P) -> Self {
        Self::DirectoryNotEmpty { path: path.as_ref().to_path_buf() }
    }

    pub fn not_permitted<P: AsRef<Path>>(path: P) -> Self {
        Self::OperationNotPermitted { path: path.as_ref().to_path_buf() }
    }

    pub fn invalid<S: Into<String>, R: Into<String>>(input: S, reason: R) -> Self {
        Self::InvalidArgument { input: input.into(), reason: reason.into() }
    }

    /// Maps a host I/O error onto the taxonomy, keeping the raw error when no variant fits.
    pub fn from_io<P: AsRef<Path>>(path: P, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            io::ErrorKind::IsADirectory => Self::IsADirectory { path },
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty { path },
            io::ErrorKind::PermissionDenied => Self::OperationNotPermitted { path },
            io::ErrorKind::InvalidInput => Self::InvalidArgument {
                input: path.display().to_string(),
                reason: err.to_string(),
            },
            _ => Self::Io { path, source: err },
        }
    }

    /// The POSIX errno this error stands for.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound { .. } => ENOENT,
            Self::AlreadyExists { .. } => EEXIST,
            Self::NotADirectory { .. } => ENOTDIR,
            Self::IsADirectory { .. } => EISDIR,
            Self::DirectoryNotEmpty { .. } => ENOTEMPTY,
            Self::OperationNotPermitted { .. } => EPERM,
            Self::InvalidArgument { .. } => EINVAL,
            Self::Io { source, .. } => source.raw_os_error().unwrap_or(EIO),
        }
    }
}
