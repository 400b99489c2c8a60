//! Error taxonomy for the storage engine.
//!
//! The engine never panics on a malformed request; every fallible operation
//! returns one of the variants below. [`FsError::errno`] gives the positive
//! `libc` errno a caller expects to see, and [`FsError::to_errno`] gives the
//! negated form the kernel-bridge API convention (`storage_init`,
//! `read_file`, ...) uses for its return values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("no free inodes")]
    NoInodes,

    #[error("no free data blocks")]
    NoSpace,

    #[error("name already exists")]
    AlreadyExists,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("I/O error backing the image: {0}")]
    Io(#[from] std::io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// The positive `libc` errno that describes this failure.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::NoInodes => libc::ENOMEM,
            FsError::NoSpace => libc::ENOSPC,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::Io(_) => libc::EIO,
        }
    }

    /// The kernel-bridge API convention: negative errno on failure.
    pub fn to_errno(&self) -> i32 {
        -self.errno()
    }
}
