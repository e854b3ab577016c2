use std::os::raw::c_int;

use thiserror::Error;

use crate::consts::{BlockPointer, InodePointer};

pub type ErrorNum = c_int;

pub type Result<T> = std::result::Result<T, Error>;

/// Which allocation map a consistency error was raised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    Inode,
    Data,
}

impl std::fmt::Display for MapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapKind::Inode => f.write_str("inode"),
            MapKind::Data => f.write_str("data"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no such file or directory")]
    NotFound,

    #[error("name already exists")]
    AlreadyExists,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("name longer than {0} bytes")]
    NameTooLong(usize),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("no space left in the {0} map")]
    NoSpace(MapKind),

    #[error("file would exceed the addressable size")]
    FileTooLarge,

    /// Fatal at mount: the image was not formatted by this filesystem.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("inode {0} out of range")]
    OutOfRange(InodePointer),

    #[error("{map} entry {index} freed twice")]
    DoubleFree { map: MapKind, index: u32 },

    #[error("corrupt entry at block {block}: {detail}")]
    CorruptEntry { block: BlockPointer, detail: String },

    #[error("operation not permitted")]
    PermissionDenied,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn errno(&self) -> ErrorNum {
        match self {
            Error::NotFound => libc::ENOENT,
            Error::AlreadyExists => libc::EEXIST,
            Error::NotADirectory => libc::ENOTDIR,
            Error::IsADirectory => libc::EISDIR,
            Error::NotEmpty => libc::ENOTEMPTY,
            Error::NameTooLong(_) => libc::ENAMETOOLONG,
            Error::InvalidName(_) => libc::EINVAL,
            Error::NoSpace(_) => libc::ENOSPC,
            Error::FileTooLarge => libc::EFBIG,
            Error::InvalidImage(_) => libc::EINVAL,
            Error::OutOfRange(_) => libc::ENOENT,
            Error::DoubleFree { .. } => libc::EIO,
            Error::CorruptEntry { .. } => libc::EIO,
            Error::PermissionDenied => libc::EPERM,
            Error::Io(_) => libc::EIO,
        }
    }

    /// Errors that mean the on-disk structures disagree with each other.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::DoubleFree { .. } | Error::CorruptEntry { .. })
    }
}
