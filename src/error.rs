#[cfg(not(feature = "std"))]
use core::*;
#[cfg(feature = "std")]
use std::*;

use crate::path::PathError;

/// An error raised by the byte-addressed storage adapter sitting between
/// the FAT library and a [`BlockDevice`](crate::io::BlockDevice)
#[derive(Debug, displaydoc::Display)]
pub enum StorageError<E>
where
    E: fmt::Debug,
{
    /// The block device reported an error: {0:?}
    Device(E),
    /// The block device is already borrowed elsewhere
    Busy,
    /// Attempted to seek outside the bounds of the block device
    OutOfBounds,
    /// Reached the end of the block device unexpectedly
    UnexpectedEof,
    /// The block device accepted zero bytes of a write
    WriteZero,
}

impl<E> fatfs::IoError for StorageError<E>
where
    E: fmt::Debug,
{
    #[inline]
    fn is_interrupted(&self) -> bool {
        false
    }

    #[inline]
    fn new_unexpected_eof_error() -> Self {
        StorageError::UnexpectedEof
    }

    #[inline]
    fn new_write_zero_error() -> Self {
        StorageError::WriteZero
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for StorageError<E> where E: fmt::Debug {}

/// The error type the FAT library returns for our storage
pub type FatError<E> = fatfs::Error<StorageError<E>>;

/// An error indicating that an SD card operation has failed
#[derive(Debug, displaydoc::Display)]
pub enum SdError<E>
where
    E: fmt::Debug,
{
    /// The SD card isn't mounted
    NotMounted,
    /// Invalid path: {0}
    InvalidPath(PathError),
    /**
     The FAT library returned an error

     The library's error is passed through untouched, so callers can match
     on e.g. [`fatfs::Error::NotFound`] or [`fatfs::Error::AlreadyExists`]
    */
    #[displaydoc("The FAT library returned an error: {0:?}")]
    Fs(FatError<E>),
}

impl<E> SdError<E>
where
    E: fmt::Debug,
{
    /// Returns the underlying FAT library error, if any
    #[inline]
    pub fn fs_error(&self) -> Option<&FatError<E>> {
        match self {
            SdError::Fs(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this error reports a missing file or directory
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdError::Fs(fatfs::Error::NotFound))
    }

    /// Whether this error reports an already existing file or directory
    pub fn is_already_exists(&self) -> bool {
        matches!(self, SdError::Fs(fatfs::Error::AlreadyExists))
    }
}

impl<E> From<FatError<E>> for SdError<E>
where
    E: fmt::Debug,
{
    #[inline]
    fn from(value: FatError<E>) -> Self {
        SdError::Fs(value)
    }
}

impl<E> From<PathError> for SdError<E>
where
    E: fmt::Debug,
{
    #[inline]
    fn from(value: PathError) -> Self {
        SdError::InvalidPath(value)
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for SdError<E> where E: fmt::Debug {}

/// An alias for a [`Result`] with a [`SdError`] error type
pub type SdResult<T, E> = Result<T, SdError<E>>;
