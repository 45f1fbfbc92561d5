//! Storage medium abstractions
//!
//! Provides the media access layer that a storage worker drives: a
//! [`MediaDriver`] opens [`NativeFile`]s on a medium and answers capacity
//! queries. Neither trait is required to be thread safe; the core only ever
//! touches a driver from the worker thread that owns it.

use alloc::string::String;

use crate::error::{Error, Result};
use crate::fs::OpenMode;
use crate::types::{Bytes, FileOffset};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Storage medium behind a storage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum Medium {
    /// Flash
    Flash = 1,
    /// Electrically erasable programmable memory
    Eeprom = 2,
    /// Secure digital card
    Sd = 3,
    /// One time programmable
    Otp = 4,
}

impl Medium {
    /// Get the medium as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a medium from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Medium::Flash),
            2 => Some(Medium::Eeprom),
            3 => Some(Medium::Sd),
            4 => Some(Medium::Otp),
            _ => None,
        }
    }

    /// Name used for the directory that emulates this medium on a host
    pub fn as_str(self) -> &'static str {
        match self {
            Medium::Flash => "AbstractionLayerFlashStorage",
            Medium::Eeprom => "AbstractionLayerEepromStorage",
            Medium::Sd => "AbstractionLayerSdStorage",
            Medium::Otp => "AbstractionLayerOtpStorage",
        }
    }
}

/// Status of a storage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageStatus {
    /// Storage is initialized and ready to use
    pub is_initialized: bool,
}

/// Position argument for [`NativeFile::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SeekFrom {
    /// Absolute offset from the start of the file
    Start(FileOffset),
    /// Relative to the end of the file
    End(i64),
    /// Relative to the current position
    Current(i64),
}

/// Total and free capacity of a medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Space {
    /// Total capacity
    pub capacity: Bytes,
    /// Capacity still available to the caller
    pub available: Bytes,
}

/// An open file on a medium
///
/// Mirrors a stream with sticky error state: once an operation fails,
/// implementations may keep failing until [`clear_error`](NativeFile::clear_error)
/// is called.
pub trait NativeFile: Send {
    /// Move the stream position
    ///
    /// # Returns
    /// The new position from the start of the file.
    fn seek(&mut self, position: SeekFrom) -> Result<FileOffset>;

    /// Read into `buffer`
    ///
    /// # Returns
    /// The number of bytes read. Zero means end of file.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write all of `data` at the current position
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Push buffered data to the medium
    fn flush(&mut self) -> Result<()>;

    /// Reset any error state so the handle can be used again
    fn clear_error(&mut self) {}

    /// Close the handle
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Media access layer for one storage medium
pub trait MediaDriver: Send + 'static {
    /// File handle type for this medium
    type File: NativeFile;

    /// Bring up the medium
    ///
    /// # Returns
    /// The root prefix below which partitions are mounted.
    fn init(&mut self, medium: Medium) -> Result<String>;

    /// Release the medium
    fn deinit(&mut self) -> Result<()> {
        Err(Error::NotAvailable)
    }

    /// Create a directory, succeeding if it already exists
    fn create_dir(&mut self, path: &str) -> Result<()>;

    /// Open a file
    ///
    /// Implementations honour [`OpenMode::file_must_exist`],
    /// [`OpenMode::file_must_not_exist`] and [`OpenMode::should_truncate`].
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File>;

    /// Delete a file
    fn remove(&mut self, path: &str) -> Result<()>;

    /// Query the capacity of the medium holding `path`
    fn space(&mut self, path: &str) -> Result<Space>;
}
