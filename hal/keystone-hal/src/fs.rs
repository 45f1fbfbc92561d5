//! File system types
//!
//! Plain data shared between the file system facade and its callers.

use alloc::string::String;

use crate::error::{Error, Result};
use crate::types::{Bytes, Count, FileOffset, Percent};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length of a partition name
pub const PARTITION_NAME_LENGTH: usize = 16;

/// Name of a partition, also the last component of its mount point
pub type PartitionName = heapless::String<PARTITION_NAME_LENGTH>;

/// Build a [`PartitionName`] from a string slice
///
/// Returns `InvalidParameter` if the name is empty, too long or contains a
/// path separator.
pub fn partition_name(name: &str) -> Result<PartitionName> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::InvalidParameter);
    }
    let mut partition = PartitionName::new();
    partition
        .push_str(name)
        .map_err(|_| Error::InvalidParameter)?;
    Ok(partition)
}

/// On-medium format of a file system
///
/// A platform does not have to honour the requested implementation; it is
/// a hint for backends that support several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Implementation {
    /// Unknown
    #[default]
    Unknown,
    /// File allocation table
    Fat,
    /// SPI flash file storage
    Spiffs,
    /// Key value storage
    KeyValue,
    /// Windows NT file system
    Ntfs,
    /// Apple file system
    Apfs,
    /// Ext4 (Linux)
    Ext4,
    /// EEPROM
    Eeprom,
    /// One time programmable
    Otp,
}

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Not open
    #[default]
    Unknown,
    /// Read only. The file must exist.
    ReadOnly,
    /// Write only. The file must not exist yet.
    WriteOnlyNew,
    /// Write only, keeping existing data. The file must exist.
    WriteOnlyAppend,
    /// Write only, discarding existing data. The file must exist.
    WriteOnlyTruncate,
    /// Read and write. The file must not exist yet.
    ReadWriteNew,
    /// Read and write, keeping existing data. The file must exist.
    ReadWriteAppend,
    /// Read and write, discarding existing data. The file must exist.
    ReadWriteTruncate,
}

impl OpenMode {
    /// Check if opening in this mode fails when the file is missing
    pub fn file_must_exist(self) -> bool {
        matches!(
            self,
            OpenMode::ReadOnly
                | OpenMode::WriteOnlyAppend
                | OpenMode::WriteOnlyTruncate
                | OpenMode::ReadWriteAppend
                | OpenMode::ReadWriteTruncate
        )
    }

    /// Check if opening in this mode fails when the file already exists
    pub fn file_must_not_exist(self) -> bool {
        matches!(self, OpenMode::WriteOnlyNew | OpenMode::ReadWriteNew)
    }

    /// Check if existing contents are discarded on open
    pub fn should_truncate(self) -> bool {
        matches!(self, OpenMode::WriteOnlyTruncate | OpenMode::ReadWriteTruncate)
    }

    /// Check if the file can be read in this mode
    pub fn can_read(self) -> bool {
        matches!(
            self,
            OpenMode::ReadOnly
                | OpenMode::ReadWriteNew
                | OpenMode::ReadWriteAppend
                | OpenMode::ReadWriteTruncate
        )
    }

    /// Check if the file can be written in this mode
    pub fn can_write(self) -> bool {
        !matches!(self, OpenMode::Unknown | OpenMode::ReadOnly)
    }
}

/// A file as seen by the caller
///
/// The native handle stays with the storage worker; this struct only
/// carries the accounting state that travels with each request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    /// Path relative to the mount point
    pub path: String,
    /// Size of the file
    pub size: Bytes,
    /// Current offset into the file
    pub file_pointer: FileOffset,
    /// Mode the file was opened with
    pub open_mode: OpenMode,
    /// True while the file is open
    pub is_open: bool,
}

impl File {
    /// Create a closed file
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the file pointer
    pub fn seek(&mut self, offset: FileOffset) {
        self.file_pointer = offset;
    }

    /// Bytes between the file pointer and the end of the file
    pub fn remaining(&self) -> Bytes {
        self.size.saturating_sub(self.file_pointer)
    }
}

/// Status of a file system
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// File system is mounted
    pub mounted: bool,
    /// Free space on the partition
    pub free_space: Percent,
    /// Number of distinct files currently open
    pub opened_files: Count,
}
