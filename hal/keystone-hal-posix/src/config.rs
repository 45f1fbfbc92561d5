//! Host configuration file
//!
//! Describes the storage medium, its worker thread and the file systems on
//! it as a TOML document:
//!
//! ```toml
//! [storage]
//! medium = "flash"
//! root = "/data"
//!
//! [worker]
//! name = "storage"
//! priority = "normal"
//! stack_size = 8192
//!
//! [[filesystem]]
//! partition = "cfg"
//! implementation = "ext4"
//! ```
//!
//! Every table is optional.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use keystone_hal::fs::partition_name;
use keystone_hal::{Bytes, Implementation, Medium, Priority};
use serde::Deserialize;

use crate::media::PosixMedia;

/// Maximum length of a worker thread name
pub const WORKER_NAME_LENGTH: usize = 16;

/// Configuration loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read
    Read,
    /// Config file is not valid TOML or has unexpected fields
    Parse,
    /// A partition name is empty, too long or contains `/`
    InvalidPartition,
    /// Two file systems use the same partition
    DuplicatePartition,
    /// Worker name is empty or too long
    InvalidWorkerName,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ConfigError::Read => "config file could not be read",
            ConfigError::Parse => "config file is not valid",
            ConfigError::InvalidPartition => "invalid partition name",
            ConfigError::DuplicatePartition => "partition used twice",
            ConfigError::InvalidWorkerName => "invalid worker name",
        };
        f.write_str(message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for keystone_hal::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Read => keystone_hal::Error::FileNotFound,
            _ => keystone_hal::Error::InvalidParameter,
        }
    }
}

/// `[storage]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Medium to emulate
    pub medium: Medium,
    /// Directory holding the medium; `$HOME/<medium name>` when absent
    pub root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            medium: Medium::Flash,
            root: None,
        }
    }
}

impl StorageConfig {
    /// Media driver for this medium
    pub fn media(&self) -> PosixMedia {
        match &self.root {
            Some(root) => PosixMedia::with_root(root),
            None => PosixMedia::new(),
        }
    }
}

/// `[worker]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSettings {
    /// Thread name
    pub name: String,
    /// Thread priority
    pub priority: Priority,
    /// Stack size
    pub stack_size: Bytes,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            name: "storage".into(),
            priority: Priority::Normal,
            stack_size: 8 * 1024,
        }
    }
}

/// One `[[filesystem]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSystemConfig {
    /// Partition name, also the mount point below the storage root
    pub partition: String,
    /// Requested on-medium format
    #[serde(default)]
    pub implementation: Implementation,
}

/// Complete host configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Storage medium
    pub storage: StorageConfig,
    /// Storage worker thread
    pub worker: WorkerSettings,
    /// File systems on the medium
    #[serde(rename = "filesystem")]
    pub filesystems: Vec<FileSystemConfig>,
}

impl HostConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(text).map_err(|e| {
            log::error!("Invalid configuration: {e}");
            ConfigError::Parse
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| {
            log::error!("Cannot read {}: {e}", path.display());
            ConfigError::Read
        })?;
        let config = Self::from_toml(&text)?;
        log::info!(
            "Loaded {} with {} file system(s)",
            path.display(),
            config.filesystems.len()
        );
        Ok(config)
    }

    /// Check names and uniqueness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.name.is_empty() || self.worker.name.len() > WORKER_NAME_LENGTH {
            return Err(ConfigError::InvalidWorkerName);
        }

        for (index, filesystem) in self.filesystems.iter().enumerate() {
            partition_name(&filesystem.partition).map_err(|_| {
                log::warn!("Invalid partition name {:?}", filesystem.partition);
                ConfigError::InvalidPartition
            })?;
            if self.filesystems[..index]
                .iter()
                .any(|earlier| earlier.partition == filesystem.partition)
            {
                return Err(ConfigError::DuplicatePartition);
            }
        }
        Ok(())
    }
}
