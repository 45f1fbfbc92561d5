//! POSIX host backend for the Keystone abstraction layer
//!
//! Runs the abstraction layer on a desktop or embedded Linux host:
//!
//! - [`PosixOperatingSystem`] - Threads and block/unblock on `std::thread`
//! - [`PosixMedia`] - Media emulated by a directory tree
//! - [`HostConfig`] - TOML description of the storage setup
//!
//! Logging goes through the `log` facade; install any logger in the
//! application.

#![deny(unsafe_code)]

pub mod config;
pub mod media;
pub mod os;

// Provides the critical section used by keystone-core's blocking mutexes
use critical_section as _;

pub use config::{ConfigError, FileSystemConfig, HostConfig, StorageConfig, WorkerSettings};
pub use media::{PosixFile, PosixMedia};
pub use os::PosixOperatingSystem;
