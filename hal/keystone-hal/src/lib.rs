//! Keystone Hardware Abstraction Layer
//!
//! This crate defines the interfaces that backend crates implement for a
//! specific target (POSIX host, "None" stub, vendor SDKs). Application code
//! and `keystone-core` are written against these traits only, so the backend
//! can be swapped at build time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / keystone-core            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  keystone-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ keystone-hal- │       │ keystone-hal- │
//! │     posix     │       │     none      │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`os::OperatingSystem`] - Thread creation and block/unblock by identity
//! - [`storage::MediaDriver`], [`storage::NativeFile`] - Media access layer
//! - [`gpio::Gpio`] - Digital I/O
//! - [`adc::Adc`] - Analog to digital conversion

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod adc;
pub mod error;
pub mod fs;
pub mod gpio;
pub mod os;
pub mod storage;
pub mod types;

// Re-export key items at crate root for convenience
pub use error::{Error, Result};
pub use fs::{File, Implementation, OpenMode, PartitionName, Status};
pub use os::{OperatingSystem, Priority, ThreadStart};
pub use storage::{MediaDriver, Medium, NativeFile, SeekFrom, Space, StorageStatus};
pub use types::{Bytes, Count, FileOffset, Id, Milliseconds, Percent, Volts};
