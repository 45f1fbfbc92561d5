//! Board-agnostic services of the Keystone abstraction layer
//!
//! This crate turns a non-thread-safe media driver into a file system that
//! any number of threads may use:
//!
//! - Event queue feeding a single worker
//! - Parking tickets for callers that wait on the worker
//! - Storage worker binding, one worker per medium
//! - File system facade with blocking and callback based operations
//!
//! The operating system and the media driver are injected; pick them from a
//! backend crate such as `keystone-hal-posix`.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod event;
pub mod fs;
pub mod storage;

#[cfg(test)]
mod testing;

pub use event::{Completion, Event, EventQueue, Ticket, MAX_EVENTS};
pub use fs::FileSystem;
pub use storage::{Storage, StorageContext, WorkerConfig};
