//! Storage worker binding
//!
//! A [`Storage`] ties one medium to one worker thread and one event queue.
//! All file systems on that medium share the worker, so operations against
//! the medium are strictly serialized in submission order.

mod context;
mod worker;

pub use context::StorageContext;
pub use worker::{Storage, WorkerConfig, DEFAULT_STACK_SIZE, WORKER_NAME_LENGTH};
