//! Operating system abstractions
//!
//! The scheduling primitives the core needs: thread creation and a
//! cooperative block/unblock keyed by thread identity. Implementations are
//! injected into the components that use them; there is no global instance.

use alloc::boxed::Box;

use crate::error::Result;
use crate::types::{Bytes, Id, Milliseconds};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Entry point of a thread created through [`OperatingSystem::create_thread`]
pub type ThreadStart = Box<dyn FnOnce() + Send + 'static>;

/// Thread priority
///
/// Backends map these onto whatever their scheduler offers. A scheduler
/// without priorities ignores the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    /// Highest priority
    Highest,
    /// High priority
    High,
    /// Normal priority
    #[default]
    Normal,
    /// Low priority
    Low,
    /// Lowest priority
    Lowest,
}

/// Operating system services
///
/// # Block/unblock contract
///
/// [`block`](OperatingSystem::block) suspends the calling thread until some
/// other thread calls [`unblock`](OperatingSystem::unblock) with its id. A
/// wake that arrives while the target is not blocked is retained, so the
/// next `block` returns immediately. Callers must therefore re-check their
/// own condition after `block` returns.
pub trait OperatingSystem: Send + Sync {
    /// Create and start a thread
    ///
    /// # Returns
    /// The id of the new thread. The id is valid for `unblock` as soon as
    /// this returns, even if the thread has not started running yet.
    fn create_thread(
        &self,
        priority: Priority,
        name: &str,
        stack_size: Bytes,
        start: ThreadStart,
    ) -> Result<Id>;

    /// Wait for a thread created by this operating system to finish
    fn join_thread(&self, thread: Id) -> Result<()>;

    /// Forget a thread created by this operating system without waiting
    ///
    /// The thread keeps running and releases its resources when it
    /// finishes. It can no longer be joined.
    fn detach_thread(&self, thread: Id) -> Result<()>;

    /// Get the id of the calling thread
    ///
    /// Threads that were not created through `create_thread` are given an
    /// id on first use.
    fn current_thread_id(&self) -> Result<Id>;

    /// Suspend the calling thread until it is unblocked
    fn block(&self) -> Result<()>;

    /// Resume a specific thread
    ///
    /// Safe to call on a thread that is not blocked.
    fn unblock(&self, thread: Id) -> Result<()>;

    /// Sleep the calling thread
    fn delay(&self, delay: Milliseconds) -> Result<()>;
}
