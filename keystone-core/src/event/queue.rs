//! Bounded FIFO of deferred work
//!
//! Any number of producer threads may add events; exactly one consumer (the
//! worker that owns the context `C`) removes and runs them. Events run
//! outside the queue lock so an event may itself add more events.

use alloc::boxed::Box;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;
use keystone_hal::{Error, Result};

/// Default number of events a queue can hold
pub const MAX_EVENTS: usize = 10;

/// A unit of deferred work
///
/// Runs exactly once on the worker, with exclusive access to the worker's
/// context, and reports how it went.
pub type Event<C> = Box<dyn FnOnce(&mut C) -> Result<()> + Send + 'static>;

/// FIFO queue of [`Event`]s
pub struct EventQueue<C, const N: usize = MAX_EVENTS> {
    events: Mutex<CriticalSectionRawMutex, RefCell<Deque<Event<C>, N>>>,
}

impl<C, const N: usize> EventQueue<C, N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Append an event
    ///
    /// # Errors
    /// `LimitReached` if the queue already holds `N` events. The event is
    /// dropped without running.
    pub fn add_event(&self, event: Event<C>) -> Result<()> {
        self.events.lock(|events| {
            events
                .borrow_mut()
                .push_back(event)
                .map_err(|_| Error::LimitReached)
        })
    }

    /// Remove the oldest event
    ///
    /// Only the owning worker may call this.
    pub fn next_event(&self) -> Option<Event<C>> {
        self.events.lock(|events| events.borrow_mut().pop_front())
    }

    /// Run the oldest event against `context`
    ///
    /// # Returns
    /// The result of the event, or `NoData` if the queue was empty.
    pub fn run_next_event(&self, context: &mut C) -> Result<()> {
        let event = self.next_event().ok_or(Error::NoData)?;
        event(context)
    }

    /// Number of events waiting
    pub fn len(&self) -> usize {
        self.events.lock(|events| events.borrow().len())
    }

    /// Check if no events are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of events the queue can hold
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<C, const N: usize> Default for EventQueue<C, N> {
    fn default() -> Self {
        Self::new()
    }
}
