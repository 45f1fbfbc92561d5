//! Parking ticket for blocking calls
//!
//! A blocked caller and the event it submitted share one [`Ticket`]. The
//! worker stores the outcome in the ticket and then unblocks the caller by
//! thread id; the caller re-checks the ticket every time it wakes. The
//! ticket lives on the heap and is jointly owned, so the worker can complete
//! it even if the caller stopped waiting.
//!
//! The event side holds a [`Completion`]. If the event is dropped without
//! running, or unwinds, the completion fails the ticket so the caller is
//! never left parked.

use alloc::sync::Arc;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use keystone_hal::{Error, Id, OperatingSystem, Result};

/// Completion slot shared between a parked caller and its event
pub struct Ticket<T> {
    waiter: Id,
    outcome: Mutex<CriticalSectionRawMutex, RefCell<Option<T>>>,
}

impl<T> Ticket<T> {
    /// Create an empty ticket for the thread `waiter`
    pub fn new(waiter: Id) -> Self {
        Self {
            waiter,
            outcome: Mutex::new(RefCell::new(None)),
        }
    }

    /// Thread that waits on this ticket
    pub fn waiter(&self) -> Id {
        self.waiter
    }

    /// Store the outcome and wake the waiter
    pub fn complete<O: OperatingSystem + ?Sized>(&self, os: &O, value: T) -> Result<()> {
        self.outcome.lock(|outcome| *outcome.borrow_mut() = Some(value));
        os.unblock(self.waiter)
    }

    /// Check if the outcome has been stored
    pub fn is_done(&self) -> bool {
        self.outcome.lock(|outcome| outcome.borrow().is_some())
    }

    /// Take the stored outcome, if any
    pub fn take(&self) -> Option<T> {
        self.outcome.lock(|outcome| outcome.borrow_mut().take())
    }

    /// Block the calling thread until the outcome is stored
    ///
    /// Wake-ups that are not for this ticket are absorbed by re-checking.
    pub fn wait<O: OperatingSystem + ?Sized>(&self, os: &O) -> Result<T> {
        loop {
            if let Some(value) = self.take() {
                return Ok(value);
            }
            os.block()?;
        }
    }
}

/// Event-side handle of a ticket whose outcome is a [`Result`]
///
/// Dropping it without calling [`complete`](Completion::complete) stores
/// `Err(Failure)` and wakes the waiter.
pub struct Completion<T, O: OperatingSystem> {
    ticket: Arc<Ticket<Result<T>>>,
    os: Arc<O>,
    pending: bool,
}

impl<T, O: OperatingSystem> Completion<T, O> {
    /// Bind a completion to `ticket`
    pub fn new(ticket: Arc<Ticket<Result<T>>>, os: Arc<O>) -> Self {
        Self {
            ticket,
            os,
            pending: true,
        }
    }

    /// Store `value` and wake the waiter
    pub fn complete(mut self, value: T) -> Result<()> {
        self.pending = false;
        self.ticket.complete(&*self.os, Ok(value))
    }
}

impl<T, O: OperatingSystem> Drop for Completion<T, O> {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        warn!("Event for thread {} ended without an outcome", self.ticket.waiter());
        if let Err(error) = self.ticket.complete(&*self.os, Err(Error::Failure)) {
            warn!("Failed to wake thread {}: {}", self.ticket.waiter(), error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use keystone_hal_posix::PosixOperatingSystem;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_complete_before_wait() {
        let os = PosixOperatingSystem::new();
        let ticket = Ticket::new(os.current_thread_id().unwrap());

        ticket.complete(&os, 7u32).unwrap();
        assert!(ticket.is_done());
        assert_eq!(ticket.wait(&os), Ok(7));
        assert!(!ticket.is_done());
    }

    #[test]
    fn test_wait_parks_until_completed() {
        let os = Arc::new(PosixOperatingSystem::new());
        let ticket = Arc::new(Ticket::new(os.current_thread_id().unwrap()));

        let worker = {
            let os = os.clone();
            let ticket = ticket.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ticket.complete(&*os, "done").unwrap();
            })
        };

        assert_eq!(ticket.wait(&*os), Ok("done"));
        worker.join().unwrap();
    }

    #[test]
    fn test_stray_wake_is_absorbed() {
        let os = Arc::new(PosixOperatingSystem::new());
        let me = os.current_thread_id().unwrap();
        let ticket = Arc::new(Ticket::new(me));

        // A wake that belongs to nobody's ticket
        os.unblock(me).unwrap();

        let worker = {
            let os = os.clone();
            let ticket = ticket.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ticket.complete(&*os, 3u8).unwrap();
            })
        };

        assert_eq!(ticket.wait(&*os), Ok(3));
        worker.join().unwrap();
    }

    #[test]
    fn test_completion_delivers_value() {
        let os = Arc::new(PosixOperatingSystem::new());
        let ticket = Arc::new(Ticket::new(os.current_thread_id().unwrap()));
        let completion = Completion::new(ticket.clone(), os.clone());

        thread::spawn(move || completion.complete(5u8).unwrap())
            .join()
            .unwrap();
        assert_eq!(ticket.wait(&*os), Ok(Ok(5)));
        assert!(!ticket.is_done());
    }

    #[test]
    fn test_unwinding_completion_fails_ticket() {
        let os = Arc::new(PosixOperatingSystem::new());
        let ticket = Arc::new(Ticket::<Result<u8>>::new(os.current_thread_id().unwrap()));
        let completion = Completion::new(ticket.clone(), os.clone());

        let worker = thread::spawn(move || {
            let _completion = completion;
            panic!("event failed");
        });
        assert_eq!(ticket.wait(&*os), Ok(Err(Error::Failure)));
        assert!(worker.join().is_err());
    }
}
