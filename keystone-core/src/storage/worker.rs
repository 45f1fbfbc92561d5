//! Storage worker thread
//!
//! Each [`Storage`] owns exactly one worker thread, created through the
//! injected [`OperatingSystem`]. The worker owns the [`StorageContext`] and
//! drains the storage's event queue; callers never touch the media driver.
//!
//! ```text
//! caller threads                       worker thread
//! ──────────────                       ─────────────
//! add_event ──push──▶ [EventQueue] ──pop──▶ event(&mut StorageContext)
//!     └─────────── unblock(worker) ──────▶ block() returns
//! run_blocking ─ wait on Ticket ◀── complete(ticket) ── event done
//! ```

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use keystone_hal::{
    Bytes, Error, Id, MediaDriver, Medium, OperatingSystem, Priority, Result, StorageStatus,
};

use crate::event::{Completion, Event, EventQueue, Ticket};
use crate::storage::StorageContext;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length of a worker thread name
pub const WORKER_NAME_LENGTH: usize = 16;

/// Default stack size of a worker thread
pub const DEFAULT_STACK_SIZE: Bytes = 8 * 1024;

/// Worker thread settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorkerConfig {
    /// Thread name
    pub name: heapless::String<WORKER_NAME_LENGTH>,
    /// Thread priority
    pub priority: Priority,
    /// Stack size
    pub stack_size: Bytes,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let mut name = heapless::String::new();
        let _ = name.push_str("storage");
        Self {
            name,
            priority: Priority::Normal,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// State shared between a [`Storage`] handle and its worker
struct Shared<D: MediaDriver> {
    queue: EventQueue<StorageContext<D>>,
    running: AtomicBool,
    /// Cleared once the worker loop has exited, normally or by unwinding
    alive: AtomicBool,
}

impl<D: MediaDriver> Shared<D> {
    /// Drop every queued event without running it
    fn discard_events(&self) -> usize {
        let mut discarded = 0;
        while self.queue.next_event().is_some() {
            discarded += 1;
        }
        discarded
    }
}

/// Marks the worker as gone when the worker loop is left
struct WorkerExit<'a, D: MediaDriver> {
    shared: &'a Shared<D>,
}

impl<D: MediaDriver> Drop for WorkerExit<'_, D> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        let discarded = self.shared.discard_events();
        if discarded > 0 {
            warn!("Storage worker exited with {} queued event(s)", discarded);
        }
    }
}

/// A storage medium and the worker thread that serializes access to it
pub struct Storage<D: MediaDriver, O: OperatingSystem + 'static> {
    medium: Medium,
    shared: Arc<Shared<D>>,
    os: Arc<O>,
    worker: Id,
}

impl<D: MediaDriver, O: OperatingSystem + 'static> Storage<D, O> {
    /// Create a storage and start its worker
    ///
    /// The medium is not initialized yet; call [`init`](Self::init).
    pub fn new(medium: Medium, driver: D, os: Arc<O>, config: &WorkerConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: EventQueue::new(),
            running: AtomicBool::new(true),
            alive: AtomicBool::new(true),
        });
        let context = StorageContext::new(medium, driver);

        let worker_shared = shared.clone();
        let worker_os = os.clone();
        let worker = os.create_thread(
            config.priority,
            &config.name,
            config.stack_size,
            Box::new(move || run_worker(&worker_shared, &*worker_os, context)),
        )?;
        debug!("Storage worker {} created for {}", worker, medium.as_str());

        Ok(Self {
            medium,
            shared,
            os,
            worker,
        })
    }

    /// Medium behind this storage
    pub fn medium(&self) -> Medium {
        self.medium
    }

    /// Id of the worker thread
    pub fn worker_id(&self) -> Id {
        self.worker
    }

    /// Check if the worker thread is still draining events
    pub fn is_worker_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Operating system the worker runs on
    pub fn os(&self) -> &Arc<O> {
        &self.os
    }

    /// Queue an event for the worker
    ///
    /// Never blocks. The event runs later on the worker thread.
    ///
    /// # Errors
    /// * `LimitReached` if the queue is full. The event is dropped.
    /// * `NotAvailable` if the worker has exited. The event is dropped.
    pub fn add_event(&self, event: Event<StorageContext<D>>) -> Result<()> {
        if !self.is_worker_alive() {
            return Err(Error::NotAvailable);
        }
        self.shared.queue.add_event(event)?;
        if !self.is_worker_alive() {
            // The worker exited after the check above and will not drain
            self.shared.discard_events();
            return Err(Error::NotAvailable);
        }
        self.wake_worker();
        Ok(())
    }

    /// Run `operation` on the worker and wait for its value
    ///
    /// # Errors
    /// * `LimitReached` if the queue is full. The caller does not park.
    /// * `NotAvailable` if the worker has exited.
    /// * `PrerequisitesNotMet` if called from the worker itself, which could
    ///   never run the queued operation while it waits.
    /// * `Failure` if the operation unwound or was dropped without running.
    pub fn run_blocking<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StorageContext<D>) -> T + Send + 'static,
    {
        let caller = self.os.current_thread_id()?;
        if caller == self.worker {
            warn!("Blocking storage call from its own worker");
            return Err(Error::PrerequisitesNotMet);
        }

        let ticket = Arc::new(Ticket::new(caller));
        let completion = Completion::new(ticket.clone(), self.os.clone());
        self.add_event(Box::new(move |context: &mut StorageContext<D>| {
            let value = operation(context);
            completion.complete(value)
        }))?;

        ticket.wait(&*self.os)?
    }

    /// Initialize the medium
    pub fn init(&self) -> Result<()> {
        self.run_blocking(|context| context.init())?
    }

    /// Deinitialize the medium, closing every open file
    pub fn deinit(&self) -> Result<()> {
        self.run_blocking(|context| context.deinit())?
    }

    /// Current storage status
    pub fn status(&self) -> Result<StorageStatus> {
        self.run_blocking(|context| context.status())
    }

    /// Prefix below which partitions are mounted
    pub fn root_prefix(&self) -> Result<String> {
        self.run_blocking(|context| String::from(context.root_prefix()))
    }

    fn wake_worker(&self) {
        if let Err(error) = self.os.unblock(self.worker) {
            warn!("Failed to wake storage worker: {}", error);
        }
    }
}

impl<D: MediaDriver, O: OperatingSystem + 'static> Drop for Storage<D, O> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.wake_worker();

        match self.os.current_thread_id() {
            // Last handle released by one of our own events; the worker
            // exits once the queue is drained.
            Ok(current) if current == self.worker => {
                if let Err(error) = self.os.detach_thread(self.worker) {
                    warn!("Failed to detach storage worker: {}", error);
                }
            }
            _ => {
                if let Err(error) = self.os.join_thread(self.worker) {
                    warn!("Failed to join storage worker: {}", error);
                }
            }
        }
    }
}

/// Worker loop: run queued events, park when idle, stop once released
fn run_worker<D: MediaDriver, O: OperatingSystem + ?Sized>(
    shared: &Shared<D>,
    os: &O,
    mut context: StorageContext<D>,
) {
    let _exit = WorkerExit { shared };
    trace!("Storage worker running");
    loop {
        match shared.queue.next_event() {
            Some(event) => {
                if let Err(error) = event(&mut context) {
                    trace!("Storage event returned {}", error);
                }
            }
            None if !shared.running.load(Ordering::Acquire) => break,
            None => {
                if let Err(error) = os.block() {
                    error!("Storage worker cannot block: {}", error);
                    break;
                }
            }
        }
    }

    if let Err(error) = context.deinit() {
        warn!("Storage shutdown reported {}", error);
    }
    trace!("Storage worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingOs, MemoryMedia};
    use alloc::vec::Vec;
    use std::sync::{Barrier, Mutex};
    use std::thread;

    fn storage() -> (Storage<MemoryMedia, CountingOs>, Arc<CountingOs>) {
        let os = Arc::new(CountingOs::new());
        let storage =
            Storage::new(Medium::Flash, MemoryMedia::new(), os.clone(), &WorkerConfig::default())
                .unwrap();
        (storage, os)
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.name.as_str(), "storage");
        assert_eq!(config.priority, Priority::Normal);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn test_init_and_status() {
        let (storage, _) = storage();
        assert!(!storage.status().unwrap().is_initialized);

        storage.init().unwrap();
        assert!(storage.status().unwrap().is_initialized);
        assert_eq!(storage.root_prefix().unwrap(), "/mem");

        storage.deinit().unwrap();
        assert!(!storage.status().unwrap().is_initialized);
    }

    #[test]
    fn test_blocking_call_runs_on_worker() {
        let (storage, os) = storage();
        let worker = storage.worker_id();
        let ran_on = storage
            .run_blocking({
                let os = os.clone();
                move |_| os.current_thread_id().unwrap()
            })
            .unwrap();
        assert_eq!(ran_on, worker);
        assert_ne!(os.current_thread_id().unwrap(), worker);
    }

    #[test]
    fn test_events_run_in_global_submission_order() {
        const THREADS: usize = 4;
        const PER_THREAD: u32 = 25;

        let (storage, _) = storage();
        let storage = Arc::new(storage);
        let log = Arc::new(Mutex::new(Vec::new()));
        // Serializes submissions and hands out their global sequence numbers
        let submitted = Arc::new(Mutex::new(0u32));
        let barrier = Arc::new(Barrier::new(THREADS));

        let callers: Vec<_> = (0..THREADS)
            .map(|_| {
                let storage = storage.clone();
                let log = log.clone();
                let submitted = submitted.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut accepted = 0;
                    while accepted < PER_THREAD {
                        let mut next = submitted.lock().unwrap();
                        let sequence = *next;
                        let log = log.clone();
                        let event: Event<StorageContext<MemoryMedia>> =
                            Box::new(move |_: &mut StorageContext<MemoryMedia>| {
                                log.lock().unwrap().push(sequence);
                                Ok(())
                            });
                        match storage.add_event(event) {
                            Ok(()) => {
                                *next += 1;
                                accepted += 1;
                            }
                            Err(Error::LimitReached) => {
                                drop(next);
                                thread::yield_now();
                            }
                            Err(error) => panic!("unexpected {error:?}"),
                        }
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }

        // Runs after everything submitted above
        storage.run_blocking(|_| ()).unwrap();
        let expected: Vec<u32> = (0..THREADS as u32 * PER_THREAD).collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[test]
    fn test_full_queue_fails_without_parking() {
        let (storage, os) = storage();
        let storage = Arc::new(storage);
        let gate = Arc::new(Barrier::new(2));

        // Hold the worker inside an event so the queue can fill up
        {
            let gate = gate.clone();
            storage
                .add_event(Box::new(move |_: &mut StorageContext<MemoryMedia>| {
                    gate.wait();
                    Ok(())
                }))
                .unwrap();
        }
        while storage.shared.queue.len() > 0 {
            thread::yield_now();
        }
        for _ in 0..crate::event::MAX_EVENTS {
            storage
                .add_event(Box::new(|_: &mut StorageContext<MemoryMedia>| Ok(())))
                .unwrap();
        }

        let me = os.current_thread_id().unwrap();
        let blocks = os.blocks(me);
        assert_eq!(storage.status(), Err(Error::LimitReached));
        assert_eq!(os.blocks(me), blocks);

        gate.wait();
        assert!(storage.status().is_ok());
    }

    #[test]
    fn test_blocking_call_from_worker_is_rejected() {
        let (storage, _) = storage();
        let storage = Arc::new(storage);
        let outcome = Arc::new(Mutex::new(None));

        {
            let inner = storage.clone();
            let outcome = outcome.clone();
            storage
                .run_blocking(move |_| {
                    *outcome.lock().unwrap() = Some(inner.status());
                    drop(inner);
                })
                .unwrap();
        }
        assert_eq!(*outcome.lock().unwrap(), Some(Err(Error::PrerequisitesNotMet)));
    }

    #[test]
    fn test_panicking_event_fails_caller_and_stops_worker() {
        let (storage, _) = storage();
        assert_eq!(
            storage.run_blocking(|_| -> u32 { panic!("event failed") }),
            Err(Error::Failure)
        );

        while storage.is_worker_alive() {
            thread::yield_now();
        }
        assert_eq!(storage.status(), Err(Error::NotAvailable));
        assert_eq!(
            storage.add_event(Box::new(|_: &mut StorageContext<MemoryMedia>| Ok(()))),
            Err(Error::NotAvailable)
        );
    }

    #[test]
    fn test_events_queued_behind_a_panic_fail() {
        let (storage, _) = storage();
        let storage = Arc::new(storage);
        let gate = Arc::new(Barrier::new(2));

        {
            let gate = gate.clone();
            storage
                .add_event(Box::new(
                    move |_: &mut StorageContext<MemoryMedia>| -> Result<()> {
                        gate.wait();
                        panic!("event failed")
                    },
                ))
                .unwrap();
        }
        // Worker is holding the panicking event
        while !storage.shared.queue.is_empty() {
            thread::yield_now();
        }
        let waiter = {
            let storage = storage.clone();
            thread::spawn(move || storage.status())
        };
        while storage.shared.queue.is_empty() {
            thread::yield_now();
        }
        gate.wait();

        assert_eq!(waiter.join().unwrap(), Err(Error::Failure));
        assert!(!storage.is_worker_alive());
    }

    #[test]
    fn test_worker_dropping_last_handle_is_detached() {
        let (storage, os) = storage();
        let storage = Arc::new(storage);
        let gate = Arc::new(Barrier::new(2));
        let (sender, receiver) = std::sync::mpsc::channel();

        {
            let inner = storage.clone();
            let gate = gate.clone();
            storage
                .add_event(Box::new(move |_: &mut StorageContext<MemoryMedia>| {
                    gate.wait();
                    drop(inner);
                    sender.send(()).unwrap();
                    Ok(())
                }))
                .unwrap();
        }
        drop(storage);
        gate.wait();

        receiver.recv().unwrap();
        assert_eq!(os.known_threads(), 0);
    }

    #[test]
    fn test_drop_stops_and_joins_worker() {
        let (storage, os) = storage();
        storage.init().unwrap();
        let worker = storage.worker_id();
        drop(storage);
        assert_eq!(os.join_thread(worker), Err(Error::NoData));
    }
}
