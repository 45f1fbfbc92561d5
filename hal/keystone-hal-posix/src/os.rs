//! Operating system services on `std::thread`
//!
//! Block/unblock map onto thread parking. A park token delivered while the
//! target is running is kept, so an `unblock` that races ahead of the
//! matching `block` is never lost.
//!
//! Threads that were not created here are adopted on their first
//! `current_thread_id` call and forgotten again when they exit.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

use keystone_hal::{Bytes, Error, Id, Milliseconds, OperatingSystem, Priority, Result, ThreadStart};

/// Smallest stack handed to a host thread
///
/// Stack sizes chosen for a microcontroller are too small for host code.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Thread ids are unique for the whole process
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

struct Registered {
    thread: Thread,
    /// `None` for adopted threads
    handle: Option<JoinHandle<()>>,
}

type Registry = Mutex<HashMap<Id, Registered>>;

/// Per-thread id and the registries that adopted this thread
struct ThreadSlot {
    id: Cell<Option<Id>>,
    adopted_by: RefCell<Vec<Weak<Registry>>>,
}

impl ThreadSlot {
    fn id(&self) -> Id {
        self.id.get().unwrap_or_else(|| {
            let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            self.id.set(Some(id));
            id
        })
    }

    fn adopted(&self, registry: &Arc<Registry>) {
        let mut adopted_by = self.adopted_by.borrow_mut();
        adopted_by.retain(|registry| registry.strong_count() > 0);
        adopted_by.push(Arc::downgrade(registry));
    }
}

impl Drop for ThreadSlot {
    fn drop(&mut self) {
        let Some(id) = self.id.get() else {
            return;
        };
        for registry in self.adopted_by.get_mut().drain(..) {
            let Some(registry) = registry.upgrade() else {
                continue;
            };
            if let Ok(mut threads) = registry.lock() {
                if threads.get(&id).is_some_and(|entry| entry.handle.is_none()) {
                    threads.remove(&id);
                }
            };
        }
    }
}

thread_local! {
    static CURRENT: ThreadSlot = const {
        ThreadSlot {
            id: Cell::new(None),
            adopted_by: RefCell::new(Vec::new()),
        }
    };
}

fn current_slot_id() -> Option<Id> {
    CURRENT.try_with(|slot| slot.id.get()).ok().flatten()
}

/// Operating system backed by `std::thread`
///
/// Thread priorities are ignored; the host scheduler decides.
#[derive(Default)]
pub struct PosixOperatingSystem {
    threads: Arc<Registry>,
}

impl PosixOperatingSystem {
    /// Create an operating system handle with no known threads
    pub fn new() -> Self {
        Self::default()
    }

    fn threads(&self) -> Result<MutexGuard<'_, HashMap<Id, Registered>>> {
        self.threads.lock().map_err(|_| Error::Failure)
    }

    /// Number of threads this instance currently tracks
    pub fn known_threads(&self) -> usize {
        self.threads.lock().map_or(0, |threads| threads.len())
    }
}

impl OperatingSystem for PosixOperatingSystem {
    fn create_thread(
        &self,
        priority: Priority,
        name: &str,
        stack_size: Bytes,
        start: ThreadStart,
    ) -> Result<Id> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let stack_size = (stack_size as usize).max(MIN_STACK_SIZE);

        let mut threads = self.threads()?;
        let handle = thread::Builder::new()
            .name(name.into())
            .stack_size(stack_size)
            .spawn(move || {
                CURRENT.with(|slot| slot.id.set(Some(id)));
                start();
            })
            .map_err(|e| {
                log::error!("Failed to spawn thread {name}: {e}");
                Error::NoMemory
            })?;

        log::debug!("Created thread {name} ({id}) with {priority:?} priority");
        threads.insert(
            id,
            Registered {
                thread: handle.thread().clone(),
                handle: Some(handle),
            },
        );
        Ok(id)
    }

    fn join_thread(&self, thread: Id) -> Result<()> {
        if current_slot_id() == Some(thread) {
            return Err(Error::PrerequisitesNotMet);
        }

        let handle = self
            .threads()?
            .remove(&thread)
            .and_then(|registered| registered.handle)
            .ok_or(Error::NoData)?;
        handle.join().map_err(|_| {
            log::error!("Thread {thread} panicked");
            Error::Failure
        })
    }

    fn detach_thread(&self, thread: Id) -> Result<()> {
        let registered = self.threads()?.remove(&thread).ok_or(Error::NoData)?;
        log::debug!("Detached thread {thread}");
        drop(registered.handle);
        Ok(())
    }

    fn current_thread_id(&self) -> Result<Id> {
        let id = CURRENT.try_with(ThreadSlot::id).map_err(|_| Error::Failure)?;

        // A thread may be known to another instance but not to this one
        let mut threads = self.threads()?;
        if let Entry::Vacant(entry) = threads.entry(id) {
            entry.insert(Registered {
                thread: thread::current(),
                handle: None,
            });
            CURRENT
                .try_with(|slot| slot.adopted(&self.threads))
                .map_err(|_| Error::Failure)?;
        }
        Ok(id)
    }

    fn block(&self) -> Result<()> {
        thread::park();
        Ok(())
    }

    fn unblock(&self, thread: Id) -> Result<()> {
        match self.threads()?.get(&thread) {
            Some(registered) => {
                registered.thread.unpark();
                Ok(())
            }
            None => Err(Error::NoData),
        }
    }

    fn delay(&self, delay: Milliseconds) -> Result<()> {
        thread::sleep(Duration::from_millis(delay.into()));
        Ok(())
    }
}
