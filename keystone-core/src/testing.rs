//! Test doubles: an in-memory media driver and an instrumented scheduler

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::sync::{Mutex, MutexGuard};

use keystone_hal::{
    Bytes, Error, FileOffset, Id, MediaDriver, Medium, Milliseconds, NativeFile, OpenMode,
    OperatingSystem, Priority, Result, SeekFrom, Space, ThreadStart,
};
use keystone_hal_posix::PosixOperatingSystem;

const CAPACITY: Bytes = 1024 * 1024;

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    directories: Vec<String>,
    native_opens: usize,
    open_handles: usize,
    flushes: usize,
    clears: usize,
    fail_init: Option<Error>,
    fail_seek: bool,
    fail_write: bool,
    fail_flush: bool,
}

/// Contents and counters shared by a [`MemoryMedia`] and its files
#[derive(Default)]
pub struct MemoryState {
    inner: Mutex<Inner>,
}

impl MemoryState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn insert_file(&self, path: &str, contents: &[u8]) {
        self.lock().files.insert(path.into(), contents.to_vec());
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn directories(&self) -> Vec<String> {
        self.lock().directories.clone()
    }

    pub fn native_opens(&self) -> usize {
        self.lock().native_opens
    }

    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    pub fn clears(&self) -> usize {
        self.lock().clears
    }

    pub fn fail_init(&self, error: Error) {
        self.lock().fail_init = Some(error);
    }

    pub fn fail_next_seek(&self) {
        self.lock().fail_seek = true;
    }

    pub fn fail_next_write(&self) {
        self.lock().fail_write = true;
    }

    pub fn fail_next_flush(&self) {
        self.lock().fail_flush = true;
    }
}

/// Media driver keeping every file in memory
pub struct MemoryMedia {
    root: String,
    state: Arc<MemoryState>,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::with_root("/mem")
    }

    pub fn with_root(root: &str) -> Self {
        Self {
            root: root.into(),
            state: Arc::new(MemoryState::default()),
        }
    }

    pub fn state(&self) -> Arc<MemoryState> {
        self.state.clone()
    }
}

impl MediaDriver for MemoryMedia {
    type File = MemoryFile;

    fn init(&mut self, _medium: Medium) -> Result<String> {
        match self.state.lock().fail_init.take() {
            Some(error) => Err(error),
            None => Ok(self.root.clone()),
        }
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        let mut inner = self.state.lock();
        if !inner.directories.iter().any(|directory| directory == path) {
            inner.directories.push(path.into());
        }
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<MemoryFile> {
        let mut inner = self.state.lock();
        let exists = inner.files.contains_key(path);
        if mode.file_must_exist() && !exists {
            return Err(Error::FileNotFound);
        }
        if mode.file_must_not_exist() && exists {
            return Err(Error::FileExists);
        }

        let contents = inner.files.entry(path.into()).or_default();
        if mode.should_truncate() {
            contents.clear();
        }
        inner.native_opens += 1;
        inner.open_handles += 1;

        Ok(MemoryFile {
            state: self.state.clone(),
            path: path.into(),
            position: 0,
            failed: false,
        })
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        self.state
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or(Error::FileNotFound)
    }

    fn space(&mut self, _path: &str) -> Result<Space> {
        let used: usize = self.state.lock().files.values().map(Vec::len).sum();
        Ok(Space {
            capacity: CAPACITY,
            available: CAPACITY.saturating_sub(used as Bytes),
        })
    }
}

/// Handle into a [`MemoryMedia`] file with sticky error state
pub struct MemoryFile {
    state: Arc<MemoryState>,
    path: String,
    position: FileOffset,
    failed: bool,
}

impl MemoryFile {
    fn check(&mut self, injected: bool) -> Result<()> {
        if injected {
            self.failed = true;
        }
        if self.failed {
            return Err(Error::Failure);
        }
        Ok(())
    }
}

impl NativeFile for MemoryFile {
    fn seek(&mut self, position: SeekFrom) -> Result<FileOffset> {
        let injected = core::mem::take(&mut self.state.lock().fail_seek);
        self.check(injected)?;

        let length = self.state.contents(&self.path).map_or(0, |c| c.len()) as i64;
        let target = match position {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => length + delta,
            SeekFrom::Current(delta) => self.position as i64 + delta,
        };
        if target < 0 {
            self.failed = true;
            return Err(Error::Failure);
        }
        self.position = target as FileOffset;
        Ok(self.position)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.check(false)?;
        let inner = self.state.lock();
        let contents = inner.files.get(&self.path).ok_or(Error::FileNotFound)?;
        let start = (self.position as usize).min(contents.len());
        let count = buffer.len().min(contents.len() - start);
        buffer[..count].copy_from_slice(&contents[start..start + count]);
        drop(inner);
        self.position += count as FileOffset;
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let injected = core::mem::take(&mut self.state.lock().fail_write);
        self.check(injected)?;

        let mut inner = self.state.lock();
        let contents = inner.files.entry(self.path.clone()).or_default();
        let start = self.position as usize;
        if contents.len() < start + data.len() {
            contents.resize(start + data.len(), 0);
        }
        contents[start..start + data.len()].copy_from_slice(data);
        drop(inner);
        self.position += data.len() as FileOffset;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let injected = core::mem::take(&mut self.state.lock().fail_flush);
        self.check(injected)?;
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn clear_error(&mut self) {
        self.failed = false;
        self.state.lock().clears += 1;
    }

    fn close(self) -> Result<()> {
        self.state.lock().open_handles -= 1;
        Ok(())
    }
}

/// Posix scheduler that counts how often each thread parks
pub struct CountingOs {
    os: PosixOperatingSystem,
    blocks: Mutex<BTreeMap<Id, usize>>,
}

impl CountingOs {
    pub fn new() -> Self {
        Self {
            os: PosixOperatingSystem::new(),
            blocks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Threads the underlying scheduler tracks
    pub fn known_threads(&self) -> usize {
        self.os.known_threads()
    }

    /// Number of `block` calls made by `thread`
    pub fn blocks(&self, thread: Id) -> usize {
        self.blocks
            .lock()
            .unwrap()
            .get(&thread)
            .copied()
            .unwrap_or(0)
    }
}

impl OperatingSystem for CountingOs {
    fn create_thread(
        &self,
        priority: Priority,
        name: &str,
        stack_size: Bytes,
        start: ThreadStart,
    ) -> Result<Id> {
        self.os.create_thread(priority, name, stack_size, start)
    }

    fn join_thread(&self, thread: Id) -> Result<()> {
        self.os.join_thread(thread)
    }

    fn detach_thread(&self, thread: Id) -> Result<()> {
        self.os.detach_thread(thread)
    }

    fn current_thread_id(&self) -> Result<Id> {
        self.os.current_thread_id()
    }

    fn block(&self) -> Result<()> {
        let me = self.os.current_thread_id()?;
        *self.blocks.lock().unwrap().entry(me).or_insert(0) += 1;
        self.os.block()
    }

    fn unblock(&self, thread: Id) -> Result<()> {
        self.os.unblock(thread)
    }

    fn delay(&self, milliseconds: Milliseconds) -> Result<()> {
        self.os.delay(milliseconds)
    }
}
