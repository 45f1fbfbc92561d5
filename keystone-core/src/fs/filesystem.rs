//! File system facade
//!
//! [`FileSystem`] is the surface application code talks to. Every operation
//! is packaged as an event for the storage worker. Blocking operations park
//! the caller until the worker has run the event; non-blocking ones return
//! after submission and report through a callback invoked on the worker.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use keystone_hal::fs::partition_name;
use keystone_hal::{
    Bytes, Error, File, Implementation, MediaDriver, OpenMode, OperatingSystem, PartitionName,
    Result, Status,
};

use crate::fs::partition::Volume;
use crate::storage::{Storage, StorageContext};

/// One partition of a storage medium
pub struct FileSystem<D: MediaDriver, O: OperatingSystem + 'static> {
    storage: Arc<Storage<D, O>>,
    implementation: Implementation,
    partition: PartitionName,
}

impl<D: MediaDriver, O: OperatingSystem + 'static> FileSystem<D, O> {
    /// Create a file system on `storage`
    ///
    /// Nothing is touched until [`mount`](Self::mount).
    ///
    /// # Errors
    /// `InvalidParameter` if `partition` is not a valid partition name.
    pub fn new(
        storage: Arc<Storage<D, O>>,
        implementation: Implementation,
        partition: &str,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            implementation,
            partition: partition_name(partition)?,
        })
    }

    /// Requested on-medium format
    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    /// Partition name
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Storage this file system lives on
    pub fn storage(&self) -> &Arc<Storage<D, O>> {
        &self.storage
    }

    fn dispatch<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Volume<'_, D>) -> T + Send + 'static,
    {
        let partition = self.partition.clone();
        self.storage
            .run_blocking(move |context| operation(&mut context.volume(&partition)))
    }

    fn submit<F>(&self, operation: F) -> Result<()>
    where
        F: FnOnce(&mut Volume<'_, D>) -> Result<()> + Send + 'static,
    {
        let partition = self.partition.clone();
        self.storage
            .add_event(Box::new(move |context: &mut StorageContext<D>| {
                operation(&mut context.volume(&partition))
            }))
    }

    /// Mount the partition below the storage's root prefix
    ///
    /// Idempotent. Creates the mount point directory if needed.
    pub fn mount(&self) -> Result<()> {
        self.dispatch(|volume| volume.mount())?
    }

    /// Close every open file and unmount
    pub fn unmount(&self) -> Result<()> {
        self.dispatch(|volume| volume.unmount())?
    }

    /// Total capacity of the medium holding the partition
    pub fn max_partition_size(&self) -> Result<Bytes> {
        self.dispatch(|volume| volume.space().map(|space| space.capacity))?
    }

    /// Capacity still available on the medium holding the partition
    pub fn available_partition(&self) -> Result<Bytes> {
        self.dispatch(|volume| volume.space().map(|space| space.available))?
    }

    /// Erase the partition
    ///
    /// Not implemented by this core.
    pub fn erase_partition(&self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Snapshot of the partition status
    pub fn status(&self) -> Result<Status> {
        self.dispatch(|volume| volume.status())
    }

    /// Open `path` relative to the mount point
    ///
    /// Opening a path that is already open reuses the existing native
    /// handle.
    pub fn open(&self, path: &str, mode: OpenMode, file: &mut File) -> Result<()> {
        let path = String::from(path);
        let mut working = file.clone();
        let (result, working) = self.dispatch(move |volume| {
            let result = volume.open(&path, mode, &mut working);
            (result, working)
        })?;
        *file = working;
        result
    }

    /// Flush and close a file
    pub fn close(&self, file: &mut File) -> Result<()> {
        self.with_file(file, |volume, file| volume.close(file))
    }

    /// Close and delete a file
    pub fn remove(&self, file: &mut File) -> Result<()> {
        self.with_file(file, |volume, file| volume.remove(file))
    }

    /// Flush a file
    pub fn synchronize(&self, file: &File) -> Result<()> {
        let file = file.clone();
        self.dispatch(move |volume| volume.synchronize(&file))?
    }

    /// Refresh `file.size` from the medium
    pub fn size(&self, file: &mut File) -> Result<()> {
        self.with_file(file, |volume, file| volume.size(file))
    }

    /// Read at the file pointer, filling `buffer`
    ///
    /// `buffer` is shrunk to the bytes read and the file pointer advances by
    /// as many. Fewer bytes than requested ends with `EndOfFile`.
    ///
    /// # Panics
    /// If `buffer` is empty.
    pub fn read_blocking(&self, file: &mut File, buffer: &mut Vec<u8>) -> Result<()> {
        assert!(!buffer.is_empty(), "read buffer must not be empty");
        let length = buffer.len();
        let mut working = file.clone();
        let (result, working, data) = self.dispatch(move |volume| {
            let mut data = vec![0; length];
            let result = volume.read(&mut working, &mut data);
            (result, working, data)
        })?;
        *file = working;
        *buffer = data;
        result
    }

    /// Write `data` at the file pointer and flush
    pub fn write_blocking(&self, file: &mut File, data: &[u8]) -> Result<()> {
        let data = data.to_vec();
        self.with_file(file, move |volume, file| volume.write(file, &data))
    }

    /// Queue a read and return immediately
    ///
    /// `callback` runs on the storage worker with the outcome, the updated
    /// file and the bytes read. The returned result only covers submission.
    ///
    /// # Panics
    /// If `buffer` is empty.
    pub fn read_non_blocking<C>(&self, file: &File, mut buffer: Vec<u8>, callback: C) -> Result<()>
    where
        C: FnOnce(Result<()>, File, Vec<u8>) + Send + 'static,
    {
        assert!(!buffer.is_empty(), "read buffer must not be empty");
        let mut file = file.clone();
        self.submit(move |volume| {
            let result = volume.read(&mut file, &mut buffer);
            callback(result, file, buffer);
            result
        })
    }

    /// Queue a write and return immediately
    ///
    /// `callback` runs on the storage worker with the outcome, the updated
    /// file and the number of bytes written. The returned result only covers
    /// submission.
    pub fn write_non_blocking<C>(&self, file: &File, data: Vec<u8>, callback: C) -> Result<()>
    where
        C: FnOnce(Result<()>, File, Bytes) + Send + 'static,
    {
        let mut file = file.clone();
        self.submit(move |volume| {
            let start = file.file_pointer;
            let result = volume.write(&mut file, &data);
            let written = file.file_pointer.saturating_sub(start);
            callback(result, file, written);
            result
        })
    }

    /// Run a file operation on the worker and copy the updated file back
    fn with_file<F>(&self, file: &mut File, operation: F) -> Result<()>
    where
        F: FnOnce(&mut Volume<'_, D>, &mut File) -> Result<()> + Send + 'static,
    {
        let mut working = file.clone();
        let (result, working) = self.dispatch(move |volume| {
            let result = operation(volume, &mut working);
            (result, working)
        })?;
        *file = working;
        result
    }
}
