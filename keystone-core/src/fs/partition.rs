//! Worker-side file system state
//!
//! Everything in this module runs on the storage worker thread. The open
//! file table and the mount state of each partition are owned by the
//! worker's context and are never touched by caller threads, which only see
//! copies of [`File`] travelling inside events.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use keystone_hal::{
    Bytes, Count, Error, File, FileOffset, MediaDriver, NativeFile, OpenMode, Percent, Result,
    SeekFrom, Space, Status, StorageStatus,
};

/// Native handle tracked for one open path
struct OpenFile<F> {
    handle: F,
    mode: OpenMode,
    size: Bytes,
}

/// Mount state and open file table of one partition
pub(crate) struct Partition<F> {
    mount_prefix: Option<String>,
    open_files: BTreeMap<String, OpenFile<F>>,
}

impl<F: NativeFile> Partition<F> {
    pub(crate) fn new() -> Self {
        Self {
            mount_prefix: None,
            open_files: BTreeMap::new(),
        }
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mount_prefix.is_some()
    }

    pub(crate) fn opened_files(&self) -> Count {
        self.open_files.len() as Count
    }

    /// Flush and close every open handle
    ///
    /// Keeps going after a failure and reports the first one.
    pub(crate) fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for (path, mut entry) in core::mem::take(&mut self.open_files) {
            let result = synchronize_entry(&mut entry).and_then(|()| entry.handle.close());
            if let Err(error) = result {
                warn!("Failed to close {}: {}", path.as_str(), error);
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Join a directory prefix and a relative component with exactly one `/`
pub(crate) fn join_path(prefix: &str, component: &str) -> String {
    let component = component.trim_start_matches('/');
    let mut path = String::with_capacity(prefix.len() + 1 + component.len());
    path.push_str(prefix);
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(component);
    path
}

/// Where the file pointer starts after opening in `mode`
fn initial_file_pointer(mode: OpenMode, size: Bytes) -> FileOffset {
    if mode.can_write() {
        size
    } else {
        0
    }
}

/// Size of a native file, leaving its position where it was
fn measure<F: NativeFile>(handle: &mut F) -> Result<Bytes> {
    let result = seek_to_end_and_back(handle);
    handle.clear_error();
    result
}

fn seek_to_end_and_back<F: NativeFile>(handle: &mut F) -> Result<Bytes> {
    let original = handle.seek(SeekFrom::Current(0))?;
    let end = handle.seek(SeekFrom::End(0))?;
    handle.seek(SeekFrom::Start(original))?;
    Ok(end)
}

fn synchronize_entry<F: NativeFile>(entry: &mut OpenFile<F>) -> Result<()> {
    match entry.handle.flush() {
        Ok(()) => Ok(()),
        Err(_) if !entry.mode.can_write() => {
            // Nothing was written, so there was nothing to flush
            entry.handle.clear_error();
            Ok(())
        }
        Err(error) => {
            warn!("Flush failed: {}", error);
            entry.handle.clear_error();
            Err(Error::Failure)
        }
    }
}

/// A partition together with the parts of the storage context it needs
pub(crate) struct Volume<'a, D: MediaDriver> {
    pub(crate) driver: &'a mut D,
    pub(crate) storage: StorageStatus,
    pub(crate) root_prefix: &'a str,
    pub(crate) name: &'a str,
    pub(crate) partition: &'a mut Partition<D::File>,
}

impl<D: MediaDriver> Volume<'_, D> {
    fn absolute_path(&self, path: &str) -> Result<String> {
        let prefix = self
            .partition
            .mount_prefix
            .as_deref()
            .ok_or(Error::PrerequisitesNotMet)?;
        Ok(join_path(prefix, path))
    }

    /// Native handle behind `file`, if the caller's handle is still open
    fn open_entry(&mut self, file: &File) -> Result<&mut OpenFile<D::File>> {
        if !file.is_open {
            return Err(Error::PrerequisitesNotMet);
        }
        self.partition
            .open_files
            .get_mut(&file.path)
            .ok_or(Error::PrerequisitesNotMet)
    }

    /// Compose the mount point and create it on the medium
    pub(crate) fn mount(&mut self) -> Result<()> {
        if self.partition.is_mounted() {
            return Ok(());
        }
        if !self.storage.is_initialized {
            return Err(Error::PrerequisitesNotMet);
        }

        let prefix = join_path(self.root_prefix, self.name);
        self.driver.create_dir(&prefix)?;
        info!("Mounted {} at {}", self.name, prefix.as_str());
        self.partition.mount_prefix = Some(prefix);
        Ok(())
    }

    pub(crate) fn unmount(&mut self) -> Result<()> {
        if !self.partition.is_mounted() {
            return Ok(());
        }
        let result = self.partition.close_all();
        self.partition.mount_prefix = None;
        info!("Unmounted {}", self.name);
        result
    }

    pub(crate) fn space(&mut self) -> Result<Space> {
        let prefix = self
            .partition
            .mount_prefix
            .as_deref()
            .ok_or(Error::PrerequisitesNotMet)?;
        self.driver.space(prefix)
    }

    pub(crate) fn status(&mut self) -> Status {
        let free_space = match self.space() {
            Ok(space) if space.capacity > 0 => {
                (space.available as Percent / space.capacity as Percent) * 100.0
            }
            _ => 0.0,
        };
        Status {
            mounted: self.partition.is_mounted(),
            free_space,
            opened_files: self.partition.opened_files(),
        }
    }

    pub(crate) fn open(&mut self, path: &str, mode: OpenMode, file: &mut File) -> Result<()> {
        if !self.storage.is_initialized {
            return Err(Error::PrerequisitesNotMet);
        }
        if path.is_empty() || mode == OpenMode::Unknown {
            return Err(Error::InvalidParameter);
        }

        if let Some(entry) = self.partition.open_files.get(path) {
            let reopened_same_handle = file.is_open && file.path == path;
            file.path = path.into();
            file.size = entry.size;
            file.open_mode = entry.mode;
            file.is_open = true;
            if !reopened_same_handle {
                file.file_pointer = initial_file_pointer(entry.mode, entry.size);
            }
            return Ok(());
        }

        let absolute = self.absolute_path(path)?;
        let mut handle = self.driver.open(&absolute, mode).map_err(|error| {
            debug!("Failed to open {}: {}", absolute.as_str(), error);
            error
        })?;

        let size = match measure(&mut handle) {
            Ok(size) => size,
            Err(error) => {
                let _ = handle.close();
                return Err(error);
            }
        };

        self.partition
            .open_files
            .insert(path.into(), OpenFile { handle, mode, size });

        file.path = path.into();
        file.size = size;
        file.open_mode = mode;
        file.file_pointer = initial_file_pointer(mode, size);
        file.is_open = true;
        trace!("Opened {} ({} bytes)", path, size);
        Ok(())
    }

    pub(crate) fn close(&mut self, file: &mut File) -> Result<()> {
        let Ok(entry) = self.open_entry(file) else {
            return Ok(());
        };
        synchronize_entry(entry)?;

        let result = match self.partition.open_files.remove(&file.path) {
            Some(entry) => entry.handle.close(),
            None => Ok(()),
        };
        file.open_mode = OpenMode::Unknown;
        file.is_open = false;
        result
    }

    pub(crate) fn remove(&mut self, file: &mut File) -> Result<()> {
        if file.path.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.close(file)?;

        let absolute = self.absolute_path(&file.path)?;
        self.driver.remove(&absolute)
    }

    /// Read `buffer.len()` bytes at the file pointer
    ///
    /// The buffer is shrunk to the bytes actually read. A short read reports
    /// `EndOfFile`.
    pub(crate) fn read(&mut self, file: &mut File, buffer: &mut Vec<u8>) -> Result<()> {
        let entry = match self.open_entry(file) {
            Ok(entry) if file.open_mode.can_read() => entry,
            _ => {
                buffer.clear();
                return Err(Error::PrerequisitesNotMet);
            }
        };

        if entry.handle.seek(SeekFrom::Start(file.file_pointer)).is_err() {
            entry.handle.clear_error();
            buffer.clear();
            return Err(Error::Failure);
        }

        let mut filled = 0;
        let result = loop {
            if filled == buffer.len() {
                break Ok(());
            }
            match entry.handle.read(&mut buffer[filled..]) {
                Ok(0) => break Err(Error::EndOfFile),
                Ok(count) => filled += count,
                Err(_) => {
                    entry.handle.clear_error();
                    break Err(Error::Failure);
                }
            }
        };

        buffer.truncate(filled);
        file.file_pointer = file.file_pointer.saturating_add(filled as FileOffset);
        result
    }

    /// Write `data` at the file pointer and flush
    pub(crate) fn write(&mut self, file: &mut File, data: &[u8]) -> Result<()> {
        let length = Bytes::try_from(data.len()).map_err(|_| Error::InvalidParameter)?;
        let entry = match self.open_entry(file) {
            Ok(entry) if file.open_mode.can_write() => entry,
            _ => return Err(Error::PrerequisitesNotMet),
        };

        let written = entry
            .handle
            .seek(SeekFrom::Start(file.file_pointer))
            .and_then(|_| entry.handle.write(data));
        if written.is_err() {
            entry.handle.clear_error();
            return Err(Error::Failure);
        }

        let end = file.file_pointer.saturating_add(length);
        entry.size = entry.size.max(end);
        file.file_pointer = end;
        file.size = entry.size;
        synchronize_entry(entry)
    }

    pub(crate) fn synchronize(&mut self, file: &File) -> Result<()> {
        match self.open_entry(file) {
            Ok(entry) => synchronize_entry(entry),
            Err(_) => Ok(()),
        }
    }

    pub(crate) fn size(&mut self, file: &mut File) -> Result<()> {
        let entry = self.open_entry(file)?;
        let size = measure(&mut entry.handle)?;
        entry.size = size;
        file.size = size;
        Ok(())
    }
}
