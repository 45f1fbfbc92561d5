//! Media driver on the host file system
//!
//! Each medium is emulated by a directory, `$HOME/<medium name>` unless a
//! root is configured. Partitions become subdirectories of that root.

use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, Write};
use std::mem::MaybeUninit;
use std::path::PathBuf;

use keystone_hal::types::saturating_bytes;
use keystone_hal::{
    Error, FileOffset, MediaDriver, Medium, NativeFile, OpenMode, Result, SeekFrom, Space,
};

/// Map a host I/O error onto the abstraction layer's error kinds
pub fn map_io_error(error: io::Error) -> Error {
    match error.kind() {
        ErrorKind::NotFound => Error::FileNotFound,
        ErrorKind::AlreadyExists => Error::FileExists,
        ErrorKind::UnexpectedEof => Error::EndOfFile,
        ErrorKind::InvalidInput => Error::InvalidParameter,
        ErrorKind::TimedOut => Error::Timeout,
        ErrorKind::OutOfMemory => Error::NoMemory,
        ErrorKind::Unsupported => Error::NotSupported,
        _ => {
            log::debug!("Host I/O error: {error}");
            Error::Failure
        }
    }
}

/// Media driver that stores files below a host directory
#[derive(Debug, Clone, Default)]
pub struct PosixMedia {
    root: Option<PathBuf>,
}

impl PosixMedia {
    /// Emulate the medium below `$HOME`
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulate the medium below `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn root_for(&self, medium: Medium) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        let home = std::env::var_os("HOME").ok_or_else(|| {
            log::error!("HOME is not set and no storage root was configured");
            Error::NotAvailable
        })?;
        Ok(PathBuf::from(home).join(medium.as_str()))
    }
}

impl MediaDriver for PosixMedia {
    type File = PosixFile;

    fn init(&mut self, medium: Medium) -> Result<String> {
        let root = self.root_for(medium)?;
        fs::create_dir_all(&root).map_err(map_io_error)?;
        let root = root.into_os_string().into_string().map_err(|_| {
            log::error!("Storage root is not valid UTF-8");
            Error::InvalidParameter
        })?;
        log::info!("{} emulated at {root}", medium.as_str());
        Ok(root)
    }

    fn deinit(&mut self) -> Result<()> {
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        fs::create_dir_all(path).map_err(map_io_error)
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<PosixFile> {
        if mode == OpenMode::Unknown {
            return Err(Error::InvalidParameter);
        }

        let file = OpenOptions::new()
            .read(mode.can_read())
            .write(mode.can_write())
            .create_new(mode.file_must_not_exist())
            .truncate(mode.should_truncate())
            .open(path)
            .map_err(map_io_error)?;
        Ok(PosixFile { file })
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        fs::remove_file(path).map_err(map_io_error)
    }

    fn space(&mut self, path: &str) -> Result<Space> {
        statvfs(path)
    }
}

#[allow(unsafe_code)]
fn statvfs(path: &str) -> Result<Space> {
    let path = CString::new(path).map_err(|_| Error::InvalidParameter)?;
    let mut stats = MaybeUninit::<libc::statvfs>::zeroed();

    // SAFETY: `path` is NUL terminated and `stats` is valid for writes.
    let status = unsafe { libc::statvfs(path.as_ptr(), stats.as_mut_ptr()) };
    if status != 0 {
        return Err(map_io_error(io::Error::last_os_error()));
    }
    // SAFETY: statvfs succeeded, so it filled in `stats`.
    let stats = unsafe { stats.assume_init() };

    let fragment = stats.f_frsize as u64;
    Ok(Space {
        capacity: saturating_bytes((stats.f_blocks as u64).saturating_mul(fragment)),
        available: saturating_bytes((stats.f_bavail as u64).saturating_mul(fragment)),
    })
}

/// Open host file
#[derive(Debug)]
pub struct PosixFile {
    file: fs::File,
}

impl NativeFile for PosixFile {
    fn seek(&mut self, position: SeekFrom) -> Result<FileOffset> {
        let position = match position {
            SeekFrom::Start(offset) => io::SeekFrom::Start(offset.into()),
            SeekFrom::End(delta) => io::SeekFrom::End(delta),
            SeekFrom::Current(delta) => io::SeekFrom::Current(delta),
        };
        let offset = self.file.seek(position).map_err(map_io_error)?;
        FileOffset::try_from(offset).map_err(|_| Error::NotSupported)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        loop {
            match self.file.read(buffer) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                result => return result.map_err(map_io_error),
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).map_err(map_io_error)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(map_io_error)?;
        self.file.sync_data().map_err(map_io_error)
    }
}
