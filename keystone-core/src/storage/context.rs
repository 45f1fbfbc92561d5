//! State owned by a storage worker

use alloc::collections::BTreeMap;
use alloc::string::String;

use keystone_hal::{Error, MediaDriver, Medium, PartitionName, Result, StorageStatus};

use crate::fs::partition::{Partition, Volume};

/// Everything a storage worker owns exclusively
///
/// Events receive `&mut StorageContext`, so the media driver, the storage
/// status and every open file table are only ever touched by the worker.
pub struct StorageContext<D: MediaDriver> {
    medium: Medium,
    driver: D,
    status: StorageStatus,
    root_prefix: String,
    partitions: BTreeMap<PartitionName, Partition<D::File>>,
}

impl<D: MediaDriver> StorageContext<D> {
    pub(crate) fn new(medium: Medium, driver: D) -> Self {
        Self {
            medium,
            driver,
            status: StorageStatus::default(),
            root_prefix: String::new(),
            partitions: BTreeMap::new(),
        }
    }

    /// Medium this context drives
    pub fn medium(&self) -> Medium {
        self.medium
    }

    /// Current storage status
    pub fn status(&self) -> StorageStatus {
        self.status
    }

    /// Prefix below which partitions are mounted
    ///
    /// Empty until [`init`](Self::init) succeeds.
    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    /// Direct access to the media driver
    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Bring up the medium
    ///
    /// Idempotent once initialized.
    pub fn init(&mut self) -> Result<()> {
        if self.status.is_initialized {
            return Ok(());
        }
        self.root_prefix = self.driver.init(self.medium)?;
        self.status.is_initialized = true;
        info!("Storage initialized at {}", self.root_prefix.as_str());
        Ok(())
    }

    /// Release the medium
    ///
    /// Every partition is unmounted first. A driver without a release step
    /// (`NotAvailable`) still counts as deinitialized.
    pub fn deinit(&mut self) -> Result<()> {
        if !self.status.is_initialized {
            return Ok(());
        }
        let closed = self.shutdown();

        match self.driver.deinit() {
            Ok(()) | Err(Error::NotAvailable) => {}
            Err(error) => return Err(error),
        }
        self.status.is_initialized = false;
        self.root_prefix.clear();
        info!("Storage deinitialized");
        closed
    }

    /// Close every open file and forget all mounts
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for (_, mut partition) in core::mem::take(&mut self.partitions) {
            if let Err(error) = partition.close_all() {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Borrow one partition together with the driver
    ///
    /// The partition is created unmounted on first use.
    pub(crate) fn volume<'a>(&'a mut self, name: &'a PartitionName) -> Volume<'a, D> {
        let Self {
            driver,
            status,
            root_prefix,
            partitions,
            ..
        } = self;
        let partition = partitions.entry(name.clone()).or_insert_with(Partition::new);
        Volume {
            driver,
            storage: *status,
            root_prefix: root_prefix.as_str(),
            name: name.as_str(),
            partition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryMedia;
    use keystone_hal::fs::partition_name;
    use keystone_hal::{File, OpenMode};

    #[test]
    fn test_init_sets_root_prefix() {
        let mut context = StorageContext::new(Medium::Flash, MemoryMedia::new());
        assert_eq!(context.root_prefix(), "");
        context.init().unwrap();
        assert!(context.status().is_initialized);
        assert_eq!(context.root_prefix(), "/mem");
        context.init().unwrap();
    }

    #[test]
    fn test_init_failure_keeps_storage_down() {
        let media = MemoryMedia::new();
        media.state().fail_init(Error::NotAvailable);
        let mut context = StorageContext::new(Medium::Sd, media);
        assert_eq!(context.init(), Err(Error::NotAvailable));
        assert!(!context.status().is_initialized);
    }

    #[test]
    fn test_deinit_closes_files_and_tolerates_missing_release() {
        let media = MemoryMedia::new();
        let state = media.state();
        let mut context = StorageContext::new(Medium::Flash, media);
        context.init().unwrap();

        let name = partition_name("cfg").unwrap();
        let mut file = File::new();
        let mut volume = context.volume(&name);
        volume.mount().unwrap();
        volume.open("a.txt", OpenMode::WriteOnlyNew, &mut file).unwrap();

        context.deinit().unwrap();
        assert!(!context.status().is_initialized);
        assert_eq!(context.root_prefix(), "");
        assert_eq!(state.open_handles(), 0);
        assert!(!context.volume(&name).status().mounted);
    }
}
