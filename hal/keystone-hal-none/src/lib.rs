//! "None" backend
//!
//! Lets application code build for a target that has no real backend yet.
//! Every capability reports that it is absent; callers should treat these
//! errors as permanent and take another path rather than retry.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

use alloc::string::String;

use keystone_hal::adc::{Adc, AdcParams};
use keystone_hal::gpio::{Gpio, GpioParams, LogicLevel};
use keystone_hal::{
    Count, Error, FileOffset, MediaDriver, Medium, NativeFile, OpenMode, Result, SeekFrom, Space,
    Volts,
};

/// Media driver for a target without storage
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoneMedia;

/// File type of [`NoneMedia`], never constructed
#[derive(Debug)]
pub enum NoneFile {}

impl NativeFile for NoneFile {
    fn seek(&mut self, _position: SeekFrom) -> Result<FileOffset> {
        match *self {}
    }

    fn read(&mut self, _buffer: &mut [u8]) -> Result<usize> {
        match *self {}
    }

    fn write(&mut self, _data: &[u8]) -> Result<()> {
        match *self {}
    }

    fn flush(&mut self) -> Result<()> {
        match *self {}
    }
}

impl MediaDriver for NoneMedia {
    type File = NoneFile;

    fn init(&mut self, _medium: Medium) -> Result<String> {
        Err(Error::NotImplemented)
    }

    fn create_dir(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn open(&mut self, _path: &str, _mode: OpenMode) -> Result<NoneFile> {
        Err(Error::NotImplemented)
    }

    fn remove(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn space(&mut self, _path: &str) -> Result<Space> {
        Err(Error::NotImplemented)
    }
}

/// GPIO pin on a target without GPIO support
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoneGpio;

impl Gpio for NoneGpio {
    fn init(&mut self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn configure(&mut self, _params: GpioParams) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn pin_write(&mut self, _level: LogicLevel) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn pin_read(&self) -> Result<LogicLevel> {
        Err(Error::NotImplemented)
    }
}

/// ADC on a target without ADC support
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoneAdc;

impl Adc for NoneAdc {
    fn init(&mut self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn deinit(&mut self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn configure(&mut self, _params: AdcParams) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn convert(&mut self) -> Result<Count> {
        Err(Error::NotImplemented)
    }

    fn raw_to_volts(&self, _raw: Count) -> Result<Volts> {
        Err(Error::NotImplemented)
    }
}
