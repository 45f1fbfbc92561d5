//! Analog to digital converter abstractions

use crate::error::{Error, Result};
use crate::types::{Count, Volts};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of channels an ADC can expose
pub const MAX_CHANNELS: u8 = 13;

/// ADC input channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Channel(u8);

impl Channel {
    /// Create a channel, rejecting numbers above the supported range
    pub fn new(number: u8) -> Result<Self> {
        if number < MAX_CHANNELS {
            Ok(Self(number))
        } else {
            Err(Error::InvalidParameter)
        }
    }

    /// Get the channel number
    pub fn number(self) -> u8 {
        self.0
    }
}

/// Parameters of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdcParams {
    /// Channel to convert, `None` until configured
    pub channel: Option<Channel>,
    /// Peripheral instance on the target
    pub peripheral: u8,
}

/// Analog to digital converter
pub trait Adc {
    /// Bring up the converter
    fn init(&mut self) -> Result<()>;

    /// Release the converter
    fn deinit(&mut self) -> Result<()>;

    /// Store the conversion parameters
    fn configure(&mut self, params: AdcParams) -> Result<()>;

    /// Take one raw sample from the configured channel
    fn convert(&mut self) -> Result<Count>;

    /// Convert a raw sample to volts
    fn raw_to_volts(&self, raw: Count) -> Result<Volts>;
}
