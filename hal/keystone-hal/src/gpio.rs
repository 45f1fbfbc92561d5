//! GPIO pin abstractions
//!
//! Provides the digital I/O interface that backends implement for their
//! pin controller. Every operation reports an [`Error`].

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Logic level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogicLevel {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

impl LogicLevel {
    /// Get the opposite level
    pub fn toggled(self) -> Self {
        match self {
            LogicLevel::Low => LogicLevel::High,
            LogicLevel::High => LogicLevel::Low,
        }
    }
}

/// Direction of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PinDirection {
    /// Not configured
    #[default]
    Unknown,
    /// Digital input
    DigitalInput,
    /// Digital output
    DigitalOutput,
    /// Analog input
    AnalogInput,
    /// Analog output
    AnalogOutput,
}

/// Output drive type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DriveType {
    /// Not configured
    #[default]
    Unknown,
    /// Actively driven high and low
    PushPull,
    /// Driven low only, needs a pull-up
    OpenDrain,
}

/// Edge/level interrupt triggers
pub mod interrupts {
    /// Interrupt trigger flags
    pub type InterruptFlags = u8;

    /// Interrupts disabled
    pub const DISABLED: InterruptFlags = 0x00;
    /// Low level triggers an interrupt
    pub const LOW_LEVEL: InterruptFlags = 0x01;
    /// High level triggers an interrupt
    pub const HIGH_LEVEL: InterruptFlags = 0x02;
    /// Rising edge triggers an interrupt
    pub const RISING_EDGE: InterruptFlags = 0x04;
    /// Falling edge triggers an interrupt
    pub const FALLING_EDGE: InterruptFlags = 0x08;
    /// Either edge triggers an interrupt
    pub const RISING_OR_FALLING_EDGE: InterruptFlags = RISING_EDGE | FALLING_EDGE;
}

/// Hardware configuration of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpioParams {
    /// Pin number on the target
    pub pin: u16,
    /// Pin direction
    pub direction: PinDirection,
    /// Interrupt triggers, see [`interrupts`]
    pub interrupt_flags: interrupts::InterruptFlags,
    /// Enable the pull-up resistor
    pub pull_up: bool,
    /// Enable the pull-down resistor
    pub pull_down: bool,
    /// Output drive type
    pub drive_type: DriveType,
}

impl Default for GpioParams {
    fn default() -> Self {
        Self {
            pin: u16::MAX,
            direction: PinDirection::Unknown,
            interrupt_flags: interrupts::DISABLED,
            pull_up: false,
            pull_down: false,
            drive_type: DriveType::Unknown,
        }
    }
}

impl GpioParams {
    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<()> {
        if self.pull_up && self.pull_down {
            return Err(Error::InvalidParameter);
        }
        if self.direction == PinDirection::Unknown {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// Digital I/O pin
///
/// Implementations handle the register manipulation for the specific chip.
pub trait Gpio {
    /// Bring up the pin with the parameters given to [`configure`](Gpio::configure)
    fn init(&mut self) -> Result<()>;

    /// Store the pin configuration
    fn configure(&mut self, params: GpioParams) -> Result<()>;

    /// Drive the pin to a level
    fn pin_write(&mut self, level: LogicLevel) -> Result<()>;

    /// Read the level of the pin
    fn pin_read(&self) -> Result<LogicLevel>;

    /// Invert the current level of the pin
    fn toggle(&mut self) -> Result<()> {
        let level = self.pin_read()?;
        self.pin_write(level.toggled())
    }

    /// Check if the pin reads high
    fn is_high(&self) -> Result<bool> {
        Ok(self.pin_read()? == LogicLevel::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LatchPin {
        level: LogicLevel,
    }

    impl Gpio for LatchPin {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn configure(&mut self, params: GpioParams) -> Result<()> {
            params.validate()
        }

        fn pin_write(&mut self, level: LogicLevel) -> Result<()> {
            self.level = level;
            Ok(())
        }

        fn pin_read(&self) -> Result<LogicLevel> {
            Ok(self.level)
        }
    }

    #[test]
    fn test_toggle_uses_read_then_write() {
        let mut pin = LatchPin {
            level: LogicLevel::Low,
        };
        pin.toggle().unwrap();
        assert!(pin.is_high().unwrap());
        pin.toggle().unwrap();
        assert_eq!(pin.pin_read(), Ok(LogicLevel::Low));
    }

    #[test]
    fn test_params_validation() {
        let mut params = GpioParams {
            direction: PinDirection::DigitalOutput,
            ..Default::default()
        };
        assert_eq!(params.validate(), Ok(()));

        params.pull_up = true;
        params.pull_down = true;
        assert_eq!(params.validate(), Err(Error::InvalidParameter));

        assert_eq!(GpioParams::default().validate(), Err(Error::InvalidParameter));
    }
}
