//! Error taxonomy shared by every interface
//!
//! Operations return [`Result`]; success is `Ok`, every other outcome is one
//! of the [`Error`] kinds below. Backends map their native error codes onto
//! these kinds so that callers never see vendor-specific values.

use core::fmt;

/// Result type used throughout the abstraction layer
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by abstraction layer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Error {
    /// General failure
    Failure = 1,
    /// No implementation exists for this platform
    NotImplemented = 2,
    /// Not enough memory to complete the operation
    NoMemory = 3,
    /// Operation timed out
    Timeout = 4,
    /// Implemented, but the provided data types are not supported
    NotSupported = 5,
    /// A required state was not reached first (not initialized, not open...)
    PrerequisitesNotMet = 6,
    /// One or more parameters are invalid
    InvalidParameter = 7,
    /// Cyclic redundancy check failed
    CrcMismatch = 8,
    /// The underlying software does not offer this operation
    NotAvailable = 9,
    /// File not found
    FileNotFound = 10,
    /// File already exists
    FileExists = 11,
    /// End of file reached
    EndOfFile = 12,
    /// No data available
    NoData = 13,
    /// An imposed limit has been reached (queue full, table full)
    LimitReached = 14,
    /// The queried predicate is not true
    Negative = 15,
}

impl Error {
    /// Get the numeric code of this error
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Create an error from its numeric code
    ///
    /// Code 0 is success and has no error representation.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Error::Failure),
            2 => Some(Error::NotImplemented),
            3 => Some(Error::NoMemory),
            4 => Some(Error::Timeout),
            5 => Some(Error::NotSupported),
            6 => Some(Error::PrerequisitesNotMet),
            7 => Some(Error::InvalidParameter),
            8 => Some(Error::CrcMismatch),
            9 => Some(Error::NotAvailable),
            10 => Some(Error::FileNotFound),
            11 => Some(Error::FileExists),
            12 => Some(Error::EndOfFile),
            13 => Some(Error::NoData),
            14 => Some(Error::LimitReached),
            15 => Some(Error::Negative),
            _ => None,
        }
    }

    /// Check if this error means the backend lacks the capability
    ///
    /// These are permanent for a given backend build. Callers should choose
    /// another path instead of retrying.
    pub fn is_capability_absent(self) -> bool {
        matches!(
            self,
            Error::NotImplemented | Error::NotSupported | Error::NotAvailable
        )
    }

    /// Check if this is the terminal end-of-file signal rather than a failure
    pub fn is_terminal_read(self) -> bool {
        self == Error::EndOfFile
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::Failure => "failure",
            Error::NotImplemented => "not implemented",
            Error::NoMemory => "out of memory",
            Error::Timeout => "timed out",
            Error::NotSupported => "not supported",
            Error::PrerequisitesNotMet => "prerequisites not met",
            Error::InvalidParameter => "invalid parameter",
            Error::CrcMismatch => "crc mismatch",
            Error::NotAvailable => "not available",
            Error::FileNotFound => "file not found",
            Error::FileExists => "file exists",
            Error::EndOfFile => "end of file",
            Error::NoData => "no data",
            Error::LimitReached => "limit reached",
            Error::Negative => "negative",
        };
        f.write_str(text)
    }
}

impl core::error::Error for Error {}
