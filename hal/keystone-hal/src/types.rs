//! Measurement and identity primitives shared by every interface

/// Bytes (B)
///
/// Kept at 32 bits for the embedded targets. Quantities that do not fit
/// (large host disks) saturate at `Bytes::MAX`.
pub type Bytes = u32;

/// Offset into a file (B)
pub type FileOffset = u32;

/// Milliseconds (ms)
pub type Milliseconds = u32;

/// A count of things
pub type Count = u32;

/// Percentage, 0.0 - 100.0
pub type Percent = f32;

/// Volts (V)
pub type Volts = f32;

/// Identifier handed out by an operating system or driver
pub type Id = u32;

/// Convert a 64 bit byte quantity to [`Bytes`], saturating on overflow
pub fn saturating_bytes(value: u64) -> Bytes {
    Bytes::try_from(value).unwrap_or(Bytes::MAX)
}
