//! File system facade and its worker-side state

mod filesystem;
pub(crate) mod partition;

pub use filesystem::FileSystem;
