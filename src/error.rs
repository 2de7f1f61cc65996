//! Error kinds surfaced to callers.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Every failure a public operation can report.
///
/// Allocation failures inside a prepare task are not surfaced here: the
/// shape's render data is marked invalid and the shape is skipped at render
/// time, so one failing shape never aborts a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid arguments")]
    InvalidArguments,

    #[error("operation requires state that is not present")]
    InsufficientCondition,

    #[error("unsupported input")]
    NonSupport,

    #[error("memory allocation failed")]
    FailedAllocation,

    #[error("internal buffer corruption detected")]
    MemoryCorruption,

    #[error("unknown failure")]
    Unknown,
}
