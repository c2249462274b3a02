//! Error handling module for the platform bus

use core::fmt;
use alloc::string::{String, ToString};

/// Common error type returned by every platform bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The protocol slot already holds an implementation
    AlreadySet,
    /// The protocol has not been registered yet
    NotAvailable,
    /// An index (IOMMU, resource) is out of range
    InvalidIndex,
    /// The logical I2C channel does not resolve to a physical bus
    InvalidChannel,
    /// The device descriptor is malformed
    InvalidDescriptor(String),
    /// Invalid argument
    InvalidArgument(String),
    /// Handle or scope pool exhausted
    ResourceExhausted,
    /// Unknown device identity or metadata type
    NotFound(String),
    /// The device host refused a node operation
    HostRejected(String),
    /// I2C transaction failed on the wire
    BusError,
    /// Timeout
    Timeout,
    /// Operation on a bus or device in the wrong lifecycle state
    BadState(String),
    /// Operation not supported by the registered implementation
    NotSupported,
}

impl Error {
    /// Returns true for failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::BusError | Error::Timeout | Error::ResourceExhausted)
    }

    /// Returns true for errors caused by malformed caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidIndex
                | Error::InvalidChannel
                | Error::InvalidDescriptor(_)
                | Error::InvalidArgument(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadySet => write!(f, "Protocol already set"),
            Error::NotAvailable => write!(f, "Protocol not available"),
            Error::InvalidIndex => write!(f, "Invalid index"),
            Error::InvalidChannel => write!(f, "Invalid I2C channel"),
            Error::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::ResourceExhausted => write!(f, "Resource exhausted"),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::HostRejected(msg) => write!(f, "Device host rejected: {}", msg),
            Error::BusError => write!(f, "I2C bus error"),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::BadState(msg) => write!(f, "Bad state: {}", msg),
            Error::NotSupported => write!(f, "Operation not supported"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;

/// Error context trait for adding context to string-carrying errors
pub trait ErrorContext<T> {
    /// Prefixes the error message with `context`, leaving unit variants untouched
    fn context(self, context: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|error| match error {
            Error::InvalidDescriptor(msg) => Error::InvalidDescriptor(alloc::format!("{}: {}", context, msg)),
            Error::InvalidArgument(msg) => Error::InvalidArgument(alloc::format!("{}: {}", context, msg)),
            Error::NotFound(msg) => Error::NotFound(alloc::format!("{}: {}", context, msg)),
            Error::HostRejected(msg) => Error::HostRejected(alloc::format!("{}: {}", context, msg)),
            Error::BadState(msg) => Error::BadState(alloc::format!("{}: {}", context, msg)),
            other => other,
        })
    }
}

/// Creates a new invalid descriptor error
pub fn invalid_descriptor(msg: &str) -> Error {
    Error::InvalidDescriptor(msg.to_string())
}

/// Creates a new invalid argument error
pub fn invalid_argument(msg: &str) -> Error {
    Error::InvalidArgument(msg.to_string())
}

/// Creates a new not found error
pub fn not_found(msg: &str) -> Error {
    Error::NotFound(msg.to_string())
}

/// Creates a new host rejected error
pub fn host_rejected(msg: &str) -> Error {
    Error::HostRejected(msg.to_string())
}

/// Creates a new bad state error
pub fn bad_state(msg: &str) -> Error {
    Error::BadState(msg.to_string())
}
