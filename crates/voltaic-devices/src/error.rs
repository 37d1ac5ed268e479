//! Error types for device parameter access.

use thiserror::Error;

/// Errors raised when observing or mutating device parameters.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device has no parameter with the given key.
    #[error("device `{device}` has no parameter `{key}`")]
    UnknownParam { device: String, key: String },

    /// A parameter was given a value of the wrong type.
    #[error("parameter `{key}` of `{device}` expects {expected}")]
    ParamType {
        device: String,
        key: String,
        expected: &'static str,
    },
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
