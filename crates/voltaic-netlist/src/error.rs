//! Error types for netlist translation.

use thiserror::Error;

/// Errors raised while translating a parse tree into a simulator.
#[derive(Debug, Error)]
pub enum NetlistError {
    /// The element kind name matches no known device.
    #[error("unknown device kind `{kind}` (instance `{instance}`)")]
    UnknownKind { kind: String, instance: String },

    /// Too few (or too many) pins for the device kind.
    #[error("instance `{instance}` of kind `{kind}` needs {expected} pins, found {found}")]
    PinCount {
        kind: String,
        instance: String,
        expected: usize,
        found: usize,
    },

    /// A positional value has the wrong type.
    #[error(
        "instance `{instance}`: value {index} should be {expected}, found {found}"
    )]
    ValueType {
        instance: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A pin label is not an integer node reference.
    #[error("instance `{instance}`: pin reference `{label}` is not an integer node label")]
    BadPinLabel { instance: String, label: String },

    /// A current-controlled source names a controlling source that does not
    /// exist or introduces no branch current.
    #[error("instance `{instance}` references unknown controlling source `{source_name}`")]
    DanglingSourceRef { instance: String, source_name: String },
}

/// Result type for netlist translation.
pub type Result<T> = std::result::Result<T, NetlistError>;
