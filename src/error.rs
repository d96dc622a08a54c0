//! Error types shared by every serializer in this crate.

use thiserror::Error;

/// Errors raised while converting foreign scene data or serializing it into GPU buffers.
///
/// All of these are precondition violations detected where data enters the crate.
/// Serialization is a pure transform, so none of them is worth retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    /// A foreign value does not have the expected shape.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// A hierarchy node is neither a well-formed leaf nor a well-formed branch.
    #[error("invalid hierarchy node: {0}")]
    InvalidNode(String),

    /// A bounding volume scalar is NaN or infinite.
    #[error("invalid bounding volume: {component} is {value}")]
    InvalidBoundingVolume { component: &'static str, value: f32 },

    /// A byte buffer handed to the decoder does not hold a valid flat hierarchy.
    #[error("malformed buffer: {0}")]
    MalformedBuffer(String),

    /// An index or offset does not fit the 32 bit fields of the wire format.
    #[error("index {0} does not fit into a 32 bit record field")]
    IndexOverflow(usize),

    /// The kernel requires at least one record of this kind.
    #[error("cannot serialize an empty {0} list")]
    EmptyCollection(&'static str),

    /// A spectral array does not match the configured number of wavelength bins.
    #[error("spectral data has {found} bins, expected {expected}")]
    SpectralBinMismatch { expected: usize, found: usize },

    /// A transformation matrix has no inverse.
    #[error("transformation matrix is not invertible")]
    SingularMatrix,

    /// An index points past the end of a list.
    #[error("{kind} index {index} is out of range for length {len}")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SerializeError>;
