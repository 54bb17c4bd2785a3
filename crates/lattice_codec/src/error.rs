//! # Codec Error Types
//!
//! All errors that can occur while encoding or decoding world snapshots.

use thiserror::Error;

/// Errors that can occur in the snapshot codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The decoder read an unexpected serializer version.
    #[error("serializer version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// The version this codec speaks.
        expected: u16,
        /// The version found in the buffer.
        found: u16,
    },

    /// A property carried a type the serializer has no encoding for.
    #[error("unsupported property type: {tag}")]
    UnsupportedTypeTag {
        /// Description of the offending type.
        tag: String,
    },

    /// A delta buffer arrived before any baseline was established.
    #[error("cannot apply a delta buffer without an established baseline")]
    ApplyDeltaWithoutBaseline,

    /// The buffer ended before a read completed.
    #[error("unexpected end of buffer: needed {needed} byte(s), {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// The buffer or JSON document is structurally invalid.
    #[error("malformed payload: {detail}")]
    MalformedPayload {
        /// What was wrong.
        detail: String,
    },

    /// An ECS-side failure while rebuilding the world.
    #[error(transparent)]
    Ecs(#[from] lattice_core::EcsError),

    /// A JSON encode/decode failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
