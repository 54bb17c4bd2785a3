//! # Lattice Codec
//!
//! Versioned world snapshots for the `lattice_core` ECS runtime.
//!
//! Three serialization modes share one logical data model:
//!
//! - **BINARY** - the big-endian wire format of [`snapshot`]: a full
//!   snapshot is self-contained and restores an identical world.
//! - **JSON** - a structured mirror of the same data ([`json`]).
//! - **BASE64** - the BINARY buffer through the standard base64 engine.
//!
//! On top of full snapshots, [`delta`] provides a stateful serializer
//! that diffs typed values, fixed-length subarrays and opaque values
//! against shadow copies, emitting buffers that carry only what changed.
//! A delta buffer depends on the matching baseline state held by the
//! encoder/decoder pair; full snapshots establish that baseline.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lattice_codec::{serialize_world, deserialize_world, SerializationMode};
//!
//! let payload = serialize_world(SerializationMode::Binary, &world)?;
//! let restored = deserialize_world(&payload, &registry)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod complex;
pub mod delta;
pub mod error;
pub mod json;
pub mod snapshot;
pub mod wire;

use base64::Engine as _;
use lattice_core::{Registry, World};
use serde_json::Value;
use std::sync::Arc;

pub use delta::{apply_delta, create_delta_serializer, DeltaSerializer, DeltaStats};
pub use error::{CodecError, CodecResult};
pub use snapshot::{
    CONCRETE_VALUE_MARKER, MODE_DELTA, MODE_FULL, NULL_FLAG, SERIALIZER_VERSION, UNDEFINED_FLAG,
};
pub use wire::SPARSE_SET_ABSENT_U16;

/// The serialization modes of [`serialize_world`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationMode {
    /// Structured JSON document.
    Json,
    /// Big-endian binary snapshot.
    Binary,
    /// The binary snapshot, base64-encoded.
    Base64,
}

/// A serialized world in one of the three modes.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedWorld {
    /// JSON document.
    Json(Value),
    /// Binary snapshot buffer.
    Binary(Vec<u8>),
    /// Base64 text of the binary snapshot.
    Base64(String),
}

/// Serializes a world in the requested mode.
///
/// # Errors
///
/// [`CodecError::UnsupportedTypeTag`] when a faux value does not match
/// its declared shape.
pub fn serialize_world(mode: SerializationMode, world: &World) -> CodecResult<SerializedWorld> {
    Ok(match mode {
        SerializationMode::Json => SerializedWorld::Json(json::serialize_json(world)),
        SerializationMode::Binary => SerializedWorld::Binary(snapshot::serialize_full(world)?),
        SerializationMode::Base64 => {
            let bytes = snapshot::serialize_full(world)?;
            SerializedWorld::Base64(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    })
}

fn decode_base64(text: &str) -> CodecResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| CodecError::MalformedPayload { detail: format!("invalid base64: {e}") })
}

/// Restores a payload into an existing world.
///
/// Binary buffers whose mode byte marks a delta are applied via
/// [`apply_delta`] and require an established baseline.
///
/// # Errors
///
/// [`CodecError::VersionMismatch`], [`CodecError::ApplyDeltaWithoutBaseline`],
/// or [`CodecError::MalformedPayload`] per the payload.
pub fn deserialize_world_into(payload: &SerializedWorld, world: &mut World) -> CodecResult<()> {
    match payload {
        SerializedWorld::Json(document) => json::deserialize_json_into(document, world),
        SerializedWorld::Binary(bytes) => deserialize_binary_into(bytes, world),
        SerializedWorld::Base64(text) => deserialize_binary_into(&decode_base64(text)?, world),
    }
}

fn deserialize_binary_into(bytes: &[u8], world: &mut World) -> CodecResult<()> {
    let mut reader = wire::ByteReader::new(bytes);
    match snapshot::read_preamble(&mut reader)? {
        snapshot::MODE_DELTA => apply_delta(bytes, world),
        _ => snapshot::decode_full_into(bytes, world),
    }
}

/// Restores a payload into a fresh world created from `registry`.
///
/// Delta buffers cannot seed a fresh world: they depend on a baseline.
///
/// # Errors
///
/// As [`deserialize_world_into`], plus
/// [`CodecError::ApplyDeltaWithoutBaseline`] for delta payloads.
pub fn deserialize_world(
    payload: &SerializedWorld,
    registry: &Arc<Registry>,
) -> CodecResult<World> {
    match payload {
        SerializedWorld::Json(document) => json::deserialize_json_fresh(document, registry),
        SerializedWorld::Binary(bytes) => deserialize_binary_fresh(bytes, registry),
        SerializedWorld::Base64(text) => {
            deserialize_binary_fresh(&decode_base64(text)?, registry)
        }
    }
}

fn deserialize_binary_fresh(bytes: &[u8], registry: &Arc<Registry>) -> CodecResult<World> {
    let mut reader = wire::ByteReader::new(bytes);
    if snapshot::read_preamble(&mut reader)? == snapshot::MODE_DELTA {
        return Err(CodecError::ApplyDeltaWithoutBaseline);
    }
    snapshot::decode_full_fresh(bytes, registry)
}

/// Encodes a binary snapshot as base64 text.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes base64 text back into snapshot bytes.
///
/// # Errors
///
/// [`CodecError::MalformedPayload`] for invalid base64 input.
pub fn decode_base64_payload(text: &str) -> CodecResult<Vec<u8>> {
    decode_base64(text)
}
