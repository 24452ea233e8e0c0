//! Session value encoding.
//!
//! Session data is a mapping from string keys to [`Value`], a closed tagged
//! union of null, bool, integer, float, string, sequence and nested mapping.
//! A [`SessionCodec`] turns that mapping into the opaque `session_data` blob
//! and back; `decode(encode(m)) == m` must hold for every mapping.

use crate::error::{SessionError, SessionResult};
use std::collections::HashMap;

pub use serde_json::Value;

/// The in-memory contents of one session.
pub type SessionValues = HashMap<String, Value>;

/// Symmetric encoder/decoder for session values.
pub trait SessionCodec: Send + Sync {
    /// Encode the mapping into a blob.
    fn encode(&self, values: &SessionValues) -> SessionResult<Vec<u8>>;

    /// Decode a blob produced by [`SessionCodec::encode`].
    fn decode(&self, bytes: &[u8]) -> SessionResult<SessionValues>;

    /// Codec name, for logs.
    fn name(&self) -> &'static str;
}

/// JSON blob codec.
///
/// Integers and floats stay distinct through a round trip, so `1` and `1.0`
/// decode to the values they were stored as.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn encode(&self, values: &SessionValues) -> SessionResult<Vec<u8>> {
        serde_json::to_vec(values).map_err(|e| SessionError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> SessionResult<SessionValues> {
        if bytes.is_empty() {
            return Ok(SessionValues::new());
        }
        serde_json::from_slice(bytes).map_err(|e| SessionError::Decode(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Decode an optional blob; a missing blob is an empty session.
pub(crate) fn decode_blob(
    codec: &dyn SessionCodec,
    blob: Option<&[u8]>,
) -> SessionResult<SessionValues> {
    match blob {
        Some(bytes) => codec.decode(bytes),
        None => Ok(SessionValues::new()),
    }
}
