//! Addressable message envelope.

use bytes::Bytes;

/// A payload paired with a caller-assigned identifier.
///
/// The queue itself moves bare payloads; this envelope exists for callers
/// that need to address individual messages outside the queue pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: String,
    payload: Bytes,
}

impl Message {
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}
