//! Message envelope codec.
//!
//! Every frame exchanged with a client is a JSON object of the shape
//!
//! ```json
//! { "metadata": { "type": "<tag>" }, "data": { ... } }
//! ```
//!
//! The `type` tag selects a handler; `data` is handed to that handler
//! untouched. Only handlers decode `data` (via [`Envelope::payload`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while decoding or encoding an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame is not a JSON object.
    #[error("malformed envelope: {0}")]
    Malformed(String),
    /// `metadata.type` is missing or not a string.
    #[error("envelope has no metadata.type tag")]
    MissingType,
    /// `data` does not match the shape the handler expects, or a payload
    /// could not be serialised.
    #[error("invalid {tag} payload: {source}")]
    Payload {
        /// Tag of the offending envelope.
        tag: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Envelope header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Handler tag.
    #[serde(rename = "type")]
    pub message_type: String,
}

/// A decoded frame: routing tag plus opaque payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing header.
    pub metadata: Metadata,
    /// Handler-specific payload.
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Envelope {
    /// Build an envelope from a tag and a serialisable payload.
    pub fn new<T: Serialize>(tag: impl Into<String>, payload: &T) -> Result<Self, EnvelopeError> {
        let tag = tag.into();
        let data = serde_json::to_value(payload).map_err(|source| EnvelopeError::Payload {
            tag: tag.clone(),
            source,
        })?;
        Ok(Self::from_parts(tag, data))
    }

    /// Build an envelope from a tag and an already-encoded payload.
    pub fn from_parts(tag: impl Into<String>, data: Value) -> Self {
        Self {
            metadata: Metadata {
                message_type: tag.into(),
            },
            data,
        }
    }

    /// The routing tag.
    pub fn message_type(&self) -> &str {
        &self.metadata.message_type
    }

    /// Decode one text frame.
    ///
    /// A missing `data` field decodes as an empty object so that payload-less
    /// requests such as `InitSession` can omit it.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let Value::Object(mut root) = value else {
            return Err(EnvelopeError::Malformed("expected a JSON object".into()));
        };

        let tag = root
            .get("metadata")
            .and_then(|m| m.get("type"))
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingType)?
            .to_owned();

        let data = match root.remove("data") {
            None | Some(Value::Null) => empty_object(),
            Some(data) => data,
        };
        Ok(Self::from_parts(tag, data))
    }

    /// Encode to a JSON text frame.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|source| EnvelopeError::Payload {
            tag: self.metadata.message_type.clone(),
            source,
        })
    }

    /// Decode `data` into a handler-specific payload type.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        decode_payload(&self.metadata.message_type, self.data.clone())
    }
}

/// Decode a bare payload value that belongs to `tag`.
pub fn decode_payload<T: DeserializeOwned>(tag: &str, data: Value) -> Result<T, EnvelopeError> {
    serde_json::from_value(data).map_err(|source| EnvelopeError::Payload {
        tag: tag.to_owned(),
        source,
    })
}
