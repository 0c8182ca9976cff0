//! Tagged JSON envelopes and the packet codec.
//!
//! Every wire message is an [`Envelope`]: a stable type tag plus a JSON
//! payload. The [`Codec`] maps tags to decoders over the closed
//! [`Packet`] set. It is a constructed registry with explicit lifetime —
//! built once at startup and passed where needed, never a module-level
//! singleton.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::ascii85::{self, Ascii85Error};
use crate::packet::{MovePacket, Packet, SyncPacket, TickEndPacket, UpdatePacket};

/// Encode/decode failures at the envelope layer.
#[derive(Debug, Error)]
pub enum WireError {
    /// Malformed JSON or a payload that does not match its tag's shape.
    #[error("wire json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The envelope's tag is not in the codec's registry.
    #[error("unknown wire tag {0:?}")]
    UnknownTag(String),
    /// A binary payload failed Ascii85 decoding.
    #[error(transparent)]
    Ascii85(#[from] Ascii85Error),
    /// A binary payload is missing its length or data field.
    #[error("malformed binary payload")]
    MalformedBinary,
}

/// One wire message: a type tag and its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Stable payload type identifier.
    pub tag: String,
    /// Tag-specific payload.
    pub payload: Value,
}

impl Envelope {
    /// Wraps raw bytes in a text-safe envelope: the payload carries the
    /// exact length plus the zero-padded Ascii85 text.
    #[must_use]
    pub fn binary(tag: &str, data: &[u8]) -> Self {
        let payload = serde_json::json!({
            "len": data.len(),
            "data": ascii85::encode(data),
        });
        Self {
            tag: tag.to_owned(),
            payload,
        }
    }

    /// Recovers the bytes from a [`Envelope::binary`] payload, trimming
    /// the encoding padding back to the recorded length.
    pub fn binary_payload(&self) -> Result<Vec<u8>, WireError> {
        let len = self
            .payload
            .get("len")
            .and_then(Value::as_u64)
            .ok_or(WireError::MalformedBinary)?;
        let text = self
            .payload
            .get("data")
            .and_then(Value::as_str)
            .ok_or(WireError::MalformedBinary)?;
        let mut bytes = ascii85::decode(text)?;
        let len = usize::try_from(len).map_err(|_| WireError::MalformedBinary)?;
        if len > bytes.len() {
            return Err(WireError::MalformedBinary);
        }
        bytes.truncate(len);
        Ok(bytes)
    }
}

type Decoder = fn(Value) -> Result<Packet, WireError>;

/// Registry mapping wire tags to packet decoders.
///
/// # Example
///
/// ```
/// use undercroft_wire::envelope::Codec;
/// use undercroft_wire::packet::Packet;
///
/// let codec = Codec::standard();
/// let text = codec.encode(&Packet::TickStart).unwrap();
/// let back = codec.decode(&text).unwrap();
/// assert_eq!(back, Packet::TickStart);
/// ```
pub struct Codec {
    decoders: BTreeMap<&'static str, Decoder>,
}

impl Codec {
    /// Builds the registry covering the full [`Packet`] set.
    #[must_use]
    pub fn standard() -> Self {
        let mut decoders: BTreeMap<&'static str, Decoder> = BTreeMap::new();
        decoders.insert("sync", |v| {
            Ok(Packet::Sync(serde_json::from_value::<SyncPacket>(v)?))
        });
        decoders.insert("move", |v| {
            Ok(Packet::Move(serde_json::from_value::<MovePacket>(v)?))
        });
        decoders.insert("update", |v| {
            Ok(Packet::Update(serde_json::from_value::<UpdatePacket>(v)?))
        });
        decoders.insert("tick_start", |_| Ok(Packet::TickStart));
        decoders.insert("tick_end", |v| {
            Ok(Packet::TickEnd(serde_json::from_value::<TickEndPacket>(v)?))
        });
        Self { decoders }
    }

    /// Serializes a packet to envelope text.
    pub fn encode(&self, packet: &Packet) -> Result<String, WireError> {
        let payload = match packet {
            Packet::Sync(p) => serde_json::to_value(p)?,
            Packet::Move(p) => serde_json::to_value(p)?,
            Packet::Update(p) => serde_json::to_value(p)?,
            Packet::TickStart => Value::Null,
            Packet::TickEnd(p) => serde_json::to_value(p)?,
        };
        let envelope = Envelope {
            tag: packet.tag().to_owned(),
            payload,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parses envelope text back into a packet.
    pub fn decode(&self, text: &str) -> Result<Packet, WireError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match self.decoders.get(envelope.tag.as_str()) {
            Some(decode) => decode(envelope.payload),
            None => {
                warn!(tag = %envelope.tag, "unknown wire tag");
                Err(WireError::UnknownTag(envelope.tag))
            }
        }
    }
}
