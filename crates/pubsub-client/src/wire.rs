//! Codec selection for the client side of a connection.
//!
//! `pubsub_protocol::Codec`'s trait object erases which concrete codec
//! backs it, which is fine for the broker (it only ever forwards bytes
//! opaquely) but not for a raw subscriber here: decoding a raw publish
//! needs the codec-specific `deserialize_raw` (hex-decode for
//! [`TextCodec`], a dedicated field read for [`BinaryCodec`]), which
//! isn't part of the shared [`Codec`] trait. `ClientCodec` keeps the
//! concrete type around so both decode paths stay available.

use pubsub_protocol::{BinaryCodec, Codec, CodecError, Message, TextCodec};

use crate::config::CodecKind;

#[derive(Debug, Clone, Copy)]
pub enum ClientCodec {
    Text(TextCodec),
    Binary(BinaryCodec),
}

impl ClientCodec {
    pub fn from_kind(kind: CodecKind) -> Self {
        match kind {
            CodecKind::Text => ClientCodec::Text(TextCodec),
            CodecKind::Binary => ClientCodec::Binary(BinaryCodec),
        }
    }

    pub fn serialize(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        match self {
            ClientCodec::Text(c) => c.serialize(message),
            ClientCodec::Binary(c) => c.serialize(message),
        }
    }

    /// Decode a record whose payload is text (or a `register`/`ack`/
    /// `heartbeat` record, which carry no binary payload at all).
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        match self {
            ClientCodec::Text(c) => c.deserialize(bytes),
            ClientCodec::Binary(c) => c.deserialize(bytes),
        }
    }

    /// Decode a record known to carry a binary publish payload, per
    /// `create_subscriber_raw`'s contract.
    pub fn deserialize_raw(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        match self {
            ClientCodec::Text(c) => c.deserialize_raw(bytes),
            ClientCodec::Binary(c) => c.deserialize_raw(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubsub_protocol::Role;

    #[test]
    fn text_codec_round_trips_a_register() {
        let codec = ClientCodec::from_kind(CodecKind::Text);
        let m = Message::register("t", Role::Publisher);
        let bytes = codec.serialize(&m).unwrap();
        let back = codec.deserialize(&bytes).unwrap();
        assert_eq!(back.topic, "t");
    }

    #[test]
    fn binary_codec_raw_round_trip_uses_dedicated_path() {
        let codec = ClientCodec::from_kind(CodecKind::Binary);
        let m = Message::publish_raw("t", vec![1, 2, 3], true);
        let bytes = codec.serialize(&m).unwrap();
        let back = codec.deserialize_raw(&bytes).unwrap();
        assert_eq!(back.payload_raw, vec![1, 2, 3]);
    }
}
