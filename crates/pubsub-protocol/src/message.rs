//! Wire-level message record shared by the broker and the client library.
//!
//! A [`Message`] is the logical unit routed through the broker; it never
//! appears on the wire directly — a [`crate::codec::Codec`] turns it into
//! bytes, and [`crate::framing`] turns those bytes into a length-prefixed
//! record.

use serde::{Deserialize, Serialize};

/// Classification of a [`Message`], mirroring the five record kinds the
/// broker dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// A publisher or subscriber joining a topic.
    Register,
    /// A publisher or subscriber leaving a topic.
    Unregister,
    /// A published payload, routed to matching subscribers.
    Publish,
    /// A subscriber's acknowledgement of a reliable publish.
    Ack,
    /// A subscriber liveness ping.
    Heartbeat,
}

impl MessageType {
    /// The literal wire token for this type, matching the original
    /// broker/client's lowercase `type` strings.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Register => "register",
            MessageType::Unregister => "unregister",
            MessageType::Publish => "publish",
            MessageType::Ack => "ack",
            MessageType::Heartbeat => "heartbeat",
        }
    }

    /// Parse a wire token back into a [`MessageType`].
    ///
    /// Unknown tokens are not an error at this layer — per spec.md §4.5.2,
    /// the broker logs and ignores unrecognized `type` values rather than
    /// tearing down the connection, so callers should treat `None` as
    /// "ignore this record" rather than a protocol violation.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "register" => Some(MessageType::Register),
            "unregister" => Some(MessageType::Unregister),
            "publish" => Some(MessageType::Publish),
            "ack" => Some(MessageType::Ack),
            "heartbeat" => Some(MessageType::Heartbeat),
            _ => None,
        }
    }
}

/// Reliability class selected by a publisher for a single `publish` call.
///
/// Corresponds to the `reliability` ∈ {`BEST_EFFORT`, `RELIABLE`} values
/// in spec.md §6; on the wire this collapses to [`Message::reliability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    /// No acknowledgement, no retry.
    BestEffort,
    /// Tracked with a pending-ack entry and retried up to `MAX_RETRIES`.
    Reliable,
}

impl From<Reliability> for bool {
    fn from(r: Reliability) -> bool {
        matches!(r, Reliability::Reliable)
    }
}

impl From<bool> for Reliability {
    fn from(b: bool) -> Reliability {
        if b {
            Reliability::Reliable
        } else {
            Reliability::BestEffort
        }
    }
}

/// The publisher/subscriber role carried in a `register` record's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Publisher => "publisher",
            Role::Subscriber => "subscriber",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "publisher" => Some(Role::Publisher),
            "subscriber" => Some(Role::Subscriber),
            _ => None,
        }
    }
}

/// The logical message record routed by the broker.
///
/// Field semantics follow spec.md §3 exactly: `message_id` is `0` on
/// client-originated records (the broker assigns it for `publish`),
/// `payload` carries text content (or, for `register`, the role literal),
/// and `payload_raw` carries binary content. The two payload fields are
/// mutually exclusive at the API level — a given `Message` is produced by
/// either the text-publish or the raw-publish path, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: u32,
    pub message_type: MessageType,
    pub topic: String,
    pub payload: String,
    pub payload_raw: Vec<u8>,
    pub reliability: bool,
}

impl Message {
    /// Build a `register` record for the given role and topic.
    pub fn register(topic: impl Into<String>, role: Role) -> Self {
        Self {
            message_id: 0,
            message_type: MessageType::Register,
            topic: topic.into(),
            payload: role.as_str().to_string(),
            payload_raw: Vec::new(),
            reliability: false,
        }
    }

    /// Build an `unregister` record for the given topic.
    pub fn unregister(topic: impl Into<String>) -> Self {
        Self {
            message_id: 0,
            message_type: MessageType::Unregister,
            topic: topic.into(),
            payload: String::new(),
            payload_raw: Vec::new(),
            reliability: false,
        }
    }

    /// Build a text `publish` record. `message_id` is left at `0`; the
    /// broker assigns the real id on receipt.
    pub fn publish_text(topic: impl Into<String>, text: impl Into<String>, reliability: bool) -> Self {
        Self {
            message_id: 0,
            message_type: MessageType::Publish,
            topic: topic.into(),
            payload: text.into(),
            payload_raw: Vec::new(),
            reliability,
        }
    }

    /// Build a binary `publish` record. `message_id` is left at `0`; the
    /// broker assigns the real id on receipt.
    pub fn publish_raw(topic: impl Into<String>, bytes: Vec<u8>, reliability: bool) -> Self {
        Self {
            message_id: 0,
            message_type: MessageType::Publish,
            topic: topic.into(),
            payload: String::new(),
            payload_raw: bytes,
            reliability,
        }
    }

    /// Build an `ack` record for the given message id and topic.
    pub fn ack(message_id: u32, topic: impl Into<String>) -> Self {
        Self {
            message_id,
            message_type: MessageType::Ack,
            topic: topic.into(),
            payload: String::new(),
            payload_raw: Vec::new(),
            reliability: false,
        }
    }

    /// Build a `heartbeat` record. Carries no meaningful fields beyond its
    /// type, per spec.md §3.
    pub fn heartbeat() -> Self {
        Self {
            message_id: 0,
            message_type: MessageType::Heartbeat,
            topic: String::new(),
            payload: String::new(),
            payload_raw: Vec::new(),
            reliability: false,
        }
    }

    /// Approximate serialized size in bytes, useful for logging and
    /// buffer-sizing decisions without paying for a real encode.
    pub fn approx_size(&self) -> usize {
        4 + 1 + self.topic.len() + self.payload.len() + self.payload_raw.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_tokens_round_trip() {
        for ty in [
            MessageType::Register,
            MessageType::Unregister,
            MessageType::Publish,
            MessageType::Ack,
            MessageType::Heartbeat,
        ] {
            assert_eq!(MessageType::parse(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn unknown_message_type_token_is_none() {
        assert_eq!(MessageType::parse("frobnicate"), None);
    }

    #[test]
    fn reliability_bool_conversion_round_trips() {
        assert!(bool::from(Reliability::Reliable));
        assert!(!bool::from(Reliability::BestEffort));
        assert_eq!(Reliability::from(true), Reliability::Reliable);
        assert_eq!(Reliability::from(false), Reliability::BestEffort);
    }

    #[test]
    fn register_message_carries_role_literal() {
        let m = Message::register("topic.a", Role::Subscriber);
        assert_eq!(m.payload, "subscriber");
        assert_eq!(m.message_id, 0);
    }
}
