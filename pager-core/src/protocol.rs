//! Pager wire protocol: message type, node addresses and the field delimiter.

use time::macros::format_description;
use time::OffsetDateTime;

/// Node address on the radio link.
pub type NodeId = u16;

/// Reserved character joining the four frame fields.
pub const DELIMITER: char = '|';

/// One communication act between two nodes.
///
/// Fields are private so a message cannot change after construction, and the
/// timestamp is checked to be free of [`DELIMITER`] so every message frames cleanly.
/// The text is the last field on the wire and may contain anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    timestamp: String,
    sender_id: NodeId,
    receiver_id: NodeId,
    text: String,
}

/// Error constructing a message that could not be framed unambiguously.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidMessage {
    #[error("timestamp {0:?} contains the frame delimiter")]
    DelimiterInTimestamp(String),
}

impl Message {
    pub fn new(
        timestamp: impl Into<String>,
        sender_id: NodeId,
        receiver_id: NodeId,
        text: impl Into<String>,
    ) -> Result<Self, InvalidMessage> {
        let timestamp = timestamp.into();
        if timestamp.contains(DELIMITER) {
            return Err(InvalidMessage::DelimiterInTimestamp(timestamp));
        }
        Ok(Self {
            timestamp,
            sender_id,
            receiver_id,
            text: text.into(),
        })
    }

    /// Fields split out of a frame; the timestamp cannot hold a delimiter there.
    pub(crate) fn from_wire(
        timestamp: &str,
        sender_id: NodeId,
        receiver_id: NodeId,
        text: &str,
    ) -> Self {
        Self {
            timestamp: timestamp.to_owned(),
            sender_id,
            receiver_id,
            text: text.to_owned(),
        }
    }

    /// Message stamped with the current time.
    pub fn now(sender_id: NodeId, receiver_id: NodeId, text: impl Into<String>) -> Self {
        Self {
            timestamp: now_timestamp(),
            sender_id,
            receiver_id,
            text: text.into(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn sender_id(&self) -> NodeId {
        self.sender_id
    }

    pub fn receiver_id(&self) -> NodeId {
        self.receiver_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// ISO 8601 creation time with its UTC offset, e.g. `2024-05-01T12:30:00.123456+02:00`.
/// Local time when the offset can be determined, UTC otherwise. Never contains the delimiter.
pub fn now_timestamp() -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
    );
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
