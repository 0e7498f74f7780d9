//! Framing: `timestamp|sender|receiver|text` as UTF-8, no length prefix.

use crate::protocol::{Message, NodeId, DELIMITER};

const FIELDS: usize = 4;

/// Encode a message into a single frame. The text takes the rest of the frame.
pub fn encode_frame(msg: &Message) -> Vec<u8> {
    format!(
        "{ts}{d}{from}{d}{to}{d}{text}",
        ts = msg.timestamp(),
        from = msg.sender_id(),
        to = msg.receiver_id(),
        text = msg.text(),
        d = DELIMITER,
    )
    .into_bytes()
}

/// Decode one whole frame. Splits at most three times so the text keeps any delimiters.
pub fn decode_frame(bytes: &[u8]) -> Result<Message, MalformedFrame> {
    let s = std::str::from_utf8(bytes).map_err(|_| MalformedFrame::NotUtf8)?;
    let parts: Vec<&str> = s.splitn(FIELDS, DELIMITER).collect();
    if parts.len() < FIELDS {
        return Err(MalformedFrame::MissingFields { found: parts.len() });
    }
    let sender = parse_address("sender", parts[1])?;
    let receiver = parse_address("receiver", parts[2])?;
    Ok(Message::from_wire(parts[0], sender, receiver, parts[3]))
}

fn parse_address(field: &'static str, value: &str) -> Result<NodeId, MalformedFrame> {
    value
        .trim()
        .parse::<NodeId>()
        .map_err(|_| MalformedFrame::BadAddress {
            field,
            value: value.to_owned(),
        })
}

/// Error decoding a frame. The packet is dropped; it never stops the receive loop.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MalformedFrame {
    #[error("frame is not valid UTF-8")]
    NotUtf8,
    #[error("expected 4 fields, found {found}")]
    MissingFields { found: usize },
    #[error("{field} address {value:?} is not a node id")]
    BadAddress { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    #[test]
    fn frame_layout_matches_wire_format() {
        let msg = Message::new("2024-05-01T12:00:00", 1, 2, "hello").unwrap();
        assert_eq!(encode_frame(&msg), b"2024-05-01T12:00:00|1|2|hello");
    }

    #[test]
    fn roundtrip_keeps_delimiters_in_text() {
        let msg = Message::new("ts", 7, 9, "a|b||c|").unwrap();
        let decoded = decode_frame(&encode_frame(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_random_messages() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let len = rng.gen_range(0..40);
            let mut text: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            if rng.gen_bool(0.3) {
                text.push(DELIMITER);
                text.push_str("tail 📟");
            }
            let msg = Message::new(crate::protocol::now_timestamp(), rng.gen(), rng.gen(), text)
                .unwrap();
            assert_eq!(decode_frame(&encode_frame(&msg)).unwrap(), msg);
        }
    }

    #[test]
    fn empty_text_roundtrips() {
        let msg = Message::new("ts", 1, 2, "").unwrap();
        assert_eq!(encode_frame(&msg), b"ts|1|2|");
        assert_eq!(decode_frame(b"ts|1|2|").unwrap(), msg);
    }

    #[test]
    fn three_fields_is_malformed() {
        assert_eq!(
            decode_frame(b"only|two|fields"),
            Err(MalformedFrame::MissingFields { found: 3 })
        );
        assert_eq!(
            decode_frame(b""),
            Err(MalformedFrame::MissingFields { found: 1 })
        );
    }

    #[test]
    fn non_integer_addresses_are_malformed() {
        assert!(matches!(
            decode_frame(b"ts|one|2|hi"),
            Err(MalformedFrame::BadAddress { field: "sender", .. })
        ));
        assert!(matches!(
            decode_frame(b"ts|1|-2|hi"),
            Err(MalformedFrame::BadAddress { field: "receiver", .. })
        ));
        assert!(matches!(
            decode_frame(b"ts|1|70000|hi"),
            Err(MalformedFrame::BadAddress { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        assert_eq!(
            decode_frame(&[0xff, b'|', b'1', b'|', b'2', b'|', b'x']),
            Err(MalformedFrame::NotUtf8)
        );
    }
}
