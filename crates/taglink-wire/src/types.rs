//! Tags and the standard protocol payloads.

use std::fmt;

use crate::{BufferReader, BufferWriter, WireError, WireSerialize};

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A 16-bit identifier selecting a message's semantic category.
///
/// Tags drive both protocol handling (the reserved values below) and
/// dispatcher routing (everything else). Values 0–4 and 200 belong to the
/// protocol; user traffic should stay clear of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u16);

impl Tag {
    /// Handshake request (client → server) and ack (server → client).
    pub const CLIENT_CONNECTED: Tag = Tag(0);
    /// Graceful or forced departure, both directions.
    pub const CLIENT_DISCONNECTED: Tag = Tag(1);
    /// Liveness response (client → server), empty payload.
    pub const PONG: Tag = Tag(2);
    /// Liveness probe (server → client), empty payload.
    pub const PING: Tag = Tag(3);
    /// Server has no record of the sender, empty payload.
    pub const UNKNOWN_CLIENT: Tag = Tag(4);
    /// Reserved for protocol growth; never sent.
    pub const RESERVED: Tag = Tag(200);

    /// Whether this value belongs to the protocol rather than user space.
    pub fn is_reserved(self) -> bool {
        self.0 <= Self::UNKNOWN_CLIENT.0 || self == Self::RESERVED
    }

    /// The raw 16-bit value.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<u16> for Tag {
    fn from(value: u16) -> Self {
        Tag(value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ConnectionInfo
// ---------------------------------------------------------------------------

/// The handshake and farewell payload.
///
/// Travels under [`Tag::CLIENT_CONNECTED`] (request: `id = 0`,
/// `success = false`; ack: the assigned id, `success = true`) and
/// [`Tag::CLIENT_DISCONNECTED`] (`success` marks a locally initiated
/// departure).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Human-readable client name; several clients may share one.
    pub name: String,
    /// Server-assigned client id.
    pub id: i16,
    /// Request/ack and local/forced discriminator, depending on the tag.
    pub success: bool,
}

impl WireSerialize for ConnectionInfo {
    fn serialize(&self, writer: &mut BufferWriter<'_>) -> Result<usize, WireError> {
        Ok(writer.write_str(&self.name)?
            + writer.write_i16(self.id)?
            + writer.write_bool(self.success)?)
    }

    fn deserialize(&mut self, reader: &mut BufferReader<'_>) {
        self.name = reader.read_str();
        self.id = reader.read_i16();
        self.success = reader.read_bool();
    }
}

// ---------------------------------------------------------------------------
// TagRegistration
// ---------------------------------------------------------------------------

/// Optional advertisement of the tags a client subscribes to.
///
/// Encoded as a `u16` count followed by that many `u16` tag values. The
/// protocol assigns no reserved tag to this payload; embedders send it
/// under a user tag of their choosing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRegistration {
    /// The advertised tag values.
    pub tags: Vec<u16>,
}

impl WireSerialize for TagRegistration {
    fn serialize(&self, writer: &mut BufferWriter<'_>) -> Result<usize, WireError> {
        let count = u16::try_from(self.tags.len()).map_err(|_| WireError::Overflow {
            requested: self.tags.len(),
            over_by: self.tags.len() - usize::from(u16::MAX),
        })?;
        let mut written = writer.write_u16(count)?;
        for tag in &self.tags {
            written += writer.write_u16(*tag)?;
        }
        Ok(written)
    }

    fn deserialize(&mut self, reader: &mut BufferReader<'_>) {
        let count = reader.read_u16();
        self.tags = Vec::with_capacity(usize::from(count).min(reader.remaining() / 2));
        for _ in 0..count {
            if reader.remaining() < 2 {
                // Truncated datagram; keep what decoded cleanly.
                break;
            }
            self.tags.push(reader.read_u16());
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageBuffer;

    fn round_trip<T: WireSerialize + Default>(value: &T) -> T {
        let mut buf = MessageBuffer::for_writing();
        buf.writer().write_value(value).expect("value should fit");
        let mut back = MessageBuffer::for_reading(buf.bytes().to_vec());
        back.reader().read_value()
    }

    #[test]
    fn test_tag_reserved_values() {
        assert_eq!(Tag::CLIENT_CONNECTED.value(), 0);
        assert_eq!(Tag::CLIENT_DISCONNECTED.value(), 1);
        assert_eq!(Tag::PONG.value(), 2);
        assert_eq!(Tag::PING.value(), 3);
        assert_eq!(Tag::UNKNOWN_CLIENT.value(), 4);
        assert_eq!(Tag::RESERVED.value(), 200);
    }

    #[test]
    fn test_tag_is_reserved() {
        for raw in 0..=4u16 {
            assert!(Tag(raw).is_reserved());
        }
        assert!(Tag(200).is_reserved());
        assert!(!Tag(5).is_reserved());
        assert!(!Tag(199).is_reserved());
        assert!(!Tag(201).is_reserved());
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag(42).to_string(), "tag-42");
    }

    #[test]
    fn test_connection_info_round_trip() {
        let info = ConnectionInfo {
            name: "alice".into(),
            id: 7,
            success: true,
        };
        assert_eq!(round_trip(&info), info);
    }

    #[test]
    fn test_connection_info_wire_layout() {
        let info = ConnectionInfo {
            name: "ab".into(),
            id: 0x0102,
            success: true,
        };
        let mut buf = MessageBuffer::for_writing();
        let written = buf.writer().write_value(&info).unwrap();
        assert_eq!(written, 7);
        assert_eq!(buf.bytes(), [0x00, 0x02, b'a', b'b', 0x01, 0x02, 0x01]);
    }

    #[test]
    fn test_connection_info_negative_id() {
        let info = ConnectionInfo {
            name: "bob".into(),
            id: -1,
            success: false,
        };
        assert_eq!(round_trip(&info), info);
    }

    #[test]
    fn test_tag_registration_round_trip() {
        let reg = TagRegistration {
            tags: vec![5, 600, 42_000],
        };
        assert_eq!(round_trip(&reg), reg);
    }

    #[test]
    fn test_tag_registration_empty() {
        let reg = TagRegistration::default();
        assert_eq!(round_trip(&reg), reg);
    }

    #[test]
    fn test_tag_registration_truncated_count_stops_cleanly() {
        // Count claims four tags but only one follows.
        let mut buf = MessageBuffer::for_writing();
        {
            let mut w = buf.writer();
            w.write_u16(4).unwrap();
            w.write_u16(9).unwrap();
        }
        let mut back = MessageBuffer::for_reading(buf.bytes().to_vec());
        let reg: TagRegistration = back.reader().read_value();
        assert_eq!(reg.tags, vec![9]);
    }
}
