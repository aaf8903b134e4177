//! Message framing: one datagram, one tagged message.
//!
//! Every datagram starts with a six-byte header — `i16` sender id at
//! offset 0, then the tag stored at 32-bit width at offset 2 — followed by
//! the payload at offset 6. The sender id is written as a placeholder zero
//! at construction and stamped with the real id just before transmission.

use crate::{BufferReader, BufferWriter, MessageBuffer, Tag, WireError};

/// Byte length of the `(senderId, tag)` header.
pub const HEADER_LEN: usize = 6;

/// Header sender id before a client has registered.
pub const UNREGISTERED_SENDER: i16 = 0;

/// A single tagged datagram, outgoing or incoming.
///
/// An outgoing message owns a write-mode buffer with the header already
/// framed; callers append payload through [`writer`](Self::writer). An
/// incoming message wraps a received datagram with the header already
/// decoded; callers drain payload through [`reader`](Self::reader). Asking
/// for the wrong view is harmless — the view is inert, every operation on
/// it is rejected by the buffer's mode check.
///
/// Cloning copies the header and payload bytes verbatim.
#[derive(Debug, Clone)]
pub struct Message {
    buffer: MessageBuffer,
    tag: Tag,
    sender_id: i16,
}

impl Message {
    /// Frames a new outgoing message for the given tag.
    ///
    /// The buffer uses the process default capacity, which is clamped to
    /// always hold the header, so the header writes cannot fail.
    pub fn outgoing(tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        let mut buffer = MessageBuffer::for_writing();
        let mut writer = buffer.writer();
        writer
            .write_i16(UNREGISTERED_SENDER)
            .expect("header fits in an empty buffer");
        writer
            .write_u32(u32::from(tag.value()))
            .expect("header fits in an empty buffer");
        Self {
            buffer,
            tag,
            sender_id: UNREGISTERED_SENDER,
        }
    }

    /// Wraps a received datagram, decoding the header and leaving the read
    /// cursor at the payload start.
    ///
    /// # Errors
    /// Returns [`WireError::Underflow`] if the datagram is shorter than
    /// the header.
    pub fn incoming(datagram: Vec<u8>) -> Result<Self, WireError> {
        if datagram.len() < HEADER_LEN {
            return Err(WireError::Underflow {
                requested: HEADER_LEN,
                remaining: datagram.len(),
            });
        }
        let mut buffer = MessageBuffer::for_reading(datagram);
        let mut reader = buffer.reader();
        let sender_id = reader.read_i16();
        let tag = Tag((reader.read_u32() & 0xFFFF) as u16);
        Ok(Self {
            buffer,
            tag,
            sender_id,
        })
    }

    /// The message's tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The sender id carried in the header.
    pub fn sender_id(&self) -> i16 {
        self.sender_id
    }

    /// Total framed length, header included.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the message carries no bytes at all. Never true for a
    /// framed message — the header is always present.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The framed bytes: exactly what goes on (or came off) the wire.
    pub fn bytes(&self) -> &[u8] {
        self.buffer.bytes()
    }

    /// Payload writer. Inert on an incoming message.
    pub fn writer(&mut self) -> BufferWriter<'_> {
        self.buffer.writer()
    }

    /// Payload reader. Inert on an outgoing message.
    pub fn reader(&mut self) -> BufferReader<'_> {
        self.buffer.reader()
    }

    /// Stamps the sender id into the already-framed header in place,
    /// without touching the append cursor.
    pub fn stamp_sender(&mut self, id: i16) {
        // The header is framed at construction, so offset 0 always exists.
        self.buffer
            .patch(0, &id.to_be_bytes())
            .expect("header is always framed");
        self.sender_id = id;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_frames_six_byte_header() {
        let msg = Message::outgoing(Tag::PONG);
        assert_eq!(msg.len(), HEADER_LEN);
        // Placeholder sender id 0, then the tag at 32-bit width.
        assert_eq!(msg.bytes(), [0, 0, 0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_payload_starts_at_offset_six() {
        let mut msg = Message::outgoing(42u16);
        msg.writer().write_u8(0xAB).unwrap();
        assert_eq!(msg.len(), HEADER_LEN + 1);
        assert_eq!(msg.bytes()[HEADER_LEN], 0xAB);
    }

    #[test]
    fn test_incoming_decodes_header_and_leaves_cursor_at_payload() {
        let mut out = Message::outgoing(42u16);
        out.writer().write_u32(0xCAFE_F00D).unwrap();
        out.stamp_sender(7);

        let mut incoming = Message::incoming(out.bytes().to_vec()).unwrap();
        assert_eq!(incoming.tag(), Tag(42));
        assert_eq!(incoming.sender_id(), 7);
        assert_eq!(incoming.reader().read_u32(), 0xCAFE_F00D);
    }

    #[test]
    fn test_incoming_rejects_short_datagram() {
        let result = Message::incoming(vec![0, 1, 2]);
        assert!(matches!(result, Err(WireError::Underflow { .. })));
    }

    #[test]
    fn test_stamp_sender_patches_header_in_place() {
        let mut msg = Message::outgoing(5u16);
        msg.writer().write_u16(99).unwrap();
        let len = msg.len();

        msg.stamp_sender(-3);
        assert_eq!(msg.len(), len);
        assert_eq!(msg.sender_id(), -3);
        assert_eq!(&msg.bytes()[..2], (-3i16).to_be_bytes());
    }

    #[test]
    fn test_reader_on_outgoing_is_inert() {
        let mut msg = Message::outgoing(9u16);
        msg.writer().write_u64(1).unwrap();
        let len = msg.len();
        assert_eq!(msg.reader().read_u64(), 0);
        assert_eq!(msg.len(), len);
    }

    #[test]
    fn test_writer_on_incoming_is_inert() {
        let out = Message::outgoing(9u16);
        let mut incoming = Message::incoming(out.bytes().to_vec()).unwrap();
        assert!(incoming.writer().write_u8(1).is_err());
        assert_eq!(incoming.len(), HEADER_LEN);
    }

    #[test]
    fn test_clone_copies_bytes_verbatim() {
        let mut msg = Message::outgoing(7u16);
        msg.writer().write_str("payload").unwrap();
        msg.stamp_sender(3);

        let copy = msg.clone();
        assert_eq!(copy.bytes(), msg.bytes());
        assert_eq!(copy.tag(), msg.tag());
        assert_eq!(copy.sender_id(), msg.sender_id());
    }

    #[test]
    fn test_tag_from_enum_like_u16() {
        let msg = Message::outgoing(Tag::CLIENT_CONNECTED);
        assert_eq!(msg.tag(), Tag(0));
        let msg = Message::outgoing(300u16);
        assert_eq!(msg.tag(), Tag(300));
    }
}
