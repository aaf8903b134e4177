//! Binary wire format for taglink.
//!
//! This crate defines what actually travels in a datagram:
//!
//! - **Buffer** ([`MessageBuffer`], [`BufferWriter`], [`BufferReader`]) —
//!   a fixed-capacity, mode-tagged byte buffer with a big-endian codec for
//!   primitives and length-prefixed strings.
//! - **Framing** ([`Message`]) — the six-byte `(senderId, tag)` header and
//!   the payload behind it.
//! - **Contract** ([`WireSerialize`]) — how user types opt into the codec.
//! - **Protocol vocabulary** ([`Tag`], [`ConnectionInfo`],
//!   [`TagRegistration`]) — the reserved tags and standard payloads.
//!
//! # Architecture
//!
//! The wire layer knows nothing about sockets, rosters, or dispatch — it
//! only converts values to and from bytes:
//!
//! ```text
//! Transport (datagrams) → Wire (Message) → Session / Dispatch (identity, routing)
//! ```

mod buffer;
mod error;
mod message;
mod serial;
mod types;

pub use buffer::{
    default_capacity, set_default_capacity, BufferMode, BufferReader, BufferWriter,
    MessageBuffer, MIN_CAPACITY,
};
pub use error::WireError;
pub use message::{Message, HEADER_LEN, UNREGISTERED_SENDER};
pub use serial::WireSerialize;
pub use types::{ConnectionInfo, Tag, TagRegistration};
