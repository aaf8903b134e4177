//! Error types for the wire layer.

/// Errors that can occur while encoding or decoding a message buffer.
///
/// Writes surface these through `Result`; reads never do — a failed read
/// logs the error and yields the type's default value — but the reader
/// still constructs them so every rejection is logged with one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A write was attempted on a read buffer, or a read on a write buffer.
    /// The operation is rejected without moving any cursor.
    #[error("{op} rejected: buffer is in {mode} mode")]
    WrongMode {
        /// The rejected operation ("read" or "write").
        op: &'static str,
        /// The buffer's actual mode.
        mode: &'static str,
    },

    /// A write would exceed the buffer's capacity. The buffer is unchanged.
    #[error("write of {requested} bytes overflows the buffer by {over_by}")]
    Overflow {
        /// Bytes the rejected write asked for.
        requested: usize,
        /// How far past the last writable offset the write would have ended.
        over_by: usize,
    },

    /// A read would pass the end of the buffer's valid prefix.
    /// The reader returns the type's default instead.
    #[error("read of {requested} bytes passes the end of the buffer ({remaining} left)")]
    Underflow {
        /// Bytes the rejected read asked for.
        requested: usize,
        /// Bytes left between the read cursor and the end of the valid prefix.
        remaining: usize,
    },

    /// A string longer than its `u16` length prefix can describe.
    #[error("string of {len} bytes does not fit a u16 length prefix")]
    StringTooLong {
        /// Byte length of the rejected string.
        len: usize,
    },
}
