//! The contract user types implement to travel inside a message payload.

use crate::{BufferReader, BufferWriter, WireError};

/// A value that can be written to and read from a message buffer.
///
/// Implementations write their fields through the [`BufferWriter`] in a
/// fixed order and read them back in the same order. `serialize` returns
/// the total bytes appended; `deserialize` fills `self` in place, which is
/// why [`BufferReader::read_value`] default-constructs first.
///
/// ## Example
///
/// ```rust
/// use taglink_wire::{BufferReader, BufferWriter, WireError, WireSerialize};
///
/// #[derive(Default, PartialEq, Debug)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl WireSerialize for Position {
///     fn serialize(&self, writer: &mut BufferWriter<'_>) -> Result<usize, WireError> {
///         Ok(writer.write_f32(self.x)? + writer.write_f32(self.y)?)
///     }
///
///     fn deserialize(&mut self, reader: &mut BufferReader<'_>) {
///         self.x = reader.read_f32();
///         self.y = reader.read_f32();
///     }
/// }
/// ```
pub trait WireSerialize {
    /// Writes the value's fields; returns the total bytes appended.
    ///
    /// # Errors
    /// Returns the first [`WireError`] a field write reports (overflow or
    /// wrong mode); earlier fields may already have been appended.
    fn serialize(&self, writer: &mut BufferWriter<'_>) -> Result<usize, WireError>;

    /// Reads the value's fields in serialization order.
    ///
    /// Field reads that underflow leave the corresponding field at its
    /// default, matching the reader's rejection policy.
    fn deserialize(&mut self, reader: &mut BufferReader<'_>);
}
