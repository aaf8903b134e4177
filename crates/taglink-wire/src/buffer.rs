//! Fixed-capacity message buffer and its codec views.
//!
//! A [`MessageBuffer`] is a bounded byte array with two cursors and a mode
//! tag. Write-mode buffers grow a valid prefix through [`BufferWriter`];
//! read-mode buffers consume one through [`BufferReader`]. Every multi-byte
//! value crosses the wire in big-endian order, so two hosts of any
//! endianness agree on the bytes.
//!
//! The rejection policy is asymmetric on purpose: writes report failure
//! through `Result` (the caller framed the message and can react), while
//! reads log and return the type's default (the datagram already arrived;
//! there is nobody upstream to retry it).

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::WireError;

/// Smallest capacity the process-wide default may be set to. Keeps the
/// six-byte message header writable on every freshly constructed buffer.
pub const MIN_CAPACITY: usize = 16;

/// Process-wide default capacity for newly constructed buffers.
static DEFAULT_CAPACITY: AtomicUsize = AtomicUsize::new(512);

/// Sets the default buffer capacity used by [`MessageBuffer::for_writing`]
/// and incoming datagram reads. Values below [`MIN_CAPACITY`] are clamped.
///
/// Configure this once, before any messages are constructed; buffers built
/// earlier keep the capacity they were born with.
pub fn set_default_capacity(capacity: usize) {
    let clamped = capacity.max(MIN_CAPACITY);
    if clamped != capacity {
        tracing::warn!(capacity, clamped, "default capacity below minimum, clamping");
    }
    DEFAULT_CAPACITY.store(clamped, Ordering::Relaxed);
}

/// Returns the current default buffer capacity.
pub fn default_capacity() -> usize {
    DEFAULT_CAPACITY.load(Ordering::Relaxed)
}

/// Whether a buffer is being filled or drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// The buffer wraps a received datagram; only reads are legal.
    Read,
    /// The buffer is being filled for transmission; only writes are legal.
    Write,
}

impl BufferMode {
    fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// A bounded byte buffer with a write cursor (`length`), a read cursor
/// (`position`), and a mode tag.
///
/// Invariant: `position <= length <= capacity`. In read mode `length` is
/// the received datagram's size; in write mode it is the bytes framed so
/// far. Operations on the wrong mode are rejected without moving either
/// cursor.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    data: Vec<u8>,
    length: usize,
    position: usize,
    mode: BufferMode,
}

impl MessageBuffer {
    /// Creates an empty write-mode buffer at the process default capacity.
    pub fn for_writing() -> Self {
        Self::for_writing_with_capacity(default_capacity())
    }

    /// Creates an empty write-mode buffer with an explicit capacity.
    pub fn for_writing_with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            length: 0,
            position: 0,
            mode: BufferMode::Write,
        }
    }

    /// Wraps a received datagram in a read-mode buffer. The whole datagram
    /// is the valid prefix; the read cursor starts at offset zero.
    pub fn for_reading(datagram: Vec<u8>) -> Self {
        let length = datagram.len();
        Self {
            data: datagram,
            length,
            position: 0,
            mode: BufferMode::Read,
        }
    }

    /// The buffer's mode.
    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    /// Bytes written (write mode) or received (read mode).
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the valid prefix is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The read cursor.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The valid prefix: everything written or received so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// A writer view. Inert (every operation fails) on a read-mode buffer.
    pub fn writer(&mut self) -> BufferWriter<'_> {
        BufferWriter { buf: self }
    }

    /// A reader view. Inert (every read yields the default) on a
    /// write-mode buffer.
    pub fn reader(&mut self) -> BufferReader<'_> {
        BufferReader { buf: self }
    }

    /// Overwrites bytes at an arbitrary offset without touching the append
    /// cursor; `length` is extended only if the patch ends past it.
    ///
    /// This is the escape hatch for stamping the sender id into an
    /// already-framed header, not a general write path.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) -> Result<(), WireError> {
        let end = offset + bytes.len();
        if end > self.data.len() {
            let err = WireError::Overflow {
                requested: bytes.len(),
                over_by: end - self.data.len(),
            };
            tracing::warn!(%err, offset, "patch rejected");
            return Err(err);
        }
        self.data[offset..end].copy_from_slice(bytes);
        if end > self.length {
            self.length = end;
        }
        Ok(())
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::for_writing()
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Appends big-endian primitives and length-prefixed strings to a
/// write-mode [`MessageBuffer`].
///
/// Each successful operation returns the bytes it appended. A rejected
/// operation leaves the buffer untouched.
pub struct BufferWriter<'a> {
    buf: &'a mut MessageBuffer,
}

macro_rules! write_primitive {
    ($(($fn:ident, $ty:ty)),+ $(,)?) => {$(
        #[doc = concat!("Appends a big-endian `", stringify!($ty), "`.")]
        pub fn $fn(&mut self, value: $ty) -> Result<usize, WireError> {
            self.append(&value.to_be_bytes())
        }
    )+};
}

impl BufferWriter<'_> {
    /// Core append: mode check, then the historical strict headroom check.
    ///
    /// The bound is `length + n >= capacity`, not `>`: a write that would
    /// fill the buffer exactly is rejected too. Long-standing wire-level
    /// behavior; callers keep one byte of headroom.
    fn append(&mut self, bytes: &[u8]) -> Result<usize, WireError> {
        if self.buf.mode != BufferMode::Write {
            let err = WireError::WrongMode {
                op: "write",
                mode: self.buf.mode.name(),
            };
            tracing::warn!(%err, "write rejected");
            return Err(err);
        }
        let capacity = self.buf.data.len();
        let end = self.buf.length + bytes.len();
        if end >= capacity {
            let err = WireError::Overflow {
                requested: bytes.len(),
                over_by: end + 1 - capacity,
            };
            tracing::warn!(%err, length = self.buf.length, capacity, "write rejected");
            return Err(err);
        }
        self.buf.data[self.buf.length..end].copy_from_slice(bytes);
        self.buf.length = end;
        Ok(bytes.len())
    }

    write_primitive!(
        (write_u8, u8),
        (write_i8, i8),
        (write_u16, u16),
        (write_i16, i16),
        (write_u32, u32),
        (write_i32, i32),
        (write_u64, u64),
        (write_i64, i64),
        (write_f32, f32),
        (write_f64, f64),
    );

    /// Appends a bool as a single byte (1 or 0).
    pub fn write_bool(&mut self, value: bool) -> Result<usize, WireError> {
        self.append(&[u8::from(value)])
    }

    /// Appends a character as a single ASCII byte.
    pub fn write_char(&mut self, value: char) -> Result<usize, WireError> {
        self.append(&[value as u8])
    }

    /// Appends a `u16` length prefix followed by the string's ASCII bytes.
    ///
    /// The prefix and payload are appended atomically: if the whole frame
    /// does not fit, nothing is written.
    pub fn write_str(&mut self, value: &str) -> Result<usize, WireError> {
        let Ok(len) = u16::try_from(value.len()) else {
            let err = WireError::StringTooLong { len: value.len() };
            tracing::warn!(%err, "write rejected");
            return Err(err);
        };
        let mut frame = Vec::with_capacity(2 + value.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(value.as_bytes());
        self.append(&frame)
    }

    /// Serializes a user-defined value through its
    /// [`WireSerialize`](crate::WireSerialize) implementation.
    pub fn write_value<T: crate::WireSerialize>(&mut self, value: &T) -> Result<usize, WireError> {
        value.serialize(self)
    }

    /// Bytes appended so far.
    pub fn written(&self) -> usize {
        self.buf.length
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Decodes big-endian primitives and length-prefixed strings from a
/// read-mode [`MessageBuffer`].
///
/// A read that would pass the valid prefix, or a read on a write-mode
/// buffer, logs the rejection and returns the type's default value without
/// moving the cursor.
pub struct BufferReader<'a> {
    buf: &'a mut MessageBuffer,
}

macro_rules! read_primitive {
    ($(($fn:ident, $ty:ty)),+ $(,)?) => {$(
        #[doc = concat!("Reads a big-endian `", stringify!($ty), "`, or `", stringify!($ty), "::default()` on underflow.")]
        pub fn $fn(&mut self) -> $ty {
            self.take::<{ std::mem::size_of::<$ty>() }>()
                .map(<$ty>::from_be_bytes)
                .unwrap_or_default()
        }
    )+};
}

impl BufferReader<'_> {
    /// Core take: mode check, bounds check, cursor advance.
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.buf.mode != BufferMode::Read {
            let err = WireError::WrongMode {
                op: "read",
                mode: self.buf.mode.name(),
            };
            tracing::warn!(%err, "read rejected");
            return None;
        }
        let remaining = self.buf.length - self.buf.position;
        if N > remaining {
            let err = WireError::Underflow {
                requested: N,
                remaining,
            };
            tracing::warn!(%err, position = self.buf.position, "read rejected");
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf.data[self.buf.position..self.buf.position + N]);
        self.buf.position += N;
        Some(out)
    }

    read_primitive!(
        (read_u8, u8),
        (read_i8, i8),
        (read_u16, u16),
        (read_i16, i16),
        (read_u32, u32),
        (read_i32, i32),
        (read_u64, u64),
        (read_i64, i64),
        (read_f32, f32),
        (read_f64, f64),
    );

    /// Reads a bool from a single byte, or `false` on underflow.
    pub fn read_bool(&mut self) -> bool {
        self.take::<1>().map(|[b]| b != 0).unwrap_or_default()
    }

    /// Reads a single ASCII byte as a character, or `'\0'` on underflow.
    pub fn read_char(&mut self) -> char {
        self.take::<1>().map(|[b]| b as char).unwrap_or_default()
    }

    /// Reads a `u16`-prefixed ASCII string.
    ///
    /// A declared length of zero yields `""` consuming only the prefix.
    /// A declared length past the valid prefix is an underflow: the cursor
    /// rewinds to the start of the field and `""` is returned.
    pub fn read_str(&mut self) -> String {
        let start = self.buf.position;
        let Some(prefix) = self.take::<2>() else {
            return String::new();
        };
        let len = u16::from_be_bytes(prefix) as usize;
        if len == 0 {
            return String::new();
        }
        let remaining = self.buf.length - self.buf.position;
        if len > remaining {
            let err = WireError::Underflow {
                requested: len,
                remaining,
            };
            tracing::warn!(%err, "string read rejected");
            self.buf.position = start;
            return String::new();
        }
        let bytes = &self.buf.data[self.buf.position..self.buf.position + len];
        let value = String::from_utf8_lossy(bytes).into_owned();
        self.buf.position += len;
        value
    }

    /// Default-constructs a value, then fills it through its
    /// [`WireSerialize`](crate::WireSerialize) implementation.
    pub fn read_value<T: crate::WireSerialize + Default>(&mut self) -> T {
        let mut value = T::default();
        value.deserialize(self);
        value
    }

    /// Bytes left between the cursor and the end of the valid prefix.
    pub fn remaining(&self) -> usize {
        self.buf.length - self.buf.position
    }
}

// =========================================================================
// Tests
// =========================================================================
