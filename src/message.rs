//! Framed messages exchanged between peers.
//!
//! A [`Message`] is a fixed eight-byte [`Header`] followed by an opaque
//! body. The body behaves as a stack: [`Message::push`] appends the raw
//! little-endian bytes of a value to the tail and [`Message::pop`] removes
//! them from the tail again.
//!
//! **Fields come back in reverse order.** Write fields in order, read them
//! back in reverse:
//!
//! ```
//! use peerwire::message::Message;
//!
//! let mut msg = Message::new(7);
//! msg.push(1_u32)?.push(2.5_f64)?.push(true)?;
//!
//! assert!(msg.pop::<bool>()?);
//! assert_eq!(msg.pop::<f64>()?, 2.5);
//! assert_eq!(msg.pop::<u32>()?, 1);
//! assert!(msg.is_empty());
//! # Ok::<(), peerwire::message::MessageError>(())
//! ```
//!
//! The header's `message_size` always equals [`HEADER_SIZE`] plus the body
//! length; every mutation recomputes it before returning.

use std::fmt;

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::connection::Remote;

/// Size in bytes of an encoded [`Header`].
pub const HEADER_SIZE: usize = 8;

/// Largest body that still lets `message_size` fit in a `u32`.
pub const MAX_BODY_LEN: usize = u32::MAX as usize - HEADER_SIZE;

/// Length suffix written after each bincode-encoded field.
const ENCODED_LEN_SIZE: usize = 4;

/// Errors raised while mutating a [`Message`] body.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The body holds fewer bytes than the requested field.
    #[error("message body underflow: need {needed} bytes, {available} available")]
    Underflow {
        /// Bytes required by the read.
        needed: usize,
        /// Bytes left in the body.
        available: usize,
    },
    /// Appending would push `message_size` past `u32::MAX`.
    #[error("message body too large: {requested} bytes exceeds {max}", max = MAX_BODY_LEN)]
    BodyTooLarge {
        /// Body length the append would have produced.
        requested: usize,
    },
    /// A structured field could not be encoded.
    #[error("failed to encode field")]
    Encode(#[source] bincode::error::EncodeError),
    /// A structured field could not be decoded.
    #[error("failed to decode field")]
    Decode(#[source] bincode::error::DecodeError),
}

/// Fixed-size message header as it appears on the wire.
///
/// Both fields are little-endian `u32`s. `message_size` counts the header
/// itself, so an empty message has `message_size == 8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Header {
    /// Application-defined message tag.
    pub message_type: u32,
    /// Total frame length: header plus body.
    pub message_size: u32,
}

impl Header {
    /// Serialise the header into its on-wire bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use peerwire::message::Header;
    ///
    /// let header = Header {
    ///     message_type: 1,
    ///     message_size: 8,
    /// };
    /// assert_eq!(header.to_bytes(), [1, 0, 0, 0, 8, 0, 0, 0]);
    /// ```
    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.message_type.to_le_bytes());
        out[4..].copy_from_slice(&self.message_size.to_le_bytes());
        out
    }

    /// Parse a header from its on-wire bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        let [t0, t1, t2, t3, s0, s1, s2, s3] = bytes;
        Self {
            message_type: u32::from_le_bytes([t0, t1, t2, t3]),
            message_size: u32::from_le_bytes([s0, s1, s2, s3]),
        }
    }

    /// Number of body bytes announced by this header.
    ///
    /// Returns `None` when `message_size` is smaller than the header itself,
    /// which can only happen for a corrupt frame.
    #[must_use]
    pub fn body_len(self) -> Option<usize> {
        (self.message_size as usize).checked_sub(HEADER_SIZE)
    }
}

/// A fixed-size value that can be pushed onto and popped off a message body.
///
/// Implementations write exactly [`Field::SIZE`] bytes. The crate covers the
/// primitive integers, floats, `bool` and byte arrays; applications may
/// implement it for their own plain-data types.
pub trait Field: Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Append the encoded value to `dst`.
    fn write_to(self, dst: &mut Vec<u8>);

    /// Decode a value from exactly [`Field::SIZE`] bytes.
    fn read_from(src: &[u8]) -> Self;
}

macro_rules! impl_le_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Field for $ty {
                const SIZE: usize = size_of::<$ty>();

                fn write_to(self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self.to_le_bytes()); }

                fn read_from(src: &[u8]) -> Self {
                    let mut bytes = [0u8; size_of::<$ty>()];
                    bytes.copy_from_slice(src);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_le_field!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl Field for bool {
    const SIZE: usize = 1;

    fn write_to(self, dst: &mut Vec<u8>) { dst.push(u8::from(self)); }

    fn read_from(src: &[u8]) -> Self { src.first().is_some_and(|b| *b != 0) }
}

impl<const N: usize> Field for [u8; N] {
    const SIZE: usize = N;

    fn write_to(self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self); }

    fn read_from(src: &[u8]) -> Self {
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        out
    }
}

/// One framed message: a header plus a LIFO body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    header: Header,
    body: Vec<u8>,
}

impl Default for Message {
    fn default() -> Self { Self::new(0) }
}

impl Message {
    /// Create an empty message carrying `message_type`.
    #[must_use]
    pub fn new(message_type: u32) -> Self {
        Self {
            header: Header {
                message_type,
                message_size: HEADER_SIZE as u32,
            },
            body: Vec::new(),
        }
    }

    /// Rebuild a message from a received header tag and body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::BodyTooLarge`] if `body` cannot be described
    /// by a `u32` `message_size`.
    pub fn from_parts(message_type: u32, body: Vec<u8>) -> Result<Self, MessageError> {
        if body.len() > MAX_BODY_LEN {
            return Err(MessageError::BodyTooLarge {
                requested: body.len(),
            });
        }
        let mut msg = Self::new(message_type);
        msg.body = body;
        msg.sync_size();
        Ok(msg)
    }

    /// Current header, with `message_size` matching the body.
    #[must_use]
    pub fn header(&self) -> Header { self.header }

    /// Application-defined message tag.
    #[must_use]
    pub fn message_type(&self) -> u32 { self.header.message_type }

    /// Replace the message tag.
    pub fn set_message_type(&mut self, message_type: u32) {
        self.header.message_type = message_type;
    }

    /// Total frame length on the wire.
    #[must_use]
    pub fn size(&self) -> u32 { self.header.message_size }

    /// Raw body bytes in push order.
    #[must_use]
    pub fn body(&self) -> &[u8] { &self.body }

    /// Number of body bytes.
    #[must_use]
    pub fn body_len(&self) -> usize { self.body.len() }

    /// Returns `true` when the body holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.body.is_empty() }

    /// Consume the message, returning its body.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> { self.body }

    /// Append `value` to the tail of the body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::BodyTooLarge`] if the frame would exceed
    /// `u32::MAX` bytes. The message is left unchanged.
    pub fn push<T: Field>(&mut self, value: T) -> Result<&mut Self, MessageError> {
        self.ensure_room(T::SIZE)?;
        value.write_to(&mut self.body);
        self.sync_size();
        Ok(self)
    }

    /// Remove the last `T::SIZE` bytes of the body and decode them.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Underflow`] if the body is shorter than
    /// `T::SIZE`. The message is left unchanged.
    pub fn pop<T: Field>(&mut self) -> Result<T, MessageError> {
        let start = self.tail_start(T::SIZE)?;
        let value = T::read_from(&self.body[start..]);
        self.truncate_body(start);
        Ok(value)
    }

    /// Append raw bytes to the tail of the body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::BodyTooLarge`] if the frame would exceed
    /// `u32::MAX` bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, MessageError> {
        self.ensure_room(bytes.len())?;
        self.body.extend_from_slice(bytes);
        self.sync_size();
        Ok(self)
    }

    /// Remove the last `len` bytes of the body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Underflow`] if fewer than `len` bytes remain.
    pub fn pop_bytes(&mut self, len: usize) -> Result<Vec<u8>, MessageError> {
        let start = self.tail_start(len)?;
        let out = self.body.split_off(start);
        self.sync_size();
        Ok(out)
    }

    /// Append a bincode-encoded value followed by its `u32` length.
    ///
    /// The trailing length lets [`Message::pop_decoded`] find the start of
    /// the value when popping from the tail, so variable-length fields obey
    /// the same reverse-order rule as fixed-size ones.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Encode`] if encoding fails or
    /// [`MessageError::BodyTooLarge`] if the frame would overflow.
    pub fn push_encoded<T: Encode>(&mut self, value: &T) -> Result<&mut Self, MessageError> {
        let encoded = bincode::encode_to_vec(value, bincode::config::standard())
            .map_err(MessageError::Encode)?;
        let len = u32::try_from(encoded.len()).map_err(|_| MessageError::BodyTooLarge {
            requested: self.body.len().saturating_add(encoded.len()),
        })?;
        self.ensure_room(encoded.len() + ENCODED_LEN_SIZE)?;
        self.body.extend_from_slice(&encoded);
        len.write_to(&mut self.body);
        self.sync_size();
        Ok(self)
    }

    /// Pop a value previously appended with [`Message::push_encoded`].
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Underflow`] if the body is too short for the
    /// recorded length, or [`MessageError::Decode`] if the bytes do not
    /// decode as `T`. The message is left unchanged on error.
    pub fn pop_decoded<T: Decode<()>>(&mut self) -> Result<T, MessageError> {
        let len_start = self.tail_start(ENCODED_LEN_SIZE)?;
        let len = u32::read_from(&self.body[len_start..]) as usize;
        let value_start = len_start
            .checked_sub(len)
            .ok_or(MessageError::Underflow {
                needed: len + ENCODED_LEN_SIZE,
                available: self.body.len(),
            })?;
        let (value, _) = bincode::decode_from_slice(
            &self.body[value_start..len_start],
            bincode::config::standard(),
        )
        .map_err(MessageError::Decode)?;
        self.truncate_body(value_start);
        Ok(value)
    }

    fn ensure_room(&self, extra: usize) -> Result<(), MessageError> {
        let requested = self.body.len().saturating_add(extra);
        if requested > MAX_BODY_LEN {
            return Err(MessageError::BodyTooLarge { requested });
        }
        Ok(())
    }

    fn tail_start(&self, needed: usize) -> Result<usize, MessageError> {
        self.body
            .len()
            .checked_sub(needed)
            .ok_or(MessageError::Underflow {
                needed,
                available: self.body.len(),
            })
    }

    fn truncate_body(&mut self, len: usize) {
        self.body.truncate(len);
        self.sync_size();
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "body length is capped at MAX_BODY_LEN by every mutation"
    )]
    fn sync_size(&mut self) {
        self.header.message_size = (HEADER_SIZE + self.body.len()) as u32;
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {} size: {}",
            self.header.message_type, self.header.message_size
        )
    }
}

/// A received message tagged with the connection it arrived on.
///
/// Client-side messages carry no remote; the client has a single peer.
/// Server-side messages carry a [`Remote`] identifying the sender without
/// keeping its socket alive.
#[derive(Clone, Debug)]
pub struct OwnedMessage {
    /// Originating connection, if any.
    pub remote: Option<Remote>,
    /// The decoded message.
    pub message: Message,
}

impl fmt::Display for OwnedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&self.message, f) }
}
