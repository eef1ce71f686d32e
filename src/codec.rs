//! Length-framed codec for [`Message`]s.
//!
//! Each frame is an eight-byte little-endian [`Header`] followed by
//! `message_size - 8` body bytes. There is no magic number or checksum;
//! framing relies on the peer sending self-consistent sizes, and any
//! inconsistency is fatal to the connection.
//!
//! The decoder is the read half of the connection pump: it alternates
//! between [`ReadState::ReadingHeader`] and [`ReadState::ReadingBody`],
//! skipping the body read entirely for header-only frames.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::message::{HEADER_SIZE, Header, Message};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Default cap on a single frame (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

#[expect(
    clippy::cast_possible_truncation,
    reason = "HEADER_SIZE is a small constant"
)]
const HEADER_SIZE_U32: u32 = HEADER_SIZE as u32;

/// Position of the decoder within the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    /// Waiting for a complete header.
    ReadingHeader,
    /// Header accepted; waiting for this many body bytes.
    ReadingBody(Header),
}

/// Tokio codec translating between byte streams and [`Message`]s.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use peerwire::{codec::MessageCodec, message::Message};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = MessageCodec::default();
/// let mut buf = BytesMut::new();
/// let mut msg = Message::new(1);
/// msg.push(5_u16).expect("push");
/// codec.encode(msg.clone(), &mut buf).expect("encode");
///
/// assert_eq!(codec.decode(&mut buf).expect("decode"), Some(msg));
/// ```
#[derive(Clone, Debug)]
pub struct MessageCodec {
    max_message_size: u32,
    state: ReadState,
}

impl Default for MessageCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_MESSAGE_SIZE) }
}

impl MessageCodec {
    /// Construct a codec rejecting frames larger than `max_message_size`.
    ///
    /// Values below the header size are raised to it.
    #[must_use]
    pub fn new(max_message_size: u32) -> Self {
        Self {
            max_message_size: max_message_size.max(HEADER_SIZE_U32),
            state: ReadState::ReadingHeader,
        }
    }

    /// Largest frame this codec accepts.
    #[must_use]
    pub fn max_message_size(&self) -> u32 { self.max_message_size }

    /// Current decoder position.
    #[must_use]
    pub fn read_state(&self) -> ReadState { self.state }

    fn check_size(&self, size: u32) -> Result<(), FramingError> {
        if size < HEADER_SIZE_U32 {
            return Err(FramingError::UndersizedFrame {
                size,
                header_size: HEADER_SIZE,
            });
        }
        if size > self.max_message_size {
            return Err(FramingError::OversizedFrame {
                size,
                max: self.max_message_size,
            });
        }
        Ok(())
    }
}

fn peek_header(src: &BytesMut) -> Option<Header> {
    src.get(..HEADER_SIZE)
        .and_then(|slice| <[u8; HEADER_SIZE]>::try_from(slice).ok())
        .map(Header::from_bytes)
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ReadState::ReadingHeader => {
                    let Some(header) = peek_header(src) else {
                        src.reserve(HEADER_SIZE - src.len());
                        return Ok(None);
                    };
                    self.check_size(header.message_size)
                        .map_err(CodecError::from)?;
                    src.advance(HEADER_SIZE);
                    self.state = ReadState::ReadingBody(header);
                }
                ReadState::ReadingBody(header) => {
                    let body_len = header.body_len().unwrap_or_default();
                    if src.len() < body_len {
                        src.reserve(body_len - src.len());
                        return Ok(None);
                    }
                    let body = src.split_to(body_len).to_vec();
                    self.state = ReadState::ReadingHeader;
                    let msg = Message::from_parts(header.message_type, body)
                        .map_err(io::Error::other)?;
                    return Ok(Some(msg));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(msg) = self.decode(src)? {
            return Ok(Some(msg));
        }
        let err = match self.state {
            ReadState::ReadingHeader if src.is_empty() => return Ok(None),
            ReadState::ReadingHeader => EofError::MidHeader {
                bytes_received: src.len(),
                header_size: HEADER_SIZE,
            },
            ReadState::ReadingBody(header) => EofError::MidBody {
                bytes_received: src.len(),
                expected: header.body_len().unwrap_or_default(),
            },
        };
        Err(CodecError::Eof(err).into())
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = item.header();
        self.check_size(header.message_size)
            .map_err(CodecError::from)?;
        dst.reserve(header.message_size as usize);
        dst.extend_from_slice(&header.to_bytes());
        dst.extend_from_slice(item.body());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn codec() -> MessageCodec {
        MessageCodec::new(64)
    }

    fn frame(message_type: u32, size: u32, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(
            &Header {
                message_type,
                message_size: size,
            }
            .to_bytes(),
        );
        buf.extend_from_slice(body);
        buf
    }

    #[rstest]
    fn header_only_frame_skips_body_read(mut codec: MessageCodec) {
        let mut buf = frame(0, 8, &[]);
        let msg = codec
            .decode(&mut buf)
            .expect("decode")
            .expect("complete frame");
        assert_eq!(msg.size(), 8);
        assert!(msg.is_empty());
        assert_eq!(codec.read_state(), ReadState::ReadingHeader);
    }

    #[rstest]
    fn partial_body_waits_for_more_bytes(mut codec: MessageCodec) {
        let mut buf = frame(4, 12, &[1, 2]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());
        assert!(matches!(codec.read_state(), ReadState::ReadingBody(_)));

        buf.extend_from_slice(&[3, 4]);
        let msg = codec.decode(&mut buf).expect("decode").expect("frame");
        assert_eq!(msg.message_type(), 4);
        assert_eq!(msg.body(), &[1, 2, 3, 4]);
    }

    #[rstest]
    fn back_to_back_frames_decode_in_order(mut codec: MessageCodec) {
        let mut buf = frame(1, 9, &[10]);
        buf.extend_from_slice(&frame(2, 8, &[]));
        buf.extend_from_slice(&frame(3, 10, &[30, 31]));

        let types: Vec<u32> = std::iter::from_fn(|| codec.decode(&mut buf).expect("decode"))
            .map(|m| m.message_type())
            .collect();
        assert_eq!(types, vec![1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[rstest]
    #[case::undersized(4, "framing")]
    #[case::zero(0, "framing")]
    #[case::oversized(65, "framing")]
    fn bad_sizes_are_fatal(mut codec: MessageCodec, #[case] size: u32, #[case] kind: &str) {
        let mut buf = frame(0, size, &[]);
        let err = codec.decode(&mut buf).expect_err("size must be rejected");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(CodecError::from_io(err).error_type(), kind);
    }

    #[rstest]
    fn eof_at_boundary_is_clean(mut codec: MessageCodec) {
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).expect("clean eof").is_none());
    }

    #[rstest]
    fn eof_mid_body_reports_progress(mut codec: MessageCodec) {
        let mut buf = frame(0, 16, &[1, 2, 3]);
        let err = codec.decode_eof(&mut buf).expect_err("truncated body");
        assert!(matches!(
            CodecError::from_io(err),
            CodecError::Eof(EofError::MidBody {
                bytes_received: 3,
                expected: 8
            })
        ));
    }

    #[rstest]
    fn eof_mid_header_reports_progress(mut codec: MessageCodec) {
        let mut buf = BytesMut::from(&[1_u8, 2, 3][..]);
        let err = codec.decode_eof(&mut buf).expect_err("truncated header");
        assert!(matches!(
            CodecError::from_io(err),
            CodecError::Eof(EofError::MidHeader {
                bytes_received: 3,
                header_size: 8
            })
        ));
    }

    #[rstest]
    fn encoder_refuses_oversized_messages(mut codec: MessageCodec) {
        let mut msg = Message::new(0);
        msg.push_bytes(&[0; 60]).expect("push");
        let mut buf = BytesMut::new();
        assert!(codec.encode(msg, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn max_size_never_drops_below_header() {
        assert_eq!(MessageCodec::new(0).max_message_size(), 8);
    }
}
