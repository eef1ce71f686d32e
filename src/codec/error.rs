//! Error types for the message codec.
//!
//! - [`FramingError`]: a header announced a size the codec cannot honour.
//! - [`EofError`]: the stream ended part-way through a frame.
//! - [`CodecError`]: top-level enum wrapping both plus I/O errors.
//!
//! Every codec error is fatal to the connection: there is no resync marker
//! in the wire format, so a bad size leaves the stream desynchronised.

use std::io;

use thiserror::Error;

/// Wire-level errors detected while reading or writing a header.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// `message_size` is smaller than the header itself.
    #[error("frame size {size} is smaller than the {header_size} byte header")]
    UndersizedFrame {
        /// Size announced by the header.
        size: u32,
        /// Fixed header size.
        header_size: usize,
    },

    /// `message_size` exceeds the configured maximum.
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame {
        /// Size announced by the header.
        size: u32,
        /// Maximum allowed frame size.
        max: u32,
    },
}

/// Premature end-of-stream conditions.
///
/// EOF at a frame boundary is not an error; the decoder yields `None`.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the socket part-way through a header.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },

    /// The peer closed the socket part-way through a body.
    #[error("premature EOF: {bytes_received} of {expected} body bytes received")]
    MidBody {
        /// Body bytes received before EOF.
        bytes_received: usize,
        /// Body length announced by the header.
        expected: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use peerwire::codec::{CodecError, EofError};
///
/// let err = CodecError::Eof(EofError::MidHeader {
///     bytes_received: 3,
///     header_size: 8,
/// });
/// assert_eq!(err.error_type(), "eof");
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Header announced an unusable size.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"`, `"io"` or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }

    /// Recover a structured codec error from an `io::Error` produced by the
    /// codec, falling back to [`CodecError::Io`].
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        let structured = err.get_ref().and_then(|inner| {
            inner
                .downcast_ref::<FramingError>()
                .map(|e| Self::Framing(*e))
                .or_else(|| inner.downcast_ref::<EofError>().map(|e| Self::Eof(*e)))
        });
        structured.unwrap_or(Self::Io(err))
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}
