//! Error types for stream operations
//!
//! Every fallible stream call returns [`Result`]. The variants follow the
//! classes a caller actually has to tell apart: end of data, a closed
//! stream, a missing capability, a bad argument, a transient condition
//! worth retrying, a character conversion failure, and everything else the
//! transport reports.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Direction or mode a stream was asked to support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    NonBlocking,
    Seek,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Read => f.write_str("not opened for reading"),
            Capability::Write => f.write_str("not opened for writing"),
            Capability::NonBlocking => f.write_str("non-blocking mode not supported"),
            Capability::Seek => f.write_str("stream is not seekable"),
        }
    }
}

/// A condition that is expected to clear if the operation is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transient {
    /// The primitive call was interrupted before transferring anything.
    Interrupted,
    /// The primitive is in non-blocking mode and has nothing to transfer.
    WouldBlock,
}

impl Transient {
    /// Classify an I/O error kind, returning `None` for hard failures.
    pub fn from_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::Interrupted => Some(Transient::Interrupted),
            io::ErrorKind::WouldBlock => Some(Transient::WouldBlock),
            _ => None,
        }
    }

    /// The matching `std::io` error kind.
    pub fn kind(self) -> io::ErrorKind {
        match self {
            Transient::Interrupted => io::ErrorKind::Interrupted,
            Transient::WouldBlock => io::ErrorKind::WouldBlock,
        }
    }
}

impl fmt::Display for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transient::Interrupted => f.write_str("interrupted"),
            Transient::WouldBlock => f.write_str("would block"),
        }
    }
}

/// Character conversion failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes that are not a valid sequence in the source encoding.
    #[error("invalid byte sequence {bytes:02x?} in {encoding}")]
    InvalidByteSequence {
        bytes: Vec<u8>,
        encoding: &'static str,
    },

    /// A character that has no representation in the target encoding.
    #[error("{character:?} from {from} has no representation in {to}")]
    UndefinedConversion {
        character: char,
        from: &'static str,
        to: &'static str,
    },

    /// A byte above 0x7F read from binary data with no character meaning.
    #[error("byte 0x{byte:02x} from binary has no representation in {to}")]
    UndefinedByte { byte: u8, to: &'static str },
}

/// Errors that can occur during stream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No data is left to satisfy a call that promises a value.
    #[error("end of data reached")]
    EndOfData,

    /// The stream (or the direction in use) has been closed.
    #[error("closed stream")]
    Closed,

    /// The stream lacks the direction or mode the call needs.
    #[error("{0}")]
    Capability(Capability),

    /// Malformed separator, limit, encoding name or configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Interrupted or would-block; only surfaced on non-blocking paths.
    #[error("transient condition: {0}")]
    Transient(Transient),

    /// Conversion between encodings failed under the configured policy.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Any other failure reported by the primitive.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),
}

impl Error {
    /// True for conditions a caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Whether this is the end of data rather than a failure.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Error::EndOfData)
    }

    /// Errors after which a record or read already holding data returns
    /// that data instead of failing.
    pub(crate) fn keeps_partial(&self) -> bool {
        matches!(
            self,
            Error::EndOfData | Error::Transport(_) | Error::Transient(_)
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match Transient::from_kind(err.kind()) {
            Some(transient) => Error::Transient(transient),
            None => Error::Transport(err),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::EndOfData => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            Error::Transient(transient) => io::Error::new(transient.kind(), err),
            Error::Capability(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            Error::InvalidArgument(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            Error::Decode(_) => io::Error::new(io::ErrorKind::InvalidData, err),
            Error::Transport(inner) => inner,
            Error::Closed => io::Error::other(err),
        }
    }
}
