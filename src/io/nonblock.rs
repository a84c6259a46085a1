//! Single-attempt primitive access and the non-blocking stream calls
//!
//! Blocking stream paths loop on [`Attempt::Retry`]; the non-blocking calls
//! here hand it straight back so the caller decides when to try again.
//! Interruptions are not retried on this path either.

use std::io;

use super::encoding::Encoding;
use super::error::{Capability, Error, Result, Transient};
use super::primitive::Primitive;
use super::stream::Stream;

/// Outcome of one primitive transfer that did not fail hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Data or a byte count was transferred.
    Ready(T),
    /// Nothing was transferred; the same call may succeed later.
    Retry(Transient),
    /// The primitive has no more data.
    EndOfData,
}

impl<T> Attempt<T> {
    /// Whether the call transferred something.
    pub fn is_ready(&self) -> bool {
        matches!(self, Attempt::Ready(_))
    }

    /// Whether the call should be repeated later.
    pub fn is_retry(&self) -> bool {
        matches!(self, Attempt::Retry(_))
    }

    /// The transferred value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Attempt::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Map the ready value, keeping the other outcomes.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Attempt<U> {
        match self {
            Attempt::Ready(value) => Attempt::Ready(f(value)),
            Attempt::Retry(transient) => Attempt::Retry(transient),
            Attempt::EndOfData => Attempt::EndOfData,
        }
    }

    /// Fold into the error taxonomy for callers that prefer `?`.
    pub fn into_result(self) -> Result<T> {
        match self {
            Attempt::Ready(value) => Ok(value),
            Attempt::Retry(transient) => Err(Error::Transient(transient)),
            Attempt::EndOfData => Err(Error::EndOfData),
        }
    }
}

/// One raw read. Never retries.
pub(crate) fn attempt_read<P: Primitive + ?Sized>(
    inner: &mut P,
    buf: &mut [u8],
) -> Result<Attempt<usize>> {
    match inner.raw_read(buf) {
        Ok(0) if !buf.is_empty() => Ok(Attempt::EndOfData),
        Ok(n) => Ok(Attempt::Ready(n)),
        Err(err) => classify(err),
    }
}

/// One raw write. A primitive that accepts nothing from a non-empty buffer
/// is reported as a hard failure.
pub(crate) fn attempt_write<P: Primitive + ?Sized>(
    inner: &mut P,
    buf: &[u8],
) -> Result<Attempt<usize>> {
    match inner.raw_write(buf) {
        Ok(0) if !buf.is_empty() => Err(Error::Transport(io::Error::new(
            io::ErrorKind::WriteZero,
            "primitive accepted no bytes",
        ))),
        Ok(n) => Ok(Attempt::Ready(n)),
        Err(err) => classify(err),
    }
}

fn classify<T>(err: io::Error) -> Result<Attempt<T>> {
    match Transient::from_kind(err.kind()) {
        Some(transient) => Ok(Attempt::Retry(transient)),
        None => Err(Error::Transport(err)),
    }
}

impl<P: Primitive> Stream<P> {
    /// Read at most `length` bytes without blocking.
    ///
    /// Buffered bytes are returned first without touching the primitive.
    /// Otherwise the primitive is switched to non-blocking mode and read
    /// once.
    ///
    /// # Examples
    /// ```
    /// use iolike::{Attempt, ReadPrimitive, Stream};
    /// use std::io::Cursor;
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(Cursor::new(b"abc".to_vec())));
    /// stream.ungetbyte(b'z').unwrap();
    /// // Pushed-back data is served without switching modes.
    /// assert_eq!(stream.read_nonblock(8).unwrap(), Attempt::Ready(b"z".to_vec()));
    /// // A cursor cannot switch to non-blocking mode.
    /// assert!(stream.read_nonblock(8).is_err());
    /// ```
    pub fn read_nonblock(&mut self, length: usize) -> Result<Attempt<Vec<u8>>> {
        self.check_readable()?;
        if length == 0 {
            return Ok(Attempt::Ready(Vec::new()));
        }
        if !self.rbuf.is_empty() {
            return Ok(Attempt::Ready(self.rbuf.take(length)));
        }
        if self.rbuf.has_deferred() {
            return match self.fill(1) {
                Err(Error::EndOfData) => Ok(Attempt::EndOfData),
                Err(err) => Err(err),
                Ok(()) => Ok(Attempt::Ready(self.rbuf.take(length))),
            };
        }

        self.enter_nonblocking()?;
        if self.inner.is_duplexed() {
            if let Attempt::Retry(transient) = self.drain_nonblock()? {
                return Ok(Attempt::Retry(transient));
            }
        }

        let mut buf = vec![0u8; length.min(self.config.chunk_size)];
        let attempt = attempt_read(&mut self.inner, &mut buf)?;
        Ok(attempt.map(|n| {
            buf.truncate(n);
            buf
        }))
    }

    /// Write as much of `data` as the primitive takes without blocking.
    ///
    /// Pending buffered output goes first; if that cannot finish, nothing
    /// of `data` is written and the retry signal is returned.
    pub fn write_nonblock(&mut self, data: &[u8]) -> Result<Attempt<usize>> {
        self.check_writable()?;
        self.enter_nonblocking()?;
        if let Attempt::Retry(transient) = self.drain_nonblock()? {
            return Ok(Attempt::Retry(transient));
        }
        if data.is_empty() {
            return Ok(Attempt::Ready(0));
        }
        attempt_write(&mut self.inner, data)
    }

    /// Like [`Stream::write_nonblock`], converting `text` to the external
    /// encoding first.
    pub fn write_str_nonblock(&mut self, text: &str) -> Result<Attempt<usize>> {
        self.check_writable()?;
        let encoded = self.encode_for_write(text.as_bytes(), Encoding::utf_8())?;
        self.write_nonblock(&encoded)
    }

    fn drain_nonblock(&mut self) -> Result<Attempt<()>> {
        while !self.wbuf.is_empty() {
            match attempt_write(&mut self.inner, self.wbuf.as_slice())? {
                Attempt::Ready(n) => self.wbuf.consume(n),
                Attempt::Retry(transient) => return Ok(Attempt::Retry(transient)),
                Attempt::EndOfData => {}
            }
        }
        Ok(Attempt::Ready(()))
    }

    pub(crate) fn enter_nonblocking(&mut self) -> Result<()> {
        if self.nonblocking {
            return Ok(());
        }
        self.inner.set_nonblocking(true).map_err(|err| {
            if err.kind() == io::ErrorKind::Unsupported {
                Error::Capability(Capability::NonBlocking)
            } else {
                Error::from(err)
            }
        })?;
        log_debug!("primitive switched to non-blocking mode");
        self.nonblocking = true;
        Ok(())
    }

    /// Blocking paths put the primitive back into blocking mode first.
    pub(crate) fn leave_nonblocking(&mut self) -> Result<()> {
        if !self.nonblocking {
            return Ok(());
        }
        self.inner.set_nonblocking(false)?;
        log_debug!("primitive switched back to blocking mode");
        self.nonblocking = false;
        Ok(())
    }
}
