//! Read and write buffering between a [`Stream`] and its primitive
//!
//! The read buffer is a FIFO with a movable head so pushed-back bytes can be
//! prepended cheaply. The write buffer accumulates output until it is
//! drained, either explicitly, because it would overflow, because the stream
//! is in sync mode, or because a duplexed stream is about to read.

use super::error::{Error, Result, Transient};
use super::nonblock::{attempt_read, attempt_write, Attempt};
use super::primitive::Primitive;
use super::stream::Stream;

/// Default number of bytes requested from the primitive per read (4KB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Default write buffer high-water mark (64KB)
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Consumed prefix length past which the read buffer compacts itself.
const COMPACT_THRESHOLD: usize = 8 * 1024;

/// End of data or a failure seen after some bytes were already buffered.
///
/// It is held back until the buffered bytes are consumed so the caller gets
/// the data first and the condition exactly once afterwards.
#[derive(Debug)]
pub(crate) enum Deferred {
    Eof,
    Error(Error),
}

#[derive(Debug, Default)]
pub(crate) struct ReadBuffer {
    data: Vec<u8>,
    pos: usize,
    deferred: Option<Deferred>,
}

impl ReadBuffer {
    pub(crate) fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Remove and return up to `n` bytes from the head.
    pub(crate) fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.len());
        let out = self.data[self.pos..self.pos + n].to_vec();
        self.consume(n);
        out
    }

    /// Copy up to `buf.len()` bytes out of the head.
    pub(crate) fn copy_to(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.consume(n);
        n
    }

    pub(crate) fn consume(&mut self, n: usize) {
        self.pos += n.min(self.len());
        if self.pos == self.data.len() {
            self.data.clear();
            self.pos = 0;
        }
    }

    /// Prepend bytes so they are the next ones read, in their given order.
    pub(crate) fn unread(&mut self, bytes: &[u8]) {
        if bytes.len() <= self.pos {
            let start = self.pos - bytes.len();
            self.data[start..self.pos].copy_from_slice(bytes);
            self.pos = start;
        } else {
            self.data.splice(self.pos..self.pos, bytes.iter().copied());
        }
    }

    /// One primitive read of at most `max` bytes appended at the tail.
    pub(crate) fn read_from<P: Primitive + ?Sized>(
        &mut self,
        inner: &mut P,
        max: usize,
    ) -> Result<Attempt<usize>> {
        self.compact();
        let start = self.data.len();
        self.data.resize(start + max, 0);
        let attempt = attempt_read(inner, &mut self.data[start..]);
        let filled = match attempt {
            Ok(Attempt::Ready(n)) => n,
            _ => 0,
        };
        self.data.truncate(start + filled);
        attempt
    }

    fn compact(&mut self) {
        if self.pos >= COMPACT_THRESHOLD && self.pos * 2 >= self.data.len() {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
    }

    pub(crate) fn defer(&mut self, deferred: Deferred) {
        self.deferred = Some(deferred);
    }

    pub(crate) fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub(crate) fn take_deferred(&mut self) -> Option<Deferred> {
        self.deferred.take()
    }

    /// Drop buffered bytes and anything deferred.
    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
        self.deferred = None;
    }
}

#[derive(Debug, Default)]
pub(crate) struct WriteBuffer {
    data: Vec<u8>,
}

impl WriteBuffer {
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub(crate) fn consume(&mut self, n: usize) {
        self.data.drain(..n.min(self.data.len()));
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
    }
}

impl<P: Primitive> Stream<P> {
    /// Grow the read buffer until it holds at least `at_least` bytes.
    ///
    /// Returns [`Error::EndOfData`] only when nothing is buffered and the
    /// primitive has no more data. EOF or a hard error arriving after some
    /// bytes were buffered is deferred to the next call that finds the
    /// buffer empty.
    pub(crate) fn fill(&mut self, at_least: usize) -> Result<()> {
        if self.rbuf.len() >= at_least {
            return Ok(());
        }
        if self.rbuf.has_deferred() {
            if !self.rbuf.is_empty() {
                return Ok(());
            }
            return match self.rbuf.take_deferred() {
                Some(Deferred::Error(err)) => Err(err),
                _ => Err(Error::EndOfData),
            };
        }

        self.flush_before_read()?;
        self.leave_nonblocking()?;

        while self.rbuf.len() < at_least {
            // Large requests are served in chunks; the loop keeps reading.
            match self.rbuf.read_from(&mut self.inner, self.config.chunk_size) {
                Ok(Attempt::Ready(_n)) => log_trace!(bytes = _n, "filled read buffer"),
                Ok(Attempt::EndOfData) => {
                    log_trace!(buffered = self.rbuf.len(), "primitive reported end of data");
                    if self.rbuf.is_empty() {
                        return Err(Error::EndOfData);
                    }
                    self.rbuf.defer(Deferred::Eof);
                    return Ok(());
                }
                Ok(Attempt::Retry(Transient::WouldBlock)) => self.inner.wait_readable()?,
                Ok(Attempt::Retry(Transient::Interrupted)) => {}
                Err(err) => {
                    if self.rbuf.is_empty() {
                        return Err(err);
                    }
                    log_debug!(buffered = self.rbuf.len(), error = %err, "deferring read error");
                    self.rbuf.defer(Deferred::Error(err));
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Take up to `n` bytes, filling first. `EndOfData` if none are left.
    pub(crate) fn buffered_read(&mut self, n: usize) -> Result<Vec<u8>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        self.fill(n)?;
        Ok(self.rbuf.take(n))
    }

    /// Write the whole write buffer to the primitive, blocking as needed.
    ///
    /// Bytes not yet accepted when a hard error occurs stay buffered.
    pub(crate) fn drain(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        self.leave_nonblocking()?;
        log_trace!(bytes = self.wbuf.len(), "draining write buffer");
        while !self.wbuf.is_empty() {
            match attempt_write(&mut self.inner, self.wbuf.as_slice())? {
                Attempt::Ready(n) => self.wbuf.consume(n),
                Attempt::Retry(Transient::WouldBlock) => self.inner.wait_writable()?,
                Attempt::Retry(Transient::Interrupted) | Attempt::EndOfData => {}
            }
        }
        Ok(())
    }

    /// Write `data` straight to the primitive, blocking until all of it is taken.
    pub(crate) fn write_through(&mut self, mut data: &[u8]) -> Result<()> {
        self.leave_nonblocking()?;
        while !data.is_empty() {
            match attempt_write(&mut self.inner, data)? {
                Attempt::Ready(n) => data = &data[n..],
                Attempt::Retry(Transient::WouldBlock) => self.inner.wait_writable()?,
                Attempt::Retry(Transient::Interrupted) | Attempt::EndOfData => {}
            }
        }
        Ok(())
    }

    /// Duplexed transports see every pending write before the next read.
    pub(crate) fn flush_before_read(&mut self) -> Result<()> {
        if self.inner.is_duplexed() && !self.wbuf.is_empty() {
            self.drain()?;
        }
        Ok(())
    }

    /// Buffer `data` for writing, draining when it would not fit.
    ///
    /// Payloads larger than the whole buffer bypass it once the pending
    /// bytes have been drained ahead of them.
    pub(crate) fn buffered_write(&mut self, data: &[u8]) -> Result<usize> {
        let capacity = self.config.write_buffer_size;
        if self.wbuf.len() + data.len() <= capacity {
            self.wbuf.extend(data);
        } else {
            self.drain()?;
            if data.len() > capacity {
                self.write_through(data)?;
            } else {
                self.wbuf.extend(data);
            }
        }

        if self.sync {
            self.drain()?;
        }
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::primitive::ReadPrimitive;
    use std::io::Cursor;

    #[test]
    fn test_read_buffer_take_and_consume() {
        let mut buf = ReadBuffer::default();
        let mut prim = ReadPrimitive::new(Cursor::new(b"Hello, world!".to_vec()));
        assert_eq!(buf.read_from(&mut prim, 5).unwrap(), Attempt::Ready(5));
        assert_eq!(buf.as_slice(), b"Hello");

        assert_eq!(buf.take(2), b"He");
        assert_eq!(buf.len(), 3);
        buf.consume(10);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unread_prepends_in_order() {
        let mut buf = ReadBuffer::default();
        let mut prim = ReadPrimitive::new(Cursor::new(b"cdef".to_vec()));
        buf.read_from(&mut prim, 16).unwrap();

        buf.consume(1);
        buf.unread(b"z");
        assert_eq!(buf.as_slice(), b"zdef");

        buf.unread(b"ab");
        assert_eq!(buf.as_slice(), b"abzdef");
    }

    #[test]
    fn test_unread_into_empty_buffer() {
        let mut buf = ReadBuffer::default();
        buf.unread(b"xy");
        buf.unread(b"w");
        assert_eq!(buf.take(8), b"wxy");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_from_reports_eof() {
        let mut buf = ReadBuffer::default();
        let mut prim = ReadPrimitive::new(Cursor::new(Vec::new()));
        assert_eq!(buf.read_from(&mut prim, 8).unwrap(), Attempt::EndOfData);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_compaction_keeps_unread_bytes() {
        let data: Vec<u8> = (0..COMPACT_THRESHOLD * 2).map(|i| (i % 251) as u8).collect();
        let mut prim = ReadPrimitive::new(Cursor::new(data.clone()));
        let mut buf = ReadBuffer::default();
        buf.read_from(&mut prim, COMPACT_THRESHOLD + 10).unwrap();
        buf.consume(COMPACT_THRESHOLD);
        buf.read_from(&mut prim, 10).unwrap();

        assert_eq!(buf.as_slice(), &data[COMPACT_THRESHOLD..COMPACT_THRESHOLD + 20]);
    }

    #[test]
    fn test_write_buffer_consume() {
        let mut buf = WriteBuffer::default();
        buf.extend(b"Hello");
        buf.extend(b", world");
        buf.consume(7);
        assert_eq!(buf.as_slice(), b"world");
        buf.clear();
        assert!(buf.is_empty());
    }
}
