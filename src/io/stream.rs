//! The buffered stream over a [`Primitive`]
//!
//! [`Stream`] owns the primitive, one read buffer, one write buffer, the
//! line counter and the encoding setup. Record, character, pushback,
//! non-blocking and iteration calls live in their own modules as further
//! `impl` blocks on the same type; this one holds construction, state,
//! byte-level reads, writes, positioning, encodings and closing.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use super::buffer::{Deferred, ReadBuffer, WriteBuffer};
use super::config::StreamConfig;
use super::encoding::{transcode, ConversionOptions, Encoding, EncodingDescriptor, Text};
use super::error::{Capability, Error, Result, Transient};
use super::nonblock::{attempt_read, attempt_write, Attempt};
use super::primitive::Primitive;

/// Buffered, encoding-aware stream over a raw primitive.
///
/// Calls must come from one owner at a time; wrap the stream in a mutex to
/// share it.
///
/// # Examples
/// ```
/// use iolike::{DuplexPrimitive, Stream};
/// use std::io::Cursor;
///
/// let mut stream = Stream::new(DuplexPrimitive::new(Cursor::new(Vec::new())));
/// stream.puts(&["first", "second\n"]).unwrap();
/// stream.flush().unwrap();
/// assert_eq!(stream.get_ref().get_ref().get_ref(), b"first\nsecond\n");
/// ```
pub struct Stream<P: Primitive> {
    pub(crate) inner: P,
    pub(crate) config: StreamConfig,
    pub(crate) rbuf: ReadBuffer,
    pub(crate) wbuf: WriteBuffer,
    external: Option<Encoding>,
    internal: Option<Encoding>,
    binmode: bool,
    options: ConversionOptions,
    pub(crate) lineno: u64,
    closed: bool,
    read_closed: bool,
    write_closed: bool,
    pub(crate) sync: bool,
    pub(crate) nonblocking: bool,
}

impl<P: Primitive> Stream<P> {
    /// Wrap `inner` with the default configuration.
    pub fn new(inner: P) -> Self {
        Self::build(inner, StreamConfig::default())
    }

    /// Wrap `inner` with an explicit configuration.
    pub fn with_config(inner: P, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(inner, config))
    }

    fn build(inner: P, config: StreamConfig) -> Self {
        Self {
            inner,
            rbuf: ReadBuffer::default(),
            wbuf: WriteBuffer::default(),
            external: None,
            internal: None,
            binmode: false,
            options: config.conversion.clone(),
            lineno: 0,
            closed: false,
            read_closed: false,
            write_closed: false,
            sync: config.sync,
            nonblocking: false,
            config,
        }
    }

    /// Settings the stream was opened with.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The wrapped primitive.
    pub fn get_ref(&self) -> &P {
        &self.inner
    }

    /// Direct access to the primitive. Bytes moved through it bypass both
    /// buffers.
    pub fn get_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    /// Drain pending output and hand back the primitive.
    pub fn into_inner(mut self) -> Result<P> {
        if !self.closed {
            self.drain()?;
        }
        Ok(self.inner)
    }

    // State queries stay valid after close.

    /// Whether the stream or its primitive is closed.
    pub fn is_closed(&self) -> bool {
        self.closed || self.inner.is_closed()
    }

    /// Whether reads are still allowed.
    pub fn is_readable(&self) -> bool {
        !self.is_closed() && !self.read_closed && self.inner.is_readable()
    }

    /// Whether writes are still allowed.
    pub fn is_writable(&self) -> bool {
        !self.is_closed() && !self.write_closed && self.inner.is_writable()
    }

    /// Whether one primitive handle serves both directions.
    pub fn is_duplexed(&self) -> bool {
        self.inner.is_duplexed()
    }

    /// Number of records returned so far.
    pub fn lineno(&self) -> u64 {
        self.lineno
    }

    /// Override the record counter.
    pub fn set_lineno(&mut self, lineno: u64) {
        self.lineno = lineno;
    }

    /// Whether every write is drained immediately.
    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// In sync mode every write drains the write buffer before returning.
    pub fn set_sync(&mut self, sync: bool) -> Result<()> {
        self.check_open()?;
        self.sync = sync;
        if sync && !self.write_closed {
            self.drain()?;
        }
        Ok(())
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    pub(crate) fn check_readable(&self) -> Result<()> {
        self.check_open()?;
        if self.read_closed {
            return Err(Error::Closed);
        }
        if !self.inner.is_readable() {
            return Err(Error::Capability(Capability::Read));
        }
        Ok(())
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.write_closed {
            return Err(Error::Closed);
        }
        if !self.inner.is_writable() {
            return Err(Error::Capability(Capability::Write));
        }
        Ok(())
    }

    /// Next byte; [`Error::EndOfData`] at the end.
    pub fn readbyte(&mut self) -> Result<u8> {
        self.check_readable()?;
        self.fill(1)?;
        self.rbuf.take(1).first().copied().ok_or(Error::EndOfData)
    }

    /// Next byte, or `None` at the end.
    ///
    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b"A"[..]));
    /// assert_eq!(stream.getbyte().unwrap(), Some(b'A'));
    /// assert_eq!(stream.getbyte().unwrap(), None);
    /// ```
    pub fn getbyte(&mut self) -> Result<Option<u8>> {
        match self.readbyte() {
            Ok(byte) => Ok(Some(byte)),
            Err(Error::EndOfData) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Up to `length` bytes, blocking until that many arrive or the data
    /// ends. [`Error::EndOfData`] if nothing was left.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        self.check_readable()?;
        self.buffered_read(length)
    }

    /// Everything up to the end of data; empty when already there.
    ///
    /// A failure after some bytes were gathered returns those bytes.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.check_readable()?;
        let mut out = Vec::new();
        loop {
            match self.fill(1) {
                Ok(()) => out.extend_from_slice(&self.rbuf.take(usize::MAX)),
                Err(Error::EndOfData) => return Ok(out),
                Err(err) if err.keeps_partial() && !out.is_empty() => {
                    log_debug!(bytes = out.len(), error = %err, "returning partial data");
                    return Ok(out);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Buffered bytes if there are any, otherwise the result of one
    /// blocking primitive read of at most `length` bytes.
    pub fn readpartial(&mut self, length: usize) -> Result<Vec<u8>> {
        self.check_readable()?;
        if length == 0 {
            return Ok(Vec::new());
        }
        if !self.rbuf.is_empty() {
            return Ok(self.rbuf.take(length));
        }
        self.surface_deferred()?;
        self.flush_before_read()?;
        self.leave_nonblocking()?;
        self.read_once(length)
    }

    /// One blocking primitive read that bypasses the read buffer.
    ///
    /// A zero `length` returns an empty vector without checking anything.
    pub fn sysread(&mut self, length: usize) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        self.check_readable()?;
        if !self.rbuf.is_empty() {
            return Err(Error::invalid("sysread with data in the read buffer"));
        }
        self.surface_deferred()?;
        self.flush_before_read()?;
        self.leave_nonblocking()?;
        self.read_once(length)
    }

    fn surface_deferred(&mut self) -> Result<()> {
        match self.rbuf.take_deferred() {
            Some(Deferred::Eof) => Err(Error::EndOfData),
            Some(Deferred::Error(err)) => Err(err),
            None => Ok(()),
        }
    }

    fn read_once(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length.min(self.config.chunk_size)];
        loop {
            match attempt_read(&mut self.inner, &mut buf)? {
                Attempt::Ready(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Attempt::EndOfData => return Err(Error::EndOfData),
                Attempt::Retry(Transient::WouldBlock) => self.inner.wait_readable()?,
                Attempt::Retry(Transient::Interrupted) => {}
            }
        }
    }

    /// True when no more data can be read.
    ///
    /// Blocks until the primitive delivers a byte or reports the end.
    pub fn is_eof(&mut self) -> Result<bool> {
        self.check_readable()?;
        if !self.rbuf.is_empty() {
            return Ok(false);
        }
        match self.fill(1) {
            Ok(()) => Ok(false),
            Err(Error::EndOfData) => {
                self.rbuf.defer(Deferred::Eof);
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    /// Write raw bytes. They are never converted.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        self.check_writable()?;
        self.buffered_write(data)
    }

    /// Write text, converted to the external encoding.
    pub fn write_str(&mut self, text: &str) -> Result<usize> {
        self.check_writable()?;
        let encoded = self.encode_for_write(text.as_bytes(), Encoding::utf_8())?;
        self.buffered_write(&encoded)
    }

    /// Write encoding-tagged text, converted to the external encoding unless
    /// it is binary.
    pub fn write_text(&mut self, text: &Text) -> Result<usize> {
        self.check_writable()?;
        let encoded = self.encode_for_write(text.as_bytes(), text.encoding())?;
        self.buffered_write(&encoded)
    }

    pub(crate) fn encode_for_write<'a>(&self, bytes: &'a [u8], from: Encoding) -> Result<Cow<'a, [u8]>> {
        let external = self.external();
        if from.is_binary() || external.is_binary() || from == external {
            return Ok(Cow::Borrowed(bytes));
        }
        Ok(Cow::Owned(transcode(bytes, from, external, &self.options)?))
    }

    /// Write the `Display` form of `value`.
    pub fn print<T: fmt::Display>(&mut self, value: T) -> Result<()> {
        self.write_str(&value.to_string())?;
        Ok(())
    }

    /// Write each item followed by a newline unless it already ends in one.
    /// With no items a lone newline is written.
    pub fn puts<S: AsRef<str>>(&mut self, items: &[S]) -> Result<()> {
        if items.is_empty() {
            self.write_str("\n")?;
            return Ok(());
        }
        for item in items {
            let item = item.as_ref();
            self.write_str(item)?;
            if !item.ends_with('\n') {
                self.write_str("\n")?;
            }
        }
        Ok(())
    }

    /// Write one character.
    pub fn putc(&mut self, ch: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.write_str(ch.encode_utf8(&mut buf))?;
        Ok(())
    }

    /// Drain buffered output, then write `data` with one primitive call.
    /// Returns how many bytes the primitive took.
    pub fn syswrite(&mut self, data: &[u8]) -> Result<usize> {
        self.check_writable()?;
        self.drain()?;
        if data.is_empty() {
            return Ok(0);
        }
        loop {
            match attempt_write(&mut self.inner, data)? {
                Attempt::Ready(n) => return Ok(n),
                Attempt::Retry(Transient::WouldBlock) => self.inner.wait_writable()?,
                Attempt::Retry(Transient::Interrupted) | Attempt::EndOfData => {}
            }
        }
    }

    /// Push buffered output to the primitive.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if self.write_closed || !self.inner.is_writable() {
            return Ok(());
        }
        self.drain()
    }

    /// Reposition the primitive. Pending output is written first and
    /// buffered input is discarded.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        self.drain()?;
        let pos = match pos {
            SeekFrom::Current(offset) => {
                let adjusted = i64::try_from(self.rbuf.len())
                    .ok()
                    .and_then(|buffered| offset.checked_sub(buffered))
                    .ok_or_else(|| Error::invalid(format!("seek offset {} out of range", offset)))?;
                SeekFrom::Current(adjusted)
            }
            other => other,
        };
        let new_pos = self.inner.raw_seek(pos).map_err(seek_error)?;
        self.rbuf.clear();
        Ok(new_pos)
    }

    /// Logical position: the primitive's offset adjusted for both buffers.
    pub fn pos(&mut self) -> Result<u64> {
        self.check_open()?;
        let raw = self.inner.raw_seek(SeekFrom::Current(0)).map_err(seek_error)?;
        Ok((raw + self.wbuf.len() as u64).saturating_sub(self.rbuf.len() as u64))
    }

    /// Seek to the start and reset the line counter.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0))?;
        self.lineno = 0;
        Ok(())
    }

    /// Encoding of the bytes on the wire.
    pub fn external_encoding(&self) -> Encoding {
        self.external()
    }

    /// Encoding text is converted to on read, if it differs from the
    /// external one.
    pub fn internal_encoding(&self) -> Option<Encoding> {
        let internal = self.internal();
        (internal != self.external()).then_some(internal)
    }

    /// Policy used when converting between encodings.
    pub fn conversion_options(&self) -> &ConversionOptions {
        &self.options
    }

    pub(crate) fn external(&self) -> Encoding {
        self.external.unwrap_or(self.config.default_external)
    }

    pub(crate) fn internal(&self) -> Encoding {
        if self.binmode {
            return self.external();
        }
        self.internal
            .or(self.config.default_internal)
            .unwrap_or_else(|| self.external())
    }

    /// Replace the encoding setup. Options are kept unless the descriptor
    /// carries new ones.
    pub fn set_encoding(&mut self, descriptor: EncodingDescriptor) -> Result<()> {
        self.check_open()?;
        self.internal = descriptor.effective_internal();
        self.external = descriptor.external;
        self.binmode = false;
        if let Some(options) = descriptor.options {
            self.options = options;
        }
        log_debug!(external = %self.external(), internal = ?self.internal_encoding(), "encoding changed");
        Ok(())
    }

    /// Set encodings from `"ext"` or `"ext:int"`.
    ///
    /// # Examples
    /// ```
    /// use iolike::{Encoding, ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b""[..]));
    /// stream.set_encoding_str("utf-16le:utf-8").unwrap();
    /// assert_eq!(stream.external_encoding(), Encoding::utf_16le());
    /// assert_eq!(stream.internal_encoding(), Some(Encoding::utf_8()));
    ///
    /// assert!(stream.set_encoding_str("nonsense").is_err());
    /// ```
    pub fn set_encoding_str(&mut self, names: &str) -> Result<()> {
        let descriptor: EncodingDescriptor = names.parse()?;
        self.set_encoding(descriptor)
    }

    /// Replace the conversion policy.
    pub fn set_conversion_options(&mut self, options: ConversionOptions) -> Result<()> {
        self.check_open()?;
        self.options = options;
        Ok(())
    }

    /// Treat the stream as raw bytes from now on.
    pub fn binmode(&mut self) -> Result<()> {
        self.check_open()?;
        self.external = Some(Encoding::Binary);
        self.internal = None;
        self.binmode = true;
        Ok(())
    }

    /// Whether the stream reads and writes raw bytes.
    pub fn is_binmode(&self) -> bool {
        self.external().is_binary()
    }

    /// Drain output and close the primitive. Closing twice is a no-op.
    ///
    /// The stream counts as closed even when draining or closing fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let drained = if self.write_closed || !self.inner.is_writable() {
            Ok(())
        } else {
            self.drain()
        };
        self.closed = true;
        self.rbuf.clear();
        self.wbuf.clear();
        let closed = self.inner.raw_close().map_err(Error::from);
        log_debug!("stream closed");
        drained.and(closed)
    }

    /// Stop reading. Closes the stream if writing is not possible either.
    pub fn close_read(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.inner.is_readable() {
            return Err(Error::Capability(Capability::Read));
        }
        self.read_closed = true;
        self.rbuf.clear();
        if self.write_closed || !self.inner.is_writable() {
            return self.close();
        }
        Ok(())
    }

    /// Drain and stop writing. Closes the stream if reading is not possible
    /// either.
    pub fn close_write(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.inner.is_writable() {
            return Err(Error::Capability(Capability::Write));
        }
        self.drain()?;
        self.write_closed = true;
        if self.read_closed || !self.inner.is_readable() {
            return self.close();
        }
        Ok(())
    }
}

fn seek_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::Unsupported {
        Error::Capability(Capability::Seek)
    } else {
        Error::from(err)
    }
}

impl<P: Primitive> fmt::Debug for Stream<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("external", &self.external())
            .field("internal", &self.internal_encoding())
            .field("lineno", &self.lineno)
            .field("buffered_in", &self.rbuf.len())
            .field("buffered_out", &self.wbuf.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<P: Primitive> Read for Stream<P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.check_readable()?;
        match self.fill(1) {
            Ok(()) => Ok(self.rbuf.copy_to(buf)),
            Err(Error::EndOfData) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

impl<P: Primitive> BufRead for Stream<P> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.check_readable()?;
        match self.fill(1) {
            Ok(()) | Err(Error::EndOfData) => Ok(self.rbuf.as_slice()),
            Err(err) => Err(err.into()),
        }
    }

    fn consume(&mut self, amt: usize) {
        self.rbuf.consume(amt);
    }
}

impl<P: Primitive> Write for Stream<P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Stream::flush(self)?)
    }
}

impl<P: Primitive> Seek for Stream<P> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Stream::seek(self, pos)?)
    }
}
