//! Raw transport contract
//!
//! A [`Primitive`] is whatever actually moves bytes: a file, a socket, a
//! pipe, an in-memory script. It may transfer fewer bytes than asked, it may
//! be interrupted, and in non-blocking mode it may report that it would
//! block. Those last two surface as [`io::ErrorKind::Interrupted`] and
//! [`io::ErrorKind::WouldBlock`]; every other error is a hard failure.
//!
//! The adapters here bridge the std I/O traits so any `Read`, `Write` or
//! `Read + Write` value can sit underneath a [`Stream`](crate::Stream).

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{Shutdown, TcpStream};

/// Raw read/write operations and capability flags of a transport.
pub trait Primitive {
    /// Read up to `buf.len()` bytes. `Ok(0)` for a non-empty `buf` means EOF.
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write some prefix of `buf`, returning how many bytes were taken.
    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn is_readable(&self) -> bool;

    fn is_writable(&self) -> bool;

    /// One handle serves both directions; pending writes must reach the
    /// transport before it is read.
    fn is_duplexed(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        false
    }

    /// Switch non-blocking mode. Transports that cannot do it report
    /// [`io::ErrorKind::Unsupported`].
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        let _ = nonblocking;
        Err(io::ErrorKind::Unsupported.into())
    }

    fn raw_seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let _ = pos;
        Err(io::ErrorKind::Unsupported.into())
    }

    fn raw_close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called between blocking retries after a would-block read.
    fn wait_readable(&mut self) -> io::Result<()> {
        std::thread::yield_now();
        Ok(())
    }

    /// Called between blocking retries after a would-block write.
    fn wait_writable(&mut self) -> io::Result<()> {
        std::thread::yield_now();
        Ok(())
    }
}

impl<P: Primitive + ?Sized> Primitive for Box<P> {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).raw_read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).raw_write(buf)
    }

    fn is_readable(&self) -> bool {
        (**self).is_readable()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }

    fn is_duplexed(&self) -> bool {
        (**self).is_duplexed()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn raw_seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).raw_seek(pos)
    }

    fn raw_close(&mut self) -> io::Result<()> {
        (**self).raw_close()
    }

    fn wait_readable(&mut self) -> io::Result<()> {
        (**self).wait_readable()
    }

    fn wait_writable(&mut self) -> io::Result<()> {
        (**self).wait_writable()
    }
}

/// Read-only primitive over any [`Read`].
///
/// # Examples
/// ```
/// use iolike::{ReadPrimitive, Stream};
/// use std::io::Cursor;
///
/// let mut stream = Stream::new(ReadPrimitive::new(Cursor::new(b"one\ntwo\n".to_vec())));
/// assert_eq!(stream.gets().unwrap().unwrap(), "one\n");
/// assert_eq!(stream.lineno(), 1);
/// ```
#[derive(Debug)]
pub struct ReadPrimitive<R> {
    reader: R,
}

impl<R: Read> ReadPrimitive<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// The wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Unwrap the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Primitive for ReadPrimitive<R> {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn raw_write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "read-only primitive"))
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        false
    }
}

/// Write-only primitive over any [`Write`].
#[derive(Debug)]
pub struct WritePrimitive<W> {
    writer: W,
}

impl<W: Write> WritePrimitive<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// The wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Primitive for WritePrimitive<W> {
    fn raw_read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "write-only primitive"))
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn is_readable(&self) -> bool {
        false
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn raw_close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Bidirectional primitive over one `Read + Write` handle, flagged duplexed.
#[derive(Debug)]
pub struct DuplexPrimitive<T> {
    io: T,
}

impl<T: Read + Write> DuplexPrimitive<T> {
    /// Wrap a duplex transport.
    pub fn new(io: T) -> Self {
        Self { io }
    }

    /// The wrapped transport.
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    /// Mutable access to the wrapped transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.io
    }

    /// Unwrap the transport.
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: Read + Write> Primitive for DuplexPrimitive<T> {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.io.read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io.write(buf)
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_duplexed(&self) -> bool {
        true
    }

    fn raw_close(&mut self) -> io::Result<()> {
        self.io.flush()
    }
}

/// Seekable primitive over a [`File`] opened with the given directions.
#[derive(Debug)]
pub struct FilePrimitive {
    file: File,
    readable: bool,
    writable: bool,
}

impl FilePrimitive {
    /// Wrap `file` with the given capabilities.
    pub fn new(file: File, readable: bool, writable: bool) -> Self {
        Self {
            file,
            readable,
            writable,
        }
    }

    /// A read-only file primitive.
    pub fn reader(file: File) -> Self {
        Self::new(file, true, false)
    }

    /// A write-only file primitive.
    pub fn writer(file: File) -> Self {
        Self::new(file, false, true)
    }

    /// The underlying file.
    pub fn get_ref(&self) -> &File {
        &self.file
    }

    /// Unwrap the file.
    pub fn into_inner(self) -> File {
        self.file
    }
}

impl Primitive for FilePrimitive {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn is_readable(&self) -> bool {
        self.readable
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn raw_seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn raw_close(&mut self) -> io::Result<()> {
        if self.writable {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

impl Primitive for TcpStream {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_duplexed(&self) -> bool {
        true
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn raw_close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
