//! Shared fixtures: a primitive driven by a script of read and write
//! outcomes that records every call it receives.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;

use iolike::Primitive;

/// Outcome of one scripted raw read.
#[derive(Debug, Clone)]
pub enum Step {
    /// Bytes to hand out; served across several reads if the caller asks
    /// for less.
    Data(Vec<u8>),
    Eof,
    WouldBlock,
    Interrupted,
    Fail(io::ErrorKind),
}

pub fn data(bytes: impl AsRef<[u8]>) -> Step {
    Step::Data(bytes.as_ref().to_vec())
}

/// Outcome of one scripted raw write.
#[derive(Debug, Clone)]
pub enum WriteStep {
    /// Accept at most this many bytes.
    Accept(usize),
    WouldBlock,
    Interrupted,
    Fail(io::ErrorKind),
}

/// Calls the primitive saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Read,
    Write(Vec<u8>),
    Nonblocking(bool),
    Close,
}

#[derive(Debug, Default)]
pub struct Scripted {
    reads: VecDeque<Step>,
    writes: VecDeque<WriteStep>,
    pub written: Vec<u8>,
    pub events: Vec<Event>,
    readable: bool,
    writable: bool,
    duplexed: bool,
    loopback: bool,
    nonblock_capable: bool,
    pub nonblocking: bool,
}

impl Scripted {
    /// Read-only; reads past the end of the script report EOF.
    pub fn reader(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            reads: steps.into_iter().collect(),
            readable: true,
            ..Self::default()
        }
    }

    pub fn writer() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }

    /// Duplexed; everything written becomes readable afterwards.
    pub fn echo() -> Self {
        Self {
            readable: true,
            writable: true,
            duplexed: true,
            loopback: true,
            ..Self::default()
        }
    }

    /// Readable and writable but with separate directions.
    pub fn split(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            writable: true,
            ..Self::reader(steps)
        }
    }

    pub fn duplexed(mut self) -> Self {
        self.duplexed = true;
        self
    }

    pub fn nonblock_capable(mut self) -> Self {
        self.nonblock_capable = true;
        self
    }

    pub fn with_writes(mut self, steps: impl IntoIterator<Item = WriteStep>) -> Self {
        self.writes = steps.into_iter().collect();
        self
    }

    pub fn push_read(&mut self, step: Step) {
        self.reads.push_back(step);
    }

    pub fn reads(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Read).count()
    }
}

impl Primitive for Scripted {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.events.push(Event::Read);
        match self.reads.pop_front() {
            None | Some(Step::Eof) => Ok(0),
            Some(Step::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.reads.push_front(Step::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Interrupted) => Err(io::ErrorKind::Interrupted.into()),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
        }
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match self.writes.pop_front() {
            None => buf.len(),
            Some(WriteStep::Accept(n)) => n.min(buf.len()),
            Some(WriteStep::WouldBlock) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(WriteStep::Interrupted) => return Err(io::ErrorKind::Interrupted.into()),
            Some(WriteStep::Fail(kind)) => return Err(io::Error::new(kind, "scripted failure")),
        };
        self.events.push(Event::Write(buf[..n].to_vec()));
        self.written.extend_from_slice(&buf[..n]);
        if self.loopback {
            self.reads.push_back(Step::Data(buf[..n].to_vec()));
        }
        Ok(n)
    }

    fn is_readable(&self) -> bool {
        self.readable
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn is_duplexed(&self) -> bool {
        self.duplexed
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        if !self.nonblock_capable {
            return Err(io::ErrorKind::Unsupported.into());
        }
        self.events.push(Event::Nonblocking(nonblocking));
        self.nonblocking = nonblocking;
        Ok(())
    }

    fn raw_close(&mut self) -> io::Result<()> {
        self.events.push(Event::Close);
        Ok(())
    }
}

/// Route `tracing` output through the test harness; `RUST_LOG=iolike=trace`
/// shows buffer activity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
