//! # iolike
//!
//! Buffered, encoding-aware streams over raw byte primitives.
//!
//! Anything that can do partial, possibly non-blocking reads and writes
//! implements [`Primitive`]; wrapping it in a [`Stream`] adds read and write
//! buffering, line and paragraph records, whole-character reads under an
//! external/internal encoding pair, pushback, non-blocking calls that report
//! "try again" instead of blocking, and lazy iterators.
//!
//! ```
//! use iolike::{ReadPrimitive, RecordOptions, Stream};
//!
//! let data = "first line\nsecond line\n\n\nnext paragraph".as_bytes();
//! let mut stream = Stream::new(ReadPrimitive::new(data));
//!
//! assert_eq!(stream.gets().unwrap().unwrap(), "first line\n");
//! let rest: Vec<_> = stream
//!     .each_line(RecordOptions::paragraph())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(rest, ["second line\n\n", "next paragraph"]);
//! assert_eq!(stream.lineno(), 3);
//! ```

macro_rules! log_trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "logging")]
        {
            tracing::trace!($($arg)+);
        }
    }};
}

macro_rules! log_debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "logging")]
        {
            tracing::debug!($($arg)+);
        }
    }};
}

pub mod io;
pub use io::*;
