//! Line and record reading
//!
//! A record ends at a separator, at a byte limit, or at the end of data.
//! Each record returned bumps the line counter by one. Data gathered before
//! the end of data, a transport failure or a transient condition is
//! returned as a short record rather than dropped; the condition itself is
//! not reported again.

use memchr::memmem;

use super::buffer::Deferred;
use super::encoding::{transcode, ConversionOptions, Encoding, Text};
use super::error::{Error, Result};
use super::primitive::Primitive;
use super::stream::Stream;

const PARAGRAPH_SEPARATOR: &[u8] = b"\n\n";

/// Where a record ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Separator {
    /// The stream's configured record separator, converted to the
    /// internal encoding when that is not UTF-8 or binary.
    #[default]
    Default,
    /// These bytes, kept at the end of the record.
    Bytes(Vec<u8>),
    /// No separator: the rest of the data.
    None,
    /// Paragraphs, ended by two or more newlines. At most two are kept and
    /// the rest are skipped before the next record.
    Paragraph,
}

/// Separator and byte limit for one record read.
///
/// `limit` of `None` or `Some(0)` means unbounded. A limit can be overrun
/// by the bytes needed to finish a multi-byte character.
///
/// # Examples
/// ```
/// use iolike::{RecordOptions, Separator};
///
/// assert_eq!(RecordOptions::from(3usize).limit, Some(3));
/// assert_eq!(RecordOptions::from("").separator, Separator::Paragraph);
/// assert_eq!(RecordOptions::from(", ").separator, Separator::Bytes(b", ".to_vec()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordOptions {
    pub separator: Separator,
    pub limit: Option<usize>,
}

impl RecordOptions {
    /// Records ending at `separator`, with no limit.
    pub fn new(separator: Separator) -> Self {
        Self {
            separator,
            limit: None,
        }
    }

    /// Everything that is left, as one record.
    pub fn all() -> Self {
        Self::new(Separator::None)
    }

    /// Paragraph mode: records end at a run of blank lines.
    pub fn paragraph() -> Self {
        Self::new(Separator::Paragraph)
    }

    /// Cap each record at about `limit` bytes, never splitting a character.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(0)
    }
}

impl From<usize> for RecordOptions {
    fn from(limit: usize) -> Self {
        Self::default().with_limit(limit)
    }
}

/// An empty string selects paragraph mode.
impl From<&str> for RecordOptions {
    fn from(separator: &str) -> Self {
        if separator.is_empty() {
            Self::paragraph()
        } else {
            Self::new(Separator::Bytes(separator.as_bytes().to_vec()))
        }
    }
}

impl From<&[u8]> for RecordOptions {
    fn from(separator: &[u8]) -> Self {
        Self::new(Separator::Bytes(separator.to_vec()))
    }
}

impl From<Separator> for RecordOptions {
    fn from(separator: Separator) -> Self {
        Self::new(separator)
    }
}

impl From<(&str, usize)> for RecordOptions {
    fn from((separator, limit): (&str, usize)) -> Self {
        Self::from(separator).with_limit(limit)
    }
}

impl<P: Primitive> Stream<P> {
    /// Next line, ended by the configured separator; `None` at the end.
    ///
    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b"a\nb"[..]));
    /// assert_eq!(stream.gets().unwrap().unwrap(), "a\n");
    /// assert_eq!(stream.gets().unwrap().unwrap(), "b");
    /// assert!(stream.gets().unwrap().is_none());
    /// assert_eq!(stream.lineno(), 2);
    /// ```
    pub fn gets(&mut self) -> Result<Option<Text>> {
        self.gets_with(RecordOptions::default())
    }

    /// Next record, or `None` at the end of data.
    pub fn gets_with<O: Into<RecordOptions>>(&mut self, options: O) -> Result<Option<Text>> {
        match self.next_record(&options.into()) {
            Ok(record) => Ok(Some(record)),
            Err(Error::EndOfData) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Like [`Stream::gets`] but [`Error::EndOfData`] when no data is left.
    pub fn readline(&mut self) -> Result<Text> {
        self.next_record(&RecordOptions::default())
    }

    /// Next record; [`Error::EndOfData`] at the end.
    pub fn readline_with<O: Into<RecordOptions>>(&mut self, options: O) -> Result<Text> {
        self.next_record(&options.into())
    }

    /// All remaining records.
    ///
    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b"one\n\n\ntwo\n"[..]));
    /// let paragraphs = stream.readlines("").unwrap();
    /// assert_eq!(paragraphs, ["one\n\n", "two\n"]);
    /// ```
    pub fn readlines<O: Into<RecordOptions>>(&mut self, options: O) -> Result<Vec<Text>> {
        let options = options.into();
        let mut records = Vec::new();
        loop {
            match self.next_record(&options) {
                Ok(record) => records.push(record),
                Err(Error::EndOfData) => return Ok(records),
                Err(err) => return Err(err),
            }
        }
    }

    pub(crate) fn next_record(&mut self, options: &RecordOptions) -> Result<Text> {
        if matches!(&options.separator, Separator::Bytes(sep) if sep.is_empty()) {
            return Err(Error::invalid("empty separator; use Separator::Paragraph"));
        }
        self.check_readable()?;

        let limit = options.effective_limit();
        let encoding = self.internal();
        let mut record = Vec::new();
        let gathered = match &options.separator {
            Separator::None => self.collect_remaining(limit, &mut record),
            Separator::Paragraph => self.collect_paragraph(limit, &mut record),
            Separator::Default => {
                let separator = self.default_separator(encoding)?;
                self.collect_delimited(&separator, limit, &mut record)
            }
            Separator::Bytes(separator) => self.collect_delimited(separator, limit, &mut record),
        };

        match gathered {
            Ok(()) => {}
            Err(err) if err.keeps_partial() && !record.is_empty() => {
                log_debug!(bytes = record.len(), error = %err, "returning partial record");
            }
            Err(err) => return Err(err),
        }
        self.lineno += 1;
        Ok(Text::new(record, encoding))
    }

    /// The configured separator as it appears in `internal` text.
    fn default_separator(&self, internal: Encoding) -> Result<Vec<u8>> {
        let separator = &self.config.record_separator;
        if internal.is_binary() || internal.is_utf8() {
            return Ok(separator.clone());
        }
        Ok(transcode(separator, Encoding::utf_8(), internal, &ConversionOptions::default())?)
    }

    fn collect_remaining(&mut self, limit: usize, record: &mut Vec<u8>) -> Result<()> {
        loop {
            if limit > 0 && record.len() >= limit {
                return Ok(());
            }
            let want = if limit == 0 {
                self.config.chunk_size
            } else {
                limit - record.len()
            };
            let chunk = self.next_chars(want)?;
            record.extend_from_slice(chunk.as_bytes());
        }
    }

    fn collect_paragraph(&mut self, limit: usize, record: &mut Vec<u8>) -> Result<()> {
        self.skip_newlines()?;
        self.collect_delimited(PARAGRAPH_SEPARATOR, limit, record)?;
        // The record is complete; whatever ends the skip belongs to the next call.
        if let Err(err) = self.skip_newlines() {
            self.rbuf.defer(match err {
                Error::EndOfData => Deferred::Eof,
                err => Deferred::Error(err),
            });
        }
        Ok(())
    }

    /// Discard raw newline bytes at the head of the input.
    fn skip_newlines(&mut self) -> Result<()> {
        loop {
            let byte = self.buffered_read(1)?;
            if byte != b"\n" {
                self.rbuf.unread(&byte);
                return Ok(());
            }
        }
    }

    fn collect_delimited(&mut self, separator: &[u8], limit: usize, record: &mut Vec<u8>) -> Result<()> {
        if self.can_scan_bytes(separator) {
            return self.scan_delimited(separator, limit, record);
        }
        while !record.ends_with(separator) && (limit == 0 || record.len() < limit) {
            let ch = self.next_chars(1)?;
            record.extend_from_slice(ch.as_bytes());
        }
        Ok(())
    }

    /// A byte search finds the same boundaries as reading character by
    /// character when nothing is converted and no character's encoding can
    /// contain the separator bytes.
    fn can_scan_bytes(&self, separator: &[u8]) -> bool {
        let external = self.external();
        external == self.internal()
            && (external.is_binary() || (external.is_utf8() && separator.is_ascii()))
    }

    fn scan_delimited(&mut self, separator: &[u8], limit: usize, record: &mut Vec<u8>) -> Result<()> {
        loop {
            if self.rbuf.is_empty() {
                self.fill(1)?;
            }
            let available = self.rbuf.as_slice();
            let budget = if limit == 0 {
                available.len()
            } else {
                available.len().min(limit - record.len())
            };
            let window = &available[..budget];

            if let Some(end) = straddling_match(record, window, separator)
                .or_else(|| memmem::find(window, separator).map(|at| at + separator.len()))
            {
                record.extend_from_slice(&window[..end]);
                self.rbuf.consume(end);
                return Ok(());
            }

            record.extend_from_slice(window);
            self.rbuf.consume(budget);
            if limit > 0 && record.len() >= limit {
                let external = self.external();
                return self.complete_trailing(record, external);
            }
        }
    }
}

/// End offset in `window` of a separator that began in `record`.
fn straddling_match(record: &[u8], window: &[u8], separator: &[u8]) -> Option<usize> {
    let carried = record.len().min(separator.len().saturating_sub(1));
    (1..=carried).rev().find_map(|head| {
        let tail = &separator[head..];
        (record.ends_with(&separator[..head]) && window.starts_with(tail)).then_some(tail.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::StreamConfig;
    use crate::io::primitive::ReadPrimitive;

    fn tiny_chunks(data: &'static [u8]) -> Stream<ReadPrimitive<&'static [u8]>> {
        let config = StreamConfig {
            chunk_size: 1,
            ..StreamConfig::default()
        };
        Stream::with_config(ReadPrimitive::new(data), config).unwrap()
    }

    #[test]
    fn test_straddling_match() {
        assert_eq!(straddling_match(b"ab\r", b"\ncd", b"\r\n"), Some(1));
        assert_eq!(straddling_match(b"ab", b"\r\n", b"\r\n"), None);
        assert_eq!(straddling_match(b"x--", b"-y", b"---"), Some(1));
        assert_eq!(straddling_match(b"x-", b"--y", b"---"), Some(2));
        assert_eq!(straddling_match(b"", b"--", b"--"), None);
    }

    #[test]
    fn test_separator_across_fills() {
        let mut stream = tiny_chunks(b"one\r\ntwo\r\n");
        assert_eq!(stream.gets_with("\r\n").unwrap().unwrap(), "one\r\n");
        assert_eq!(stream.gets_with("\r\n").unwrap().unwrap(), "two\r\n");
        assert!(stream.gets_with("\r\n").unwrap().is_none());
    }

    #[test]
    fn test_limit_completes_character() {
        let mut stream = Stream::new(ReadPrimitive::new("aé\n".as_bytes()));
        let record = stream.gets_with(2usize).unwrap().unwrap();
        assert_eq!(record, "aé");
        assert_eq!(stream.gets().unwrap().unwrap(), "\n");
    }

    #[test]
    fn test_limit_zero_is_unbounded() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"abcdef\nx"[..]));
        assert_eq!(stream.gets_with(0usize).unwrap().unwrap(), "abcdef\n");
    }

    #[test]
    fn test_empty_separator_bytes_rejected() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"abc"[..]));
        let err = stream.gets_with(Separator::Bytes(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(stream.lineno(), 0);
    }

    #[test]
    fn test_separator_none_with_limit() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"abcdefg"[..]));
        let options = RecordOptions::all().with_limit(3);
        assert_eq!(stream.gets_with(options.clone()).unwrap().unwrap(), "abc");
        assert_eq!(stream.gets_with(options.clone()).unwrap().unwrap(), "def");
        assert_eq!(stream.gets_with(options.clone()).unwrap().unwrap(), "g");
        assert!(stream.gets_with(options).unwrap().is_none());
        assert_eq!(stream.lineno(), 3);
    }

    #[test]
    fn test_configured_separator() {
        let config = StreamConfig {
            record_separator: b";".to_vec(),
            ..StreamConfig::default()
        };
        let mut stream = Stream::with_config(ReadPrimitive::new(&b"a;b\n;c"[..]), config).unwrap();
        let records = stream.readlines(RecordOptions::default()).unwrap();
        assert_eq!(records, ["a;", "b\n;", "c"]);
    }

    #[test]
    fn test_paragraph_only_newlines() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"\n\n\n"[..]));
        assert!(stream.gets_with("").unwrap().is_none());
        assert_eq!(stream.lineno(), 0);
    }

    #[test]
    fn test_readline_raises_at_end() {
        let mut stream = Stream::new(ReadPrimitive::new(&b""[..]));
        assert!(stream.readline().unwrap_err().is_end_of_data());
    }
}
