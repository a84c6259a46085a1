//! Character and codepoint reads
//!
//! Bytes are taken from the read buffer in the external encoding, extended
//! one byte at a time until the last character is whole, then converted to
//! the internal encoding. A read never ends inside a multi-byte character
//! unless the data itself ends there.

use super::encoding::{transcode, Encoding, Text};
use super::error::{Error, Result};
use super::primitive::Primitive;
use super::stream::Stream;

impl<P: Primitive> Stream<P> {
    /// At least `length` bytes worth of whole characters, in the internal
    /// encoding.
    ///
    /// The result can be longer than `length` when the last character
    /// needs more bytes. [`Error::EndOfData`] if nothing is left.
    ///
    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new("日本".as_bytes()));
    /// let first = stream.read_chars(1).unwrap();
    /// assert_eq!(first.as_bytes(), "日".as_bytes());
    /// ```
    pub fn read_chars(&mut self, length: usize) -> Result<Text> {
        self.check_readable()?;
        self.next_chars(length)
    }

    pub(crate) fn next_chars(&mut self, length: usize) -> Result<Text> {
        let external = self.external();
        let mut raw = self.buffered_read(length)?;
        if let Err(err) = self.complete_trailing(&mut raw, external) {
            self.rbuf.unread(&raw);
            return Err(err);
        }

        let internal = self.internal();
        if internal == external {
            return Ok(Text::new(raw, external));
        }
        let converted = transcode(&raw, external, internal, self.conversion_options())?;
        Ok(Text::new(converted, internal))
    }

    /// Pull single bytes onto `raw` until its last character is whole.
    ///
    /// At the end of data the incomplete bytes are left as they are.
    pub(crate) fn complete_trailing(&mut self, raw: &mut Vec<u8>, encoding: Encoding) -> Result<()> {
        while encoding.trailing_incomplete(raw) {
            match self.buffered_read(1) {
                Ok(byte) => raw.extend_from_slice(&byte),
                Err(Error::EndOfData) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Next character; [`Error::EndOfData`] at the end.
    pub fn readchar(&mut self) -> Result<Text> {
        self.read_chars(1)
    }

    /// Next character, or `None` at the end.
    pub fn getc(&mut self) -> Result<Option<Text>> {
        match self.readchar() {
            Ok(ch) => Ok(Some(ch)),
            Err(Error::EndOfData) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Codepoint of the next character. Binary streams yield byte values.
    pub fn readcodepoint(&mut self) -> Result<u32> {
        let ch = self.readchar()?;
        ch.first_codepoint()?.ok_or(Error::EndOfData)
    }

    /// Codepoint of the next character, or `None` at the end.
    pub fn getcodepoint(&mut self) -> Result<Option<u32>> {
        match self.readcodepoint() {
            Ok(cp) => Ok(Some(cp)),
            Err(Error::EndOfData) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::encoding::{ConversionOptions, EncodingDescriptor};
    use crate::io::error::DecodeError;
    use crate::io::primitive::ReadPrimitive;

    #[test]
    fn test_three_byte_character_is_whole() {
        let mut stream = Stream::new(ReadPrimitive::new("€x".as_bytes()));
        let ch = stream.readchar().unwrap();
        assert_eq!(ch.len(), 3);
        assert_eq!(ch, "€");
        assert_eq!(stream.readchar().unwrap(), "x");
        assert!(stream.getc().unwrap().is_none());
    }

    #[test]
    fn test_read_chars_rounds_up_to_character() {
        let mut stream = Stream::new(ReadPrimitive::new("aéb".as_bytes()));
        assert_eq!(stream.read_chars(2).unwrap(), "aé");
        assert_eq!(stream.read_chars(2).unwrap(), "b");
    }

    #[test]
    fn test_truncated_character_at_end_is_returned() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"a\xe2\x82"[..]));
        assert_eq!(stream.readchar().unwrap(), "a");
        let tail = stream.readchar().unwrap();
        assert_eq!(tail.as_bytes(), b"\xe2\x82");
        assert!(!tail.is_valid());
        assert!(stream.getc().unwrap().is_none());
    }

    #[test]
    fn test_invalid_byte_is_its_own_character() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"\xffb"[..]));
        assert_eq!(stream.readchar().unwrap().as_bytes(), b"\xff");
        assert_eq!(stream.readchar().unwrap(), "b");
    }

    #[test]
    fn test_conversion_to_internal() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"h\0\xe9\0"[..]));
        stream
            .set_encoding(EncodingDescriptor::new(Encoding::utf_16le()).with_internal(Encoding::utf_8()))
            .unwrap();
        assert_eq!(stream.readchar().unwrap(), "h");
        let ch = stream.readchar().unwrap();
        assert_eq!(ch, "é");
        assert_eq!(ch.encoding(), Encoding::utf_8());
    }

    #[test]
    fn test_conversion_failure_policy() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"\xff\xfe"[..]));
        stream.set_encoding_str("binary:utf-8").unwrap();
        let err = stream.readchar().unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::UndefinedByte { byte: 0xff, .. })));

        stream.set_conversion_options(ConversionOptions::replace_all()).unwrap();
        assert_eq!(stream.readchar().unwrap(), "\u{FFFD}");
    }

    #[test]
    fn test_codepoints() {
        let mut stream = Stream::new(ReadPrimitive::new("a€".as_bytes()));
        assert_eq!(stream.readcodepoint().unwrap(), 0x61);
        assert_eq!(stream.getcodepoint().unwrap(), Some(0x20ac));
        assert_eq!(stream.getcodepoint().unwrap(), None);

        let mut binary = Stream::new(ReadPrimitive::new(&b"\xe2"[..]));
        binary.binmode().unwrap();
        assert_eq!(binary.readcodepoint().unwrap(), 0xe2);
    }
}
