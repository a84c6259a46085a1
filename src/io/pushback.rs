//! Pushing data back onto the read side
//!
//! Pushed-back bytes go to the head of the read buffer. The latest push is
//! read first; bytes pushed earlier and not yet read follow it.

use super::encoding::{Encoding, Text};
use super::error::{Error, Result};
use super::primitive::Primitive;
use super::stream::Stream;

impl<P: Primitive> Stream<P> {
    /// Make `bytes` the next bytes read, in the given order.
    ///
    /// # Examples
    /// ```
    /// use iolike::{ReadPrimitive, Stream};
    ///
    /// let mut stream = Stream::new(ReadPrimitive::new(&b"world"[..]));
    /// stream.unread(b"hello ").unwrap();
    /// assert_eq!(stream.read_all().unwrap(), b"hello world");
    /// ```
    pub fn unread(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_readable()?;
        self.rbuf.unread(bytes);
        Ok(())
    }

    /// Push one byte back so it is read next.
    pub fn ungetbyte(&mut self, byte: u8) -> Result<()> {
        self.unread(&[byte])
    }

    /// Push back a character as it is encoded on the wire.
    pub fn ungetc(&mut self, ch: char) -> Result<()> {
        self.check_readable()?;
        let mut buf = [0u8; 4];
        let encoded = self.encode_for_write(ch.encode_utf8(&mut buf).as_bytes(), Encoding::utf_8())?;
        self.rbuf.unread(&encoded);
        Ok(())
    }

    /// Push back a codepoint of the internal encoding.
    ///
    /// Binary streams take byte values; anything else takes Unicode scalar
    /// values.
    pub fn ungetc_codepoint(&mut self, codepoint: u32) -> Result<()> {
        self.check_readable()?;
        if self.internal().is_binary() {
            let byte = u8::try_from(codepoint)
                .map_err(|_| Error::invalid(format!("{:#x} out of byte range", codepoint)))?;
            self.rbuf.unread(&[byte]);
            return Ok(());
        }
        let ch = char::from_u32(codepoint)
            .ok_or_else(|| Error::invalid(format!("invalid codepoint {:#x}", codepoint)))?;
        self.ungetc(ch)
    }

    /// Push back text, converted from its own encoding to the external one.
    pub fn ungetc_text(&mut self, text: &Text) -> Result<()> {
        self.check_readable()?;
        let encoded = self.encode_for_write(text.as_bytes(), text.encoding())?;
        self.rbuf.unread(&encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::primitive::{ReadPrimitive, WritePrimitive};

    #[test]
    fn test_pushes_are_lifo_across_calls() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"z"[..]));
        stream.ungetbyte(b'c').unwrap();
        stream.ungetbyte(b'b').unwrap();
        stream.unread(b"a").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"abcz");
    }

    #[test]
    fn test_pushback_ahead_of_buffered_data() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"abc"[..]));
        assert_eq!(stream.readbyte().unwrap(), b'a');
        stream.ungetbyte(b'a').unwrap();
        assert_eq!(stream.read_bytes(3).unwrap(), b"abc");
    }

    #[test]
    fn test_ungetc_encodes_to_external() {
        let mut stream = Stream::new(ReadPrimitive::new(&b""[..]));
        stream.set_encoding_str("utf-16le").unwrap();
        stream.ungetc('é').unwrap();
        assert_eq!(stream.read_all().unwrap(), b"\xe9\0");
    }

    #[test]
    fn test_ungetc_codepoint() {
        let mut stream = Stream::new(ReadPrimitive::new(&b"!"[..]));
        stream.ungetc_codepoint(0x20ac).unwrap();
        assert_eq!(stream.readchar().unwrap(), "€");
        assert!(matches!(
            stream.ungetc_codepoint(0xd800),
            Err(Error::InvalidArgument(_))
        ));

        let mut binary = Stream::new(ReadPrimitive::new(&b""[..]));
        binary.binmode().unwrap();
        binary.ungetc_codepoint(0xff).unwrap();
        assert_eq!(binary.readbyte().unwrap(), 0xff);
        assert!(binary.ungetc_codepoint(0x100).is_err());
    }

    #[test]
    fn test_ungetc_text_converts() {
        let mut stream = Stream::new(ReadPrimitive::new(&b""[..]));
        stream.set_encoding_str("utf-16be").unwrap();
        stream.ungetc_text(&Text::from("hi")).unwrap();
        assert_eq!(stream.read_all().unwrap(), b"\0h\0i");
    }

    #[test]
    fn test_pushback_needs_read_side() {
        let mut stream = Stream::new(WritePrimitive::new(Vec::new()));
        assert!(stream.ungetbyte(b'x').is_err());
        stream.close().unwrap();
        assert!(matches!(stream.unread(b"x"), Err(Error::Closed)));
    }
}
