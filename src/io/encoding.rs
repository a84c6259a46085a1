//! Encodings, conversion policy and encoding-tagged text
//!
//! Codec tables come from `encoding_rs`. On top of them this module adds a
//! `Binary` encoding (every byte is one character, nothing converts), the
//! external/internal pairing a stream is configured with, and the
//! invalid/undefined fallback policy applied during conversion.
//!
//! | Direction                | Failure                 | Policy field |
//! |--------------------------|-------------------------|--------------|
//! | external bytes -> chars  | malformed byte sequence | `invalid`    |
//! | binary bytes -> chars    | byte above 0x7F         | `undef`      |
//! | chars -> internal bytes  | unmappable character    | `undef`      |

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use encoding_rs::{DecoderResult, EncoderResult};
use serde::{Deserialize, Serialize};

use super::error::{DecodeError, Error, Result};

/// A character encoding a stream can read or produce.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    /// Raw bytes; each byte is its own character.
    Binary,
    Text(&'static encoding_rs::Encoding),
}

impl Encoding {
    /// UTF-8 text.
    pub fn utf_8() -> Self {
        Encoding::Text(encoding_rs::UTF_8)
    }

    /// UTF-16, little-endian.
    pub fn utf_16le() -> Self {
        Encoding::Text(encoding_rs::UTF_16LE)
    }

    /// UTF-16, big-endian.
    pub fn utf_16be() -> Self {
        Encoding::Text(encoding_rs::UTF_16BE)
    }

    /// Look an encoding up by name or alias, case-insensitively.
    ///
    /// `"binary"` and `"ascii-8bit"` name [`Encoding::Binary`]; everything
    /// else goes through the WHATWG label table.
    ///
    /// # Examples
    /// ```
    /// use iolike::Encoding;
    ///
    /// assert_eq!(Encoding::for_label("utf8"), Some(Encoding::utf_8()));
    /// assert_eq!(Encoding::for_label("ASCII-8BIT"), Some(Encoding::Binary));
    /// assert_eq!(Encoding::for_label("no-such-encoding"), None);
    /// ```
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("binary") || label.eq_ignore_ascii_case("ascii-8bit") {
            return Some(Encoding::Binary);
        }
        encoding_rs::Encoding::for_label(label.as_bytes()).map(Encoding::Text)
    }

    /// Canonical name, as accepted by [`Encoding::for_label`].
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Binary => "BINARY",
            Encoding::Text(enc) => enc.name(),
        }
    }

    /// Whether this is the binary pseudo-encoding.
    pub fn is_binary(&self) -> bool {
        matches!(self, Encoding::Binary)
    }

    /// Whether this is UTF-8.
    pub fn is_utf8(&self) -> bool {
        matches!(self, Encoding::Text(enc) if *enc == encoding_rs::UTF_8)
    }

    /// UTF-8 or either UTF-16 byte order.
    pub fn is_unicode(&self) -> bool {
        match self {
            Encoding::Binary => false,
            Encoding::Text(enc) => {
                *enc == encoding_rs::UTF_8
                    || *enc == encoding_rs::UTF_16LE
                    || *enc == encoding_rs::UTF_16BE
            }
        }
    }

    /// True when every byte decodes without error.
    pub fn is_valid(&self, bytes: &[u8]) -> bool {
        match self {
            Encoding::Binary => true,
            Encoding::Text(enc) => enc
                .decode_without_bom_handling_and_without_replacement(bytes)
                .is_some(),
        }
    }

    /// True when the bytes end inside a character that more input could
    /// complete. Malformed bytes at the end are not incomplete.
    pub(crate) fn trailing_incomplete(&self, bytes: &[u8]) -> bool {
        let enc = match self {
            Encoding::Binary => return false,
            Encoding::Text(enc) => *enc,
        };
        if bytes.is_empty() {
            return false;
        }
        if enc == encoding_rs::UTF_8 {
            return utf8_trailing_incomplete(bytes);
        }

        let mut decoder = enc.new_decoder_without_bom_handling();
        let mut scratch = String::new();
        let mut offset = 0;
        loop {
            let src = &bytes[offset..];
            let needed = decoder
                .max_utf8_buffer_length_without_replacement(src.len())
                .unwrap_or(src.len() * 3 + 16);
            scratch.clear();
            scratch.reserve(needed);
            let (result, read) = decoder.decode_to_string_without_replacement(src, &mut scratch, false);
            offset += read;
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull | DecoderResult::Malformed(_, _) => {}
            }
        }
        // Whatever the decoder still holds is a partial character.
        scratch.clear();
        scratch.reserve(16);
        let (result, _) = decoder.decode_to_string_without_replacement(b"", &mut scratch, true);
        matches!(result, DecoderResult::Malformed(_, _))
    }
}

fn utf8_trailing_incomplete(bytes: &[u8]) -> bool {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(_) => return false,
            Err(err) => match err.error_len() {
                None => return true,
                Some(len) => {
                    let next = err.valid_up_to() + len;
                    if next >= rest.len() {
                        return false;
                    }
                    rest = &rest[next..];
                }
            },
        }
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Encoding({})", self.name())
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Encoding::for_label(s).ok_or_else(|| Error::invalid(format!("unknown encoding name - {}", s)))
    }
}

impl TryFrom<String> for Encoding {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Encoding> for String {
    fn from(encoding: Encoding) -> Self {
        encoding.name().to_string()
    }
}

/// What a conversion does when it meets bad input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Fail with a [`DecodeError`].
    #[default]
    Raise,
    /// Substitute the replacement string and carry on.
    Replace,
}

/// Conversion options applied between the external and internal encodings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Malformed byte sequences in the source.
    pub invalid: Fallback,
    /// Characters the target cannot represent.
    pub undef: Fallback,
    /// Substitute text; U+FFFD for Unicode targets and `?` otherwise when unset.
    pub replacement: Option<String>,
}

impl ConversionOptions {
    /// Replace both invalid and undefined input.
    pub fn replace_all() -> Self {
        Self {
            invalid: Fallback::Replace,
            undef: Fallback::Replace,
            replacement: None,
        }
    }

    /// Text substituted for anything that cannot be converted.
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    fn replacement_for(&self, target: Encoding) -> &str {
        match &self.replacement {
            Some(replacement) => replacement,
            None if target.is_unicode() => "\u{FFFD}",
            None => "?",
        }
    }
}

/// Requested encoding setup for a stream.
///
/// Parses from `"ext"` or `"ext:int"`. An internal encoding equal to the
/// external one is dropped, so no redundant conversion is configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodingDescriptor {
    pub external: Option<Encoding>,
    pub internal: Option<Encoding>,
    pub options: Option<ConversionOptions>,
}

impl EncodingDescriptor {
    /// Read and write in `external` with no conversion.
    pub fn new(external: Encoding) -> Self {
        Self {
            external: Some(external),
            ..Self::default()
        }
    }

    /// Convert reads to `internal`.
    pub fn with_internal(mut self, internal: Encoding) -> Self {
        self.internal = Some(internal);
        self
    }

    /// Conversion policy for this pair.
    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Internal encoding with the redundant same-as-external case removed.
    pub(crate) fn effective_internal(&self) -> Option<Encoding> {
        match (self.external, self.internal) {
            (Some(ext), Some(int)) if ext == int => None,
            (_, internal) => internal,
        }
    }
}

impl FromStr for EncodingDescriptor {
    type Err = Error;

    /// # Examples
    /// ```
    /// use iolike::{Encoding, EncodingDescriptor};
    ///
    /// let desc: EncodingDescriptor = "utf-16le:utf-8".parse().unwrap();
    /// assert_eq!(desc.external, Some(Encoding::utf_16le()));
    /// assert_eq!(desc.internal, Some(Encoding::utf_8()));
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let (ext, int) = match s.split_once(':') {
            Some((ext, int)) => (ext, Some(int)),
            None => (s, None),
        };
        let external: Encoding = ext.parse()?;
        let internal = match int {
            Some(name) => Some(name.parse::<Encoding>()?).filter(|int| *int != external),
            None => None,
        };
        Ok(Self {
            external: Some(external),
            internal,
            options: None,
        })
    }
}

/// Bytes tagged with the encoding they are in.
#[derive(Clone, PartialEq, Eq)]
pub struct Text {
    bytes: Vec<u8>,
    encoding: Encoding,
}

impl Text {
    /// Wrap bytes already in `encoding`.
    pub fn new(bytes: Vec<u8>, encoding: Encoding) -> Self {
        Self { bytes, encoding }
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Encoding the bytes are in.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the bytes are well formed in their encoding.
    pub fn is_valid(&self) -> bool {
        self.encoding.is_valid(&self.bytes)
    }

    /// Decode, replacing malformed sequences with U+FFFD.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self.encoding {
            Encoding::Binary => String::from_utf8_lossy(&self.bytes),
            Encoding::Text(enc) => enc.decode_without_bom_handling(&self.bytes).0,
        }
    }

    /// Codepoint of the first character; a byte value for binary text.
    pub fn first_codepoint(&self) -> std::result::Result<Option<u32>, DecodeError> {
        match self.encoding {
            Encoding::Binary => Ok(self.bytes.first().map(|&b| u32::from(b))),
            Encoding::Text(enc) => {
                let decoded = enc
                    .decode_without_bom_handling_and_without_replacement(&self.bytes)
                    .ok_or_else(|| DecodeError::InvalidByteSequence {
                        bytes: self.bytes.clone(),
                        encoding: enc.name(),
                    })?;
                Ok(decoded.chars().next().map(u32::from))
            }
        }
    }

    /// Convert into another encoding.
    pub fn transcode(
        &self,
        to: Encoding,
        options: &ConversionOptions,
    ) -> std::result::Result<Text, DecodeError> {
        let bytes = transcode(&self.bytes, self.encoding, to, options)?;
        Ok(Text::new(bytes, to))
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::new(s.as_bytes().to_vec(), Encoding::utf_8())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::new(s.into_bytes(), Encoding::utf_8())
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text({:?}, {})", self.to_string_lossy(), self.encoding)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Text {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for Text {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.bytes == other.as_slice()
    }
}

/// Convert `bytes` from one encoding to another under `options`.
///
/// Identical encodings pass the bytes through untouched, valid or not.
pub fn transcode(
    bytes: &[u8],
    from: Encoding,
    to: Encoding,
    options: &ConversionOptions,
) -> std::result::Result<Vec<u8>, DecodeError> {
    if from == to {
        return Ok(bytes.to_vec());
    }
    let decoded = decode_to_string(bytes, from, to, options)?;
    encode_from_str(&decoded, from, to, options)
}

fn decode_to_string(
    bytes: &[u8],
    from: Encoding,
    to: Encoding,
    options: &ConversionOptions,
) -> std::result::Result<String, DecodeError> {
    let enc = match from {
        Encoding::Binary => {
            let mut out = String::with_capacity(bytes.len());
            for &byte in bytes {
                if byte.is_ascii() {
                    out.push(char::from(byte));
                } else if options.undef == Fallback::Replace {
                    out.push_str(options.replacement_for(to));
                } else {
                    return Err(DecodeError::UndefinedByte {
                        byte,
                        to: to.name(),
                    });
                }
            }
            return Ok(out);
        }
        Encoding::Text(enc) => enc,
    };

    let mut decoder = enc.new_decoder_without_bom_handling();
    let mut out = String::new();
    let mut offset = 0;
    loop {
        let src = &bytes[offset..];
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(src.len())
            .unwrap_or(src.len() * 3 + 16);
        out.reserve(needed);
        let (result, read) = decoder.decode_to_string_without_replacement(src, &mut out, true);
        offset += read;
        match result {
            DecoderResult::InputEmpty => return Ok(out),
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(bad, extra) => {
                if options.invalid == Fallback::Replace {
                    out.push_str(options.replacement_for(to));
                } else {
                    let end = offset - usize::from(extra);
                    let start = end.saturating_sub(usize::from(bad));
                    return Err(DecodeError::InvalidByteSequence {
                        bytes: bytes[start..end].to_vec(),
                        encoding: enc.name(),
                    });
                }
            }
        }
    }
}

fn encode_from_str(
    text: &str,
    from: Encoding,
    to: Encoding,
    options: &ConversionOptions,
) -> std::result::Result<Vec<u8>, DecodeError> {
    let enc = match to {
        Encoding::Binary => {
            let mut out = Vec::with_capacity(text.len());
            for ch in text.chars() {
                if ch.is_ascii() {
                    out.push(ch as u8);
                } else if options.undef == Fallback::Replace {
                    out.extend(options.replacement_for(to).bytes().filter(u8::is_ascii));
                } else {
                    return Err(DecodeError::UndefinedConversion {
                        character: ch,
                        from: from.name(),
                        to: to.name(),
                    });
                }
            }
            return Ok(out);
        }
        Encoding::Text(enc) => enc,
    };

    // encoding_rs only encodes into ASCII-compatible targets.
    if enc == encoding_rs::UTF_8 {
        return Ok(text.as_bytes().to_vec());
    }
    if enc == encoding_rs::UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if enc == encoding_rs::UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let mut encoder = enc.new_encoder();
    let mut out = Vec::new();
    let mut rest = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .unwrap_or(rest.len() * 4 + 16);
        out.reserve(needed);
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(out),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(ch) => {
                if options.undef == Fallback::Replace {
                    let replacement = options.replacement_for(to);
                    let (encoded, _, unmappable) = enc.encode(replacement);
                    if unmappable {
                        out.push(b'?');
                    } else {
                        out.extend_from_slice(&encoded);
                    }
                } else {
                    return Err(DecodeError::UndefinedConversion {
                        character: ch,
                        from: from.name(),
                        to: enc.name(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latin1() -> Encoding {
        Encoding::for_label("iso-8859-1").unwrap()
    }

    #[test]
    fn test_lookup_names() {
        assert_eq!(Encoding::for_label(" UTF-8 "), Some(Encoding::utf_8()));
        assert_eq!(Encoding::for_label("binary"), Some(Encoding::Binary));
        assert!("bogus".parse::<Encoding>().is_err());
        assert_eq!(Encoding::utf_16le().name(), "UTF-16LE");
    }

    #[test]
    fn test_trailing_incomplete_utf8() {
        let enc = Encoding::utf_8();
        let ch = "日".as_bytes();
        assert!(enc.trailing_incomplete(&ch[..1]));
        assert!(enc.trailing_incomplete(&ch[..2]));
        assert!(!enc.trailing_incomplete(ch));
        assert!(!enc.trailing_incomplete(b"ab\xff"));
        assert!(enc.trailing_incomplete(b"\xffa\xe2"));
        assert!(!enc.trailing_incomplete(b"\xffab"));
        assert!(!Encoding::Binary.trailing_incomplete(b"\xe6"));
    }

    #[test]
    fn test_trailing_incomplete_utf16() {
        let enc = Encoding::utf_16le();
        assert!(enc.trailing_incomplete(b"a"));
        assert!(!enc.trailing_incomplete(b"a\0"));
        // Lone high surrogate waits for its pair.
        assert!(enc.trailing_incomplete(&[0x3d, 0xd8]));
        assert!(!enc.trailing_incomplete(&[0x3d, 0xd8, 0x00, 0xde]));
        // A lone low surrogate cannot be completed.
        assert!(!enc.trailing_incomplete(&[0x00, 0xde]));
    }

    #[test]
    fn test_transcode_between_unicode_forms() {
        let opts = ConversionOptions::default();
        let utf16 = transcode("héllo".as_bytes(), Encoding::utf_8(), Encoding::utf_16le(), &opts).unwrap();
        assert_eq!(utf16, b"h\0\xe9\0l\0l\0o\0");

        let back = transcode(&utf16, Encoding::utf_16le(), Encoding::utf_8(), &opts).unwrap();
        assert_eq!(back, "héllo".as_bytes());
    }

    #[test]
    fn test_invalid_bytes_raise_or_replace() {
        let raise = ConversionOptions::default();
        let err = transcode(b"a\xffb", Encoding::utf_8(), latin1(), &raise).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidByteSequence {
                bytes: vec![0xff],
                encoding: "UTF-8"
            }
        );

        let replace = ConversionOptions::replace_all();
        let out = transcode(b"a\xffb", Encoding::utf_8(), Encoding::utf_16le(), &replace).unwrap();
        assert_eq!(out, b"a\0\xfd\xffb\0");
    }

    #[test]
    fn test_undefined_conversion_policy() {
        let err = transcode("日".as_bytes(), Encoding::utf_8(), latin1(), &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, DecodeError::UndefinedConversion { character: '日', .. }));

        let opts = ConversionOptions::replace_all().with_replacement("*");
        let out = transcode("a日".as_bytes(), Encoding::utf_8(), latin1(), &opts).unwrap();
        assert_eq!(out, b"a*");

        let out = transcode(b"a\xe9", Encoding::Binary, Encoding::utf_8(), &ConversionOptions::replace_all())
            .unwrap();
        assert_eq!(out, "a\u{FFFD}".as_bytes());
    }

    #[test]
    fn test_same_encoding_passes_through() {
        let out = transcode(b"\xff\xfe", Encoding::utf_8(), Encoding::utf_8(), &ConversionOptions::default())
            .unwrap();
        assert_eq!(out, b"\xff\xfe");
    }

    #[test]
    fn test_descriptor_parsing() {
        let desc: EncodingDescriptor = "utf-8".parse().unwrap();
        assert_eq!(desc.external, Some(Encoding::utf_8()));
        assert_eq!(desc.internal, None);

        let desc: EncodingDescriptor = "utf-8:utf-8".parse().unwrap();
        assert_eq!(desc.internal, None);

        assert!("utf-8:nope".parse::<EncodingDescriptor>().is_err());

        let desc = EncodingDescriptor::new(Encoding::Binary).with_internal(Encoding::Binary);
        assert_eq!(desc.effective_internal(), None);
    }

    #[test]
    fn test_text_codepoints() {
        let text = Text::from("€uro");
        assert_eq!(text.first_codepoint().unwrap(), Some(0x20ac));
        assert_eq!(Text::new(vec![0xe9], Encoding::Binary).first_codepoint().unwrap(), Some(0xe9));
        assert!(Text::new(vec![0xe9], Encoding::utf_8()).first_codepoint().is_err());
        assert_eq!(text, "€uro");
    }

    #[test]
    fn test_encoding_serde_by_name() {
        let json = serde_json::to_string(&Encoding::utf_16be()).unwrap();
        assert_eq!(json, "\"UTF-16BE\"");
        let enc: Encoding = serde_json::from_str("\"ascii-8bit\"").unwrap();
        assert_eq!(enc, Encoding::Binary);
        assert!(serde_json::from_str::<Encoding>("\"klingon\"").is_err());
    }
}
