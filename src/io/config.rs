//! Stream configuration
//!
//! Defaults that a native stream would take from process-wide settings are
//! carried here instead and handed to [`Stream::with_config`](crate::Stream::with_config).
//! The structure round-trips through JSON so it can live in a file next to
//! the rest of an application's settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::buffer::{DEFAULT_CHUNK_SIZE, DEFAULT_WRITE_BUFFER_SIZE};
use super::encoding::{ConversionOptions, Encoding};
use super::error::{Error, Result};

/// Per-stream defaults.
///
/// # Examples
/// ```
/// use iolike::{Encoding, StreamConfig};
///
/// let config = StreamConfig::from_json(r#"{ "default_external": "utf-16le", "chunk_size": 512 }"#).unwrap();
/// assert_eq!(config.default_external, Encoding::utf_16le());
/// assert_eq!(config.chunk_size, 512);
/// assert_eq!(config.record_separator, b"\n");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// External encoding for streams that set none.
    pub default_external: Encoding,
    /// Internal encoding for streams that set none.
    pub default_internal: Option<Encoding>,
    /// Separator used when a record call does not name one.
    #[serde(with = "separator_text")]
    pub record_separator: Vec<u8>,
    /// Bytes requested from the primitive per read.
    pub chunk_size: usize,
    /// Buffered output size that forces a drain.
    pub write_buffer_size: usize,
    /// Drain after every write.
    pub sync: bool,
    pub conversion: ConversionOptions,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_external: Encoding::utf_8(),
            default_internal: None,
            record_separator: b"\n".to_vec(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            sync: false,
            conversion: ConversionOptions::default(),
        }
    }
}

impl StreamConfig {
    /// Reject settings no stream can run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid("chunk_size must be positive"));
        }
        if self.write_buffer_size == 0 {
            return Err(Error::invalid("write_buffer_size must be positive"));
        }
        if self.record_separator.is_empty() {
            return Err(Error::invalid("record_separator must not be empty"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StreamConfig =
            serde_json::from_str(json).map_err(|e| Error::invalid(format!("stream config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    ///
    /// # Examples
    /// ```no_run
    /// use iolike::StreamConfig;
    ///
    /// let config = StreamConfig::from_json_file("stream.json").unwrap();
    /// assert!(config.chunk_size > 0);
    /// ```
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(Error::Transport)?;
        Self::from_json(&json)
    }

    /// Render as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Transport(std::io::Error::other(e)))
    }
}

/// Separators are stored as bytes but written as text when they are UTF-8.
mod separator_text {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Repr::Text(text.to_string()).serialize(serializer),
            Err(_) => Repr::Bytes(bytes.to_vec()).serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Repr::deserialize(deserializer) {
            Ok(Repr::Text(text)) => Ok(text.into_bytes()),
            Ok(Repr::Bytes(bytes)) => Ok(bytes),
            Err(e) => Err(D::Error::custom(e)),
        }
    }
}
