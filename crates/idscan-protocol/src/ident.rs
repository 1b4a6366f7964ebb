//! Identification handshake codec
//!
//! The host sends a single query line and a device answers with one line
//! naming its family, kind and instance index.
//!
//! # Format
//! - Query (host -> device): `ID?\n`
//! - Response (device -> host): `<PREFIX>:<KIND>_<INDEX>\n`, e.g. `PICO:I2C_1`
//! - `_<INDEX>` is optional and defaults to `1`
//!
//! Decoding is case-sensitive. Surrounding whitespace (including the `\r\n`
//! line ending) is trimmed first. The index is the decimal suffix after the
//! last `_`; anything else after the `:` is the kind. The codec does not judge
//! kinds beyond requiring one: an odd token such as `SPI-X` decodes and is
//! left for the classifier to reject.

use std::fmt;

use crate::error::ParseError;

/// Exact query bytes sent to every candidate port
pub const QUERY: &[u8; 4] = b"ID?\n";

/// Default device family prefix
pub const DEFAULT_FAMILY: &str = "PICO";

/// Maximum response length in bytes, terminator included
pub const MAX_LINE_LEN: usize = 64;

const FAMILY_SEPARATOR: char = ':';
const INDEX_SEPARATOR: char = '_';
const DEFAULT_INDEX: u32 = 1;

/// Decoded identification line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdentificationResponse {
    /// Device family prefix (left of `:`)
    pub prefix: String,
    /// Device kind token, e.g. `I2C`
    pub kind: String,
    /// Instance index, at least 1
    pub index: u32,
}

impl IdentificationResponse {
    /// Create a response
    pub fn new(prefix: impl Into<String>, kind: impl Into<String>, index: u32) -> Self {
        Self {
            prefix: prefix.into(),
            kind: kind.into(),
            index,
        }
    }

    /// Encode as the device would send it, terminator included
    pub fn encode(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }
}

impl fmt::Display for IdentificationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.prefix, FAMILY_SEPARATOR, self.kind, INDEX_SEPARATOR, self.index
        )
    }
}

/// Codec for the identification handshake
///
/// Holds the set of device families whose responses are accepted. Decoding is
/// pure: it never touches a port.
#[derive(Debug, Clone)]
pub struct IdentCodec {
    families: Vec<String>,
}

impl IdentCodec {
    /// Create a codec accepting only the default family
    pub fn new() -> Self {
        Self::with_families([DEFAULT_FAMILY])
    }

    /// Create a codec accepting the given families
    pub fn with_families<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            families: families.into_iter().map(Into::into).collect(),
        }
    }

    /// Registered family prefixes
    pub fn families(&self) -> &[String] {
        &self.families
    }

    /// Whether `prefix` is a registered family
    pub fn accepts_family(&self, prefix: &str) -> bool {
        self.families.iter().any(|f| f == prefix)
    }

    /// The query line; always the same four bytes
    pub fn encode_query(&self) -> &'static [u8] {
        QUERY
    }

    /// Decode raw bytes read from a port
    pub fn decode_bytes(&self, raw: &[u8]) -> Result<IdentificationResponse, ParseError> {
        if raw.len() > MAX_LINE_LEN {
            return Err(ParseError::TooLong(raw.len()));
        }
        if !raw.is_ascii() {
            return Err(ParseError::NotAscii);
        }
        // ASCII is valid UTF-8
        let line = std::str::from_utf8(raw).map_err(|_| ParseError::NotAscii)?;
        self.decode(line)
    }

    /// Decode one response line
    pub fn decode(&self, line: &str) -> Result<IdentificationResponse, ParseError> {
        if !line.is_ascii() {
            return Err(ParseError::NotAscii);
        }

        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = line
            .split_once(FAMILY_SEPARATOR)
            .ok_or_else(|| ParseError::MissingSeparator(line.to_string()))?;

        if !self.accepts_family(prefix) {
            return Err(ParseError::UnknownFamily(prefix.to_string()));
        }

        let (kind, index) = match rest.rsplit_once(INDEX_SEPARATOR) {
            Some((kind, digits)) if is_decimal(digits) => (kind, Self::parse_index(digits)?),
            _ => (rest, DEFAULT_INDEX),
        };

        if kind.is_empty() {
            return Err(ParseError::EmptyKind);
        }

        Ok(IdentificationResponse::new(prefix, kind, index))
    }

    fn parse_index(digits: &str) -> Result<u32, ParseError> {
        match digits.parse::<u32>() {
            Ok(index) if index >= 1 => Ok(index),
            _ => Err(ParseError::InvalidIndex(digits.to_string())),
        }
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl Default for IdentCodec {
    fn default() -> Self {
        Self::new()
    }
}
