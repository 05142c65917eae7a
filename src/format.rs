//! Textual representations of UUIDs.

use std::{fmt, str};

use crate::{Error, Result, Uuid};

/// Prefix of the URN representation.
pub(crate) const URN_PREFIX: &str = "urn:uuid:";

/// The three textual forms a UUID can be rendered in.
///
/// | Kind        | Example                                         |
/// | ----------- | ----------------------------------------------- |
/// | `compact`   | `2a3f8000696e11d38000000000000000`              |
/// | `default`   | `2a3f8000-696e-11d3-8000-000000000000`          |
/// | `urn`       | `urn:uuid:2a3f8000-696e-11d3-8000-000000000000` |
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Format {
    /// 32 hexadecimal digits without separators.
    Compact,
    /// The 8-4-4-4-12 canonical form.
    #[default]
    Default,
    /// The canonical form prefixed with `urn:uuid:`.
    Urn,
}

impl Format {
    /// Returns the symbolic name of the format.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Default => "default",
            Self::Urn => "urn",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl str::FromStr for Format {
    type Err = Error;

    /// Looks up a format by name. A leading `:` is accepted, so `"urn"` and `":urn"` are the same.
    fn from_str(kind: &str) -> Result<Self> {
        match kind.strip_prefix(':').unwrap_or(kind) {
            "compact" => Ok(Self::Compact),
            "default" => Ok(Self::Default),
            "urn" => Ok(Self::Urn),
            _ => Err(Error::InvalidFormat(kind.to_owned())),
        }
    }
}

/// Renders `value` in the form named by `kind`.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] naming `kind` if it is not one of `compact`, `default`, or
/// `urn`.
///
/// # Examples
///
/// ```rust
/// use uuid1::{format, Uuid};
///
/// assert_eq!(
///     format(Uuid::NIL, "compact")?,
///     "00000000000000000000000000000000"
/// );
///
/// let err = format(Uuid::NIL, ":unknown").unwrap_err();
/// assert_eq!(err.to_string(), "invalid UUID format :unknown");
/// # Ok::<(), uuid1::Error>(())
/// ```
pub fn format(value: Uuid, kind: &str) -> Result<String> {
    Ok(value.to_format(kind.parse()?))
}

/// Tells whether `text` is a UUID in compact, default, or URN form, ignoring case.
///
/// Only the lexical shape is checked; version and variant bits are not inspected.
///
/// # Examples
///
/// ```rust
/// assert!(uuid1::validate("urn:uuid:01234567-ABCD-8901-EFAB-234567890123"));
/// assert!(!uuid1::validate(""));
/// ```
pub fn validate(text: &str) -> bool {
    decode(text).is_ok()
}

/// Parses any of the three forms into a byte array.
pub(crate) fn decode(src: &str) -> std::result::Result<[u8; 16], ParseError> {
    const ERR: ParseError = ParseError {};

    let body = match src.get(..URN_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(URN_PREFIX) => &src[URN_PREFIX.len()..],
        _ => src,
    };
    let hyphenated = match body.len() {
        32 => false,
        36 => true,
        _ => return Err(ERR),
    };
    // the URN form always carries hyphens
    if !hyphenated && body.len() != src.len() {
        return Err(ERR);
    }

    let mut dst = [0u8; 16];
    let mut iter = body.chars();
    for (i, e) in dst.iter_mut().enumerate() {
        let hi = iter.next().ok_or(ERR)?.to_digit(16).ok_or(ERR)? as u8;
        let lo = iter.next().ok_or(ERR)?.to_digit(16).ok_or(ERR)? as u8;
        *e = (hi << 4) | lo;
        if hyphenated && (i == 3 || i == 5 || i == 7 || i == 9) && iter.next().ok_or(ERR)? != '-' {
            return Err(ERR);
        }
    }
    if iter.next().is_none() {
        Ok(dst)
    } else {
        Err(ERR)
    }
}

/// Error parsing an invalid string representation of UUID.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid string representation")
    }
}

impl std::error::Error for ParseError {}
