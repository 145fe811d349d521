// Fixed-width selector and facet-address types with hex parsing/formatting.
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, ErrorKind};

pub const SELECTOR_LEN: usize = 4;
pub const ADDR_LEN: usize = 20;

/// Dispatch key for a routable function. Opaque beyond byte equality.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Selector(pub [u8; SELECTOR_LEN]);

impl Selector {
    pub const fn from_bytes(bytes: [u8; SELECTOR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SELECTOR_LEN] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", bytes_to_hex(&self.0))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Error> {
        let mut bytes = [0u8; SELECTOR_LEN];
        parse_fixed_hex(text, &mut bytes, "selector")?;
        Ok(Self(bytes))
    }
}

/// Address of a facet. The all-zero value is the null sentinel used both as
/// the remove marker in update instructions and as the "unowned" answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct FacetAddr(pub [u8; ADDR_LEN]);

impl FacetAddr {
    pub const NULL: FacetAddr = FacetAddr([0u8; ADDR_LEN]);

    pub const fn from_bytes(bytes: [u8; ADDR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for FacetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", bytes_to_hex(&self.0))
    }
}

impl FromStr for FacetAddr {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Error> {
        let mut bytes = [0u8; ADDR_LEN];
        parse_fixed_hex(text, &mut bytes, "facet address")?;
        Ok(Self(bytes))
    }
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(hex_digit(byte >> 4));
        out.push(hex_digit(byte & 0x0f));
    }
    out
}

pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, Error> {
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    if stripped.len() % 2 != 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("odd-length hex string: {text}")));
    }
    let mut out = Vec::with_capacity(stripped.len() / 2);
    let digits = stripped.as_bytes();
    for pair in digits.chunks_exact(2) {
        let high = hex_value(pair[0])?;
        let low = hex_value(pair[1])?;
        out.push((high << 4) | low);
    }
    Ok(out)
}

fn parse_fixed_hex(text: &str, out: &mut [u8], what: &str) -> Result<(), Error> {
    let bytes = hex_to_bytes(text)?;
    if bytes.len() != out.len() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "{what} must be {} bytes, got {}",
                out.len(),
                bytes.len()
            ))
            .with_hint(format!("Pass {} hex digits, optionally 0x-prefixed.", out.len() * 2)));
    }
    out.copy_from_slice(&bytes);
    Ok(())
}

fn hex_digit(value: u8) -> char {
    match value {
        0..=9 => (b'0' + value) as char,
        _ => (b'a' + value - 10) as char,
    }
}

fn hex_value(digit: u8) -> Result<u8, Error> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid hex digit: {}", digit as char))),
    }
}
