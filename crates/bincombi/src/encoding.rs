//! How the bytes of a value are interpreted.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sign {
    #[default]
    Unsigned,
    Signed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// Reorders `bytes` into big-endian order (or back again, the operation is its own
    /// inverse).
    pub fn apply(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            ByteOrder::BigEndian => bytes.to_vec(),
            ByteOrder::LittleEndian => bytes.iter().rev().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    #[default]
    UsAscii,
    Latin1,
    Utf8,
}

impl Charset {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::UsAscii => bytes
                .iter()
                .map(|b| if b.is_ascii() { *b as char } else { '\u{FFFD}' })
                .collect(),
            Charset::Latin1 => bytes.iter().map(|b| *b as char).collect(),
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Encodes `text`, characters outside of the charset become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Charset::UsAscii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Charset::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Charset::Utf8 => text.as_bytes().to_vec(),
        }
    }
}

/// The interpretation of a value's bytes, applied when viewing it as a number or string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Encoding {
    pub sign: Sign,
    pub charset: Charset,
    pub byte_order: ByteOrder,
}

impl Encoding {
    pub const fn new() -> Self {
        Encoding {
            sign: Sign::Unsigned,
            charset: Charset::UsAscii,
            byte_order: ByteOrder::BigEndian,
        }
    }

    pub const fn signed(mut self) -> Self {
        self.sign = Sign::Signed;
        self
    }

    pub const fn unsigned(mut self) -> Self {
        self.sign = Sign::Unsigned;
        self
    }

    pub const fn little_endian(mut self) -> Self {
        self.byte_order = ByteOrder::LittleEndian;
        self
    }

    pub const fn big_endian(mut self) -> Self {
        self.byte_order = ByteOrder::BigEndian;
        self
    }

    pub const fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn is_signed(&self) -> bool {
        self.sign == Sign::Signed
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}/{:?}", self.sign, self.charset, self.byte_order)
    }
}
