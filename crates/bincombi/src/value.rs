//! Immutable byte values, and values bound to a name by parsing.

use std::{
    fmt::{Debug, Display, Formatter},
    ops::Deref,
    sync::Arc,
};

use num_bigint::{BigInt, Sign as BigSign};
use num_traits::ToPrimitive;

use crate::{
    encoding::{Encoding, Sign},
    source::{Slice, Source},
    token::Token,
};

/// Separates the scope fragments of a bound name, as in `header.length`.
pub const SEPARATOR: char = '.';

/// Bytes with an encoding. Any operation on a value produces a new value.
#[derive(Clone)]
pub struct Value {
    slice: Slice,
    encoding: Encoding,
}

impl Value {
    pub fn new(slice: Slice, encoding: Encoding) -> Self {
        Value { slice, encoding }
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, encoding: Encoding) -> Self {
        Value::new(Slice::from_bytes(bytes), encoding)
    }

    /// The shortest two's complement representation of `numeric` in the given encoding. For
    /// unsigned encodings, a leading zero byte only present to keep the sign positive is dropped.
    pub fn from_numeric(numeric: &BigInt, encoding: Encoding) -> Self {
        let mut bytes = numeric.to_signed_bytes_be();
        if !encoding.is_signed() && bytes.len() > 1 && bytes[0] == 0 {
            bytes.remove(0);
        }
        Value::from_bytes(encoding.byte_order.apply(&bytes), encoding)
    }

    pub fn from_string(text: &str, encoding: Encoding) -> Self {
        Value::from_bytes(encoding.charset.encode(text), encoding)
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    pub fn bytes(&self) -> &[u8] {
        self.slice.data()
    }

    pub fn len(&self) -> u64 {
        self.slice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slice.is_empty()
    }

    pub fn offset(&self) -> u64 {
        self.slice.offset()
    }

    pub fn source(&self) -> &Source {
        self.slice.source()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn as_numeric(&self) -> BigInt {
        let be = self.encoding.byte_order.apply(self.bytes());
        match self.encoding.sign {
            Sign::Signed => BigInt::from_signed_bytes_be(&be),
            Sign::Unsigned => BigInt::from_bytes_be(BigSign::Plus, &be),
        }
    }

    /// The numeric view, if it fits a `u64` (used for sizes, counts and offsets).
    pub fn as_u64(&self) -> Option<u64> {
        self.as_numeric().to_u64()
    }

    pub fn as_string(&self) -> String {
        self.encoding.charset.decode(self.bytes())
    }

    /// Bits from least to most significant.
    pub fn as_bit_set(&self) -> Vec<bool> {
        self.encoding
            .byte_order
            .apply(self.bytes())
            .iter()
            .rev()
            .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
            .collect()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes() && self.encoding == other.encoding
    }
}

impl Eq for Value {}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        for b in self.bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A value bound to a (scoped) name by a definition token.
#[derive(Clone)]
pub struct ParseValue {
    name: Arc<str>,
    definition: Token,
    value: Value,
}

impl ParseValue {
    pub fn new(name: impl Into<Arc<str>>, definition: Token, value: Value) -> Self {
        ParseValue {
            name: name.into(),
            definition,
            value,
        }
    }

    /// The fully scoped name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Token {
        &self.definition
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Matches the full scoped name, or any suffix starting after a scope separator.
    /// `"chunk.length"` matches `"chunk.length"` and `"length"`, but not `"ength"`.
    pub fn matches(&self, name: &str) -> bool {
        match self.name.strip_suffix(name) {
            Some("") => true,
            Some(prefix) => prefix.ends_with(SEPARATOR),
            None => false,
        }
    }
}

impl Deref for ParseValue {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.value
    }
}

impl PartialEq for ParseValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.definition == other.definition
            && self.offset() == other.offset()
            && self.value == other.value
    }
}

impl Eq for ParseValue {}

impl Debug for ParseValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}({:?})", self.name, self.offset(), self.value)
    }
}
