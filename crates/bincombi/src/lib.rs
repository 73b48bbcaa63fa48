//! A combinator engine for describing binary data formats, and parsing them into a persistent
//! graph of the values found.
//!
//! A format is a [`Token`], composed from small tokens: [`def`] reads and names bytes,
//! [`seq`], [`cho`], [`rep`] and friends compose, and [`sub`] jumps to an offset computed
//! from values read earlier. Sizes, predicates and offsets are [expressions](expression)
//! over the values bound so far.
//!
//! ```
//! use bincombi::{def, def_where, last, parse, ref_, seqs, eq_str, selection, Encoding, Source};
//!
//! let chunk = seqs!(
//!     def("length", 1),
//!     def_where("type", 4, eq_str("IHDR")),
//!     def("data", last(ref_("length"))),
//! );
//! let source = Source::from_bytes(b"\x02IHDR\x10\x20".to_vec());
//! let state = parse(source, &chunk, Encoding::new()).unwrap().unwrap();
//! let data = selection::get_value(state.graph(), "data").unwrap();
//! assert_eq!(data.bytes(), &[0x10, 0x20]);
//! ```
//!
//! Parsing never mutates: every token returns a new [`ParseState`], and a failed alternative
//! is dropped without affecting the state it started from.
#![allow(internal_features)]
#![cfg_attr(feature = "nightly", feature(rustc_attrs))]
#![warn(clippy::style)]
#![warn(clippy::perf)]
#![warn(clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

pub mod callback;
pub mod config;
pub mod encoding;
pub mod error;
pub mod expression;
pub mod graph;
pub mod macros;
pub mod selection;
pub mod source;
pub mod state;
pub mod token;
pub mod value;

pub use callback::{Callbacks, LogCallback, StructSink, TokenCallback};
pub use config::{parse, parse_at, ParseConfig};
pub use encoding::{ByteOrder, Charset, Encoding, Sign};
pub use error::{ParseError, ParseResult, SourceError};
pub use expression::*;
pub use graph::{ParseGraph, ParseItem, ParseReference, EMPTY};
pub use source::{ByteSource, Slice, Source};
pub use state::ParseState;
pub use token::*;
pub use value::{ParseValue, Value};
