//! Parse wide settings, and the entry points that start a parse.

use crate::{
    callback::{Callbacks, TokenCallback},
    encoding::Encoding,
    error::ParseResult,
    source::Source,
    state::ParseState,
    token::{Environment, Token},
};

/// How deep a [`recursive`](crate::token::recursive) token may re-enter itself before giving
/// up with [`RecursionLimit`](crate::error::ParseError::RecursionLimit). Every level is a
/// handful of native stack frames, so parses this deep want a thread with a few MiB of stack.
pub const DEFAULT_RECURSION_LIMIT: usize = 512;

/// Built by chaining, as in
/// ```
/// # use bincombi::{ParseConfig, Encoding, LogCallback, Source, def};
/// let config = ParseConfig::new()
///     .with_encoding(Encoding::new().little_endian())
///     .with_offset(1)
///     .with_callback(LogCallback);
/// let state = config.parse(Source::from_bytes(vec![0, 1, 2]), &def("n", 2)).unwrap().unwrap();
/// assert_eq!(state.current().unwrap().as_u64(), Some(0x0201));
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    encoding: Encoding,
    offset: u64,
    callbacks: Callbacks,
    recursion_limit: Option<usize>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            encoding: Encoding::new(),
            offset: 0,
            callbacks: Callbacks::default(),
            recursion_limit: Some(DEFAULT_RECURSION_LIMIT),
        }
    }
}

impl ParseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The encoding used where no token overrides it.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_callback(mut self, callback: impl TokenCallback + 'static) -> Self {
        self.callbacks = self.callbacks.add(callback);
        self
    }

    pub fn with_callback_for(
        mut self,
        token: &Token,
        callback: impl TokenCallback + 'static,
    ) -> Self {
        self.callbacks = self.callbacks.add_for(token, callback);
        self
    }

    /// The deepest a recursive token may nest. `None` allows unbounded nesting, which a deep
    /// enough input can use to overflow the stack.
    pub fn with_recursion_limit(mut self, limit: Option<usize>) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    pub fn recursion_limit(&self) -> Option<usize> {
        self.recursion_limit
    }

    pub fn parse(&self, source: Source, token: &Token) -> ParseResult {
        let state = ParseState::new(source, self.offset);
        log::debug!("parsing {token} from offset {}", self.offset);
        let result = token.parse(Environment::new(state, self.encoding, self))?;
        if result.is_none() {
            log::debug!("{token} did not match");
        }
        Ok(result)
    }
}

/// Parses `source` from its start.
pub fn parse(source: Source, token: &Token, encoding: Encoding) -> ParseResult {
    parse_at(source, token, encoding, 0)
}

pub fn parse_at(source: Source, token: &Token, encoding: Encoding, offset: u64) -> ParseResult {
    ParseConfig::new()
        .with_encoding(encoding)
        .with_offset(offset)
        .parse(source, token)
}
