//! Hard errors raised by the engine.
//!
//! An input that does not match a token is *not* an error: tokens return `Ok(None)` and the
//! caller backtracks. Everything in here is either an inconsistency in the grammar or graph
//! ([`ParseError::InvalidArgument`], [`ParseError::UnresolvedReference`], ..) or a fault in
//! the environment ([`SourceError::Io`], [`ParseError::RecursionLimit`]).

use crate::state::ParseState;

/// Errors from a [`ByteSource`](crate::source::ByteSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested range lies (partly) outside of the data. Tokens fold this into an
    /// ordinary parse failure.
    #[error("{length} bytes at offset {offset} are not available")]
    Unavailable { offset: u64, length: u64 },
    #[error("failed to read from source: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid argument to `{combinator}`: {reason}")]
    InvalidArgument {
        combinator: &'static str,
        reason: String,
    },
    #[error("reference to `{definition}` at offset {offset} does not resolve to a parsed item")]
    UnresolvedReference { offset: u64, definition: String },
    #[error("cannot close branch of `{expected}`, the innermost open branch belongs to `{found}`")]
    BranchMismatch { expected: String, found: String },
    #[error("recursive token was dropped while a handle to it was still in use")]
    DanglingRecursion,
    #[error("recursive tokens nested deeper than the recursion limit of {limit}")]
    RecursionLimit { limit: usize },
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// The result of applying a token: a new state on success, `None` on an ordinary mismatch.
pub type ParseResult = Result<Option<ParseState>, ParseError>;

impl ParseError {
    pub(crate) fn invalid(combinator: &'static str, reason: impl Into<String>) -> Self {
        let err = ParseError::InvalidArgument {
            combinator,
            reason: reason.into(),
        };
        log::debug!("{err}");
        err
    }
}
