//! ## Tokens
//! A [`Token`] is a parsing rule: a function from a [`ParseState`] to either a new state
//! (`Ok(Some(..))`), an ordinary failure (`Ok(None)`) or a hard error (`Err(..)`).
//!
//! Tokens are cheap shared handles (an [`Arc`]) compared by identity, so the same token can
//! be used in many places of a format, and by many concurrent parses. The built in kinds are
//! a closed set; custom parsing logic plugs in through the [`Combi`] trait with [`custom`].
//!
//! ```text
//! seq(def("length", 1), def("data", last(ref_("length"))))
//!      │                 │           └─ size computed from the graph so far
//!      │                 └─ binds "data"
//!      └─ opens a branch, closed when both succeed
//! ```
//!
//! Every application of a token:
//! 1. extends the scope with the token's name (if it has one)
//! 2. picks the token's encoding override, or inherits the encoding in use
//! 3. runs the kind's [`Combi::comp`], then reports to the configured callbacks.

use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use crate::{
    config::ParseConfig,
    encoding::Encoding,
    error::ParseResult,
    state::ParseState,
    value::SEPARATOR,
};

mod core;
mod structure;

pub use self::core::*;
pub use self::structure::*;

/// The token that parses nothing and always succeeds. Also the definition of the empty graph.
pub static NONE: LazyLock<Token> = LazyLock::new(|| Token::new("", TokenKind::Nothing(Nothing)));

/// The extension point for parsing logic beyond the built in tokens.
#[cfg_attr(
    feature = "nightly",
    rustc_on_unimplemented(
        message = "`{Self}` is not a `Combi` so cannot be used as a token",
        label = "Not `Combi`",
    )
)]
pub trait Combi: Send + Sync {
    /// Parses with the state in `env`. `token` is the token being applied (the one to open
    /// and close branches with).
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult;

    /// Writes a representation of the combinator, used when the token has no name.
    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}

/// Allows [`Combi::repr`] to be used with [`Display`].
pub struct Repr<'a>(pub &'a dyn Combi);

impl Display for Repr<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.repr(f)
    }
}

/// Everything a token is applied to.
#[derive(Clone)]
pub struct Environment<'a> {
    pub state: ParseState,
    /// The scope values bound here are named with.
    pub scope: Arc<str>,
    pub encoding: Encoding,
    /// Recursive tokens re-entered on the way here.
    depth: usize,
    config: &'a ParseConfig,
}

impl<'a> Environment<'a> {
    pub(crate) fn new(state: ParseState, encoding: Encoding, config: &'a ParseConfig) -> Self {
        Environment {
            state,
            scope: Arc::from(""),
            encoding,
            depth: 0,
            config,
        }
    }

    /// The same environment, continuing from `state`.
    pub fn with_state(&self, state: ParseState) -> Self {
        Environment {
            state,
            scope: self.scope.clone(),
            encoding: self.encoding,
            depth: self.depth,
            config: self.config,
        }
    }

    pub fn config(&self) -> &'a ParseConfig {
        self.config
    }
}

/// Joins a scope and a name with the scope separator.
pub(crate) fn scoped(scope: &str, name: &str) -> Arc<str> {
    match (scope.is_empty(), name.is_empty()) {
        (_, true) => Arc::from(scope),
        (true, false) => Arc::from(name),
        (false, false) => Arc::from(format!("{scope}{SEPARATOR}{name}")),
    }
}

#[derive(Clone)]
pub(crate) enum TokenKind {
    Nothing(Nothing),
    Def(Def),
    Nod(Nod),
    Seq(Seq),
    Cho(Cho),
    Repeat(Repeat),
    Opt(Opt),
    Pre(Pre),
    Post(Post),
    Until(Until),
    Sub(Sub),
    Tie(Tie),
    Scope(Scope),
    Recursive(Recursive),
    Handle(Handle),
    Custom(Arc<dyn Combi>),
}

impl TokenKind {
    fn combi(&self) -> &dyn Combi {
        match self {
            TokenKind::Nothing(c) => c,
            TokenKind::Def(c) => c,
            TokenKind::Nod(c) => c,
            TokenKind::Seq(c) => c,
            TokenKind::Cho(c) => c,
            TokenKind::Repeat(c) => c,
            TokenKind::Opt(c) => c,
            TokenKind::Pre(c) => c,
            TokenKind::Post(c) => c,
            TokenKind::Until(c) => c,
            TokenKind::Sub(c) => c,
            TokenKind::Tie(c) => c,
            TokenKind::Scope(c) => c,
            TokenKind::Recursive(c) => c,
            TokenKind::Handle(c) => c,
            TokenKind::Custom(c) => &**c,
        }
    }
}

pub(crate) struct TokenInner {
    name: String,
    encoding: Option<Encoding>,
    kind: TokenKind,
}

#[derive(Clone)]
pub struct Token(Arc<TokenInner>);

impl Token {
    pub(crate) fn new(name: impl Into<String>, kind: TokenKind) -> Self {
        Token(Arc::new(TokenInner {
            name: name.into(),
            encoding: None,
            kind,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The encoding override, if any.
    pub fn encoding(&self) -> Option<Encoding> {
        self.0.encoding
    }

    /// A copy of this token under another name. The copy is a distinct token.
    pub fn named(&self, name: impl Into<String>) -> Token {
        Token(Arc::new(TokenInner {
            name: name.into(),
            encoding: self.0.encoding,
            kind: self.0.kind.clone(),
        }))
    }

    /// A copy of this token that parses (and binds everything inside it) with `encoding`.
    pub fn with_encoding(&self, encoding: Encoding) -> Token {
        Token(Arc::new(TokenInner {
            name: self.0.name.clone(),
            encoding: Some(encoding),
            kind: self.0.kind.clone(),
        }))
    }

    /// The token whose results end up in the graph when this one is parsed. Recursive
    /// tokens and their handles stand in for the token built from them.
    pub fn target(&self) -> Token {
        let mut token = self.clone();
        loop {
            let next = match &token.0.kind {
                TokenKind::Recursive(r) => r.body().clone(),
                TokenKind::Handle(h) => match h.upgrade() {
                    Some(owner) => owner,
                    None => return token,
                },
                _ => return token,
            };
            token = next;
        }
    }

    pub fn parse(&self, env: Environment<'_>) -> ParseResult {
        let callbacks = env.config.callbacks();
        let before = (!callbacks.is_empty()).then(|| env.state.clone());
        let offset = env.state.offset();
        let inner = Environment {
            scope: scoped(&env.scope, &self.0.name),
            encoding: self.0.encoding.unwrap_or(env.encoding),
            state: env.state,
            depth: env.depth,
            config: env.config,
        };

        log::trace!("{self} at {offset}");
        let result = self.0.kind.combi().comp(self, inner)?;
        match &result {
            Some(after) => log::trace!("{self} matched {offset}..{}", after.offset()),
            None => log::trace!("{self} failed at {offset}"),
        }
        if let Some(before) = before {
            match &result {
                Some(after) => callbacks.handle_success(self, &before, after),
                None => callbacks.handle_failure(self, &before),
            }
        }
        Ok(result)
    }

    pub fn ptr_eq(&self, other: &Token) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn kind(&self) -> &TokenKind {
        &self.0.kind
    }

    pub(crate) fn from_inner(inner: Arc<TokenInner>) -> Self {
        Token(inner)
    }

    pub(crate) fn inner(name: String, kind: TokenKind) -> TokenInner {
        TokenInner {
            name,
            encoding: None,
            kind,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.name.is_empty() {
            self.0.kind.combi().repr(f)
        } else {
            write!(f, "{}", self.0.name)
        }
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Writes `name(a, b, c)`.
pub(crate) fn repr_list(f: &mut Formatter<'_>, name: &str, tokens: &[Token]) -> std::fmt::Result {
    write!(f, "{name}(")?;
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{token}")?;
    }
    write!(f, ")")
}
