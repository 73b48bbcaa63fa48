//! Tokens that shape the graph beyond a flat read: jumping to other offsets, parsing computed
//! data, scoping and recursion.

use std::{
    fmt::Formatter,
    sync::{Arc, Weak},
};

use super::{Combi, Environment, Token, TokenInner, TokenKind};
use crate::{
    callback::StructSink,
    error::{ParseError, ParseResult},
    expression::ValueExpr,
    graph::{ParseItem, ParseReference},
    selection,
    source::Source,
};

/// Parses `token` at each offset `address` evaluates to, then returns to where it started.
/// Where `token` already produced something at an offset (as happens when a structure points
/// back into itself), a [`ParseReference`] is added instead of parsing it again.
pub fn sub(token: Token, address: impl Into<ValueExpr>) -> Token {
    Token::new(
        "",
        TokenKind::Sub(Sub {
            token,
            address: address.into(),
        }),
    )
}

#[derive(Clone)]
pub struct Sub {
    token: Token,
    address: ValueExpr,
}

impl Combi for Sub {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let addresses = self.address.eval(&env.state, env.encoding);
        if addresses.is_empty() {
            return Ok(None);
        }
        let target = self.token.target();
        let origin = env.state.offset();
        let mut state = env.state.add_branch(token);
        for address in addresses {
            let Some(offset) = address.and_then(|a| a.as_u64()) else {
                return Ok(None);
            };
            let candidates = selection::get_all_unresolved(state.graph(), &target);
            if selection::find_item_at_offset(&candidates, offset, state.source()).is_some() {
                let reference = ParseReference::new(offset, state.source().clone(), target.clone());
                state = state.add_reference(reference);
                continue;
            }
            match self.token.parse(env.with_state(state.seek(offset)))? {
                Some(next) => state = next,
                None => return Ok(None),
            }
        }
        Ok(Some(state.close_branch(token)?.seek(origin)))
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub({})", self.token)
    }
}

/// Parses `token` over the bytes of `data` (all values concatenated), as if they were a
/// separate input. Afterwards parsing continues on the original source, where it left off.
pub fn tie(token: Token, data: impl Into<ValueExpr>) -> Token {
    Token::new(
        "",
        TokenKind::Tie(Tie {
            token,
            data: data.into(),
        }),
    )
}

#[derive(Clone)]
pub struct Tie {
    token: Token,
    data: ValueExpr,
}

impl Combi for Tie {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let values = self.data.eval(&env.state, env.encoding);
        if values.is_empty() {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        for value in values {
            let Some(value) = value else {
                return Ok(None);
            };
            bytes.extend_from_slice(value.bytes());
        }

        let source = env.state.source().clone();
        let offset = env.state.offset();
        let tied = env
            .state
            .add_branch(token)
            .with_source(Source::from_bytes(bytes), 0);
        match self.token.parse(env.with_state(tied))? {
            Some(state) => Ok(Some(
                state.with_source(source, offset).close_branch(token)?,
            )),
            None => Ok(None),
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tie({})", self.token)
    }
}

/// Parses `token` in its own branch and scope, named `name`. Local references made inside
/// only see what was bound inside.
pub fn scope(name: &str, token: Token) -> Token {
    Token::new(name, TokenKind::Scope(Scope { token, sink: None }))
}

/// A [scope] that hands its finished graph to `sink`.
pub fn structure(name: &str, token: Token, sink: impl StructSink + 'static) -> Token {
    Token::new(
        name,
        TokenKind::Scope(Scope {
            token,
            sink: Some(Arc::new(sink)),
        }),
    )
}

#[derive(Clone)]
pub struct Scope {
    token: Token,
    sink: Option<Arc<dyn StructSink>>,
}

impl Combi for Scope {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let scoped = env.state.add_branch(token).push_scope();
        let Some(state) = self.token.parse(env.with_state(scoped))? else {
            return Ok(None);
        };
        let state = state.pop_scope().close_branch(token)?;
        if let Some(sink) = &self.sink {
            // the branch just closed is the head of the graph it was opened in
            if let Some(graph) = state
                .graph()
                .innermost_open()
                .head()
                .and_then(ParseItem::as_graph)
            {
                sink.handle(&env.scope, env.encoding, graph);
            }
        }
        Ok(Some(state))
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope({})", self.token)
    }
}

/// Builds a token that refers to itself. `f` receives a handle that parses as the token
/// being built.
/// ```
/// # use bincombi::{parse, recursive, seq, cho, def, def_where, eq_num, gt_num, Encoding, Source};
/// // a list of non-zero bytes ended by a zero
/// let list = recursive(|list| cho(def_where("end", 1, eq_num(0)), seq(def_where("item", 1, gt_num(0)), list)));
/// let state = parse(Source::from_bytes(vec![3, 2, 1, 0]), &list, Encoding::new()).unwrap().unwrap();
/// assert_eq!(state.offset(), 4);
/// ```
pub fn recursive(f: impl FnOnce(Token) -> Token) -> Token {
    Token::from_inner(Arc::new_cyclic(|weak: &Weak<TokenInner>| {
        let handle = Token::new("", TokenKind::Handle(Handle(weak.clone())));
        Token::inner(String::new(), TokenKind::Recursive(Recursive { body: f(handle) }))
    }))
}

#[derive(Clone)]
pub struct Recursive {
    body: Token,
}

impl Recursive {
    pub(crate) fn body(&self) -> &Token {
        &self.body
    }
}

impl Combi for Recursive {
    fn comp(&self, _: &Token, env: Environment<'_>) -> ParseResult {
        self.body.parse(env)
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.body)
    }
}

/// The self reference inside a [recursive] token. Holds the token weakly, so the cycle does
/// not keep itself alive.
#[derive(Clone)]
pub struct Handle(Weak<TokenInner>);

impl Handle {
    pub(crate) fn upgrade(&self) -> Option<Token> {
        self.0.upgrade().map(Token::from_inner)
    }
}

impl Combi for Handle {
    fn comp(&self, _: &Token, env: Environment<'_>) -> ParseResult {
        let depth = env.depth + 1;
        if let Some(limit) = env.config().recursion_limit() {
            if depth > limit {
                let err = ParseError::RecursionLimit { limit };
                log::debug!("{err} at offset {}", env.state.offset());
                return Err(err);
            }
        }
        match self.upgrade() {
            Some(token) => token.parse(Environment { depth, ..env }),
            None => {
                log::debug!("{}", ParseError::DanglingRecursion);
                Err(ParseError::DanglingRecursion)
            }
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "...")
    }
}

/// A token parsed by user supplied logic.
pub fn custom(name: &str, combi: impl Combi + 'static) -> Token {
    Token::new(name, TokenKind::Custom(Arc::new(combi)))
}
