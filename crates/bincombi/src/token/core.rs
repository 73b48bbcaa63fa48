//! The core tokens: reading values, and composing tokens in sequence, choice and repetition.
//! - Each has a type, a construction function and a [Combi] implementation.

use std::{fmt::Formatter, sync::Arc};

use super::{repr_list, scoped, Combi, Environment, Token, TokenKind};
use crate::{
    error::{ParseError, ParseResult},
    expression::{BoolExpr, ValueExpr},
    source::Slice,
    value::{ParseValue, Value},
};

/// Succeeds without doing anything.
#[derive(Clone)]
pub struct Nothing;

impl Combi for Nothing {
    fn comp(&self, _: &Token, env: Environment<'_>) -> ParseResult {
        Ok(Some(env.state))
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "none")
    }
}

/// Reads `size` bytes and binds them as a value named by the scope.
/// ```
/// # use bincombi::{parse, def, Encoding, Source, selection::get_value};
/// let source = Source::from_bytes(vec![0x12, 0x34]);
/// let state = parse(source, &def("word", 2), Encoding::new()).unwrap().unwrap();
/// assert_eq!(get_value(state.graph(), "word").unwrap().bytes(), &[0x12, 0x34]);
/// assert_eq!(state.offset(), 2);
/// ```
pub fn def(name: &str, size: impl Into<ValueExpr>) -> Token {
    Token::new(
        name,
        TokenKind::Def(Def {
            size: size.into(),
            predicate: None,
        }),
    )
}

/// A [def] whose value must satisfy `predicate` (evaluated with the value bound).
pub fn def_where(name: &str, size: impl Into<ValueExpr>, predicate: BoolExpr) -> Token {
    Token::new(
        name,
        TokenKind::Def(Def {
            size: size.into(),
            predicate: Some(predicate),
        }),
    )
}

#[derive(Clone)]
pub struct Def {
    size: ValueExpr,
    predicate: Option<BoolExpr>,
}

impl Combi for Def {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let Some(size) = self
            .size
            .eval_single(&env.state, env.encoding)
            .and_then(|s| s.as_u64())
        else {
            return Ok(None);
        };
        let Some(slice) = env.state.slice(size)? else {
            return Ok(None);
        };
        let value = ParseValue::new(env.scope.clone(), token.clone(), Value::new(slice, env.encoding));
        let state = env.state.add(value).seek(env.state.offset() + size);
        match &self.predicate {
            Some(predicate) if !predicate.eval(&state, env.encoding) => Ok(None),
            _ => Ok(Some(state)),
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "def")
    }
}

/// Skips `size` bytes without binding them. Fails if they are not available.
pub fn nod(size: impl Into<ValueExpr>) -> Token {
    Token::new("", TokenKind::Nod(Nod { size: size.into() }))
}

#[derive(Clone)]
pub struct Nod {
    size: ValueExpr,
}

impl Combi for Nod {
    fn comp(&self, _: &Token, env: Environment<'_>) -> ParseResult {
        let Some(size) = self
            .size
            .eval_single(&env.state, env.encoding)
            .and_then(|s| s.as_u64())
        else {
            return Ok(None);
        };
        let offset = env.state.offset();
        if env.state.source().is_available(offset, size)? {
            Ok(Some(env.state.seek(offset + size)))
        } else {
            Ok(None)
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "nod")
    }
}

/// Applies both tokens in order, in a branch.
pub fn seq(first: Token, second: Token) -> Token {
    seq_many(first, second, Vec::new())
}

pub fn seq_many(first: Token, second: Token, rest: Vec<Token>) -> Token {
    let mut tokens = vec![first, second];
    tokens.extend(rest);
    Token::new("", TokenKind::Seq(Seq(tokens)))
}

/// The first token of several that succeeds, tried from the same state, in a branch.
pub fn cho(first: Token, second: Token) -> Token {
    cho_many(first, second, Vec::new())
}

pub fn cho_many(first: Token, second: Token, rest: Vec<Token>) -> Token {
    let mut tokens = vec![first, second];
    tokens.extend(rest);
    Token::new("", TokenKind::Cho(Cho(tokens)))
}

impl Token {
    /// A sequence of a list only known at runtime.
    pub fn seq_of(tokens: Vec<Token>) -> Result<Token, ParseError> {
        if tokens.len() < 2 {
            return Err(ParseError::invalid(
                "seq",
                format!("needs at least 2 tokens, got {}", tokens.len()),
            ));
        }
        Ok(Token::new("", TokenKind::Seq(Seq(tokens))))
    }

    /// A choice between a list only known at runtime.
    pub fn cho_of(tokens: Vec<Token>) -> Result<Token, ParseError> {
        if tokens.len() < 2 {
            return Err(ParseError::invalid(
                "cho",
                format!("needs at least 2 alternatives, got {}", tokens.len()),
            ));
        }
        Ok(Token::new("", TokenKind::Cho(Cho(tokens))))
    }
}

#[derive(Clone)]
pub struct Seq(Vec<Token>);

impl Combi for Seq {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let mut state = env.state.add_branch(token);
        for t in &self.0 {
            match t.parse(env.with_state(state))? {
                Some(next) => state = next,
                None => return Ok(None),
            }
        }
        Ok(Some(state.close_branch(token)?))
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        repr_list(f, "seq", &self.0)
    }
}

#[derive(Clone)]
pub struct Cho(Vec<Token>);

impl Combi for Cho {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let branched = env.state.add_branch(token);
        for t in &self.0 {
            if let Some(state) = t.parse(env.with_state(branched.clone()))? {
                return Ok(Some(state.close_branch(token)?));
            }
        }
        Ok(None)
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        repr_list(f, "cho", &self.0)
    }
}

/// Zero or more times, until `token` fails. An iteration that consumes nothing ends the
/// repetition (it is kept if it bound anything).
pub fn rep(token: Token) -> Token {
    repeat(token, Bound::Unbounded)
}

/// Exactly `count` times, `count` evaluated before the first iteration.
pub fn repn(token: Token, count: impl Into<ValueExpr>) -> Token {
    repeat(token, Bound::Count(count.into()))
}

/// Zero or more times, while `predicate` holds before each iteration. Only the predicate
/// (or a failing iteration) ends it, so iterations need not consume anything.
pub fn whl(token: Token, predicate: BoolExpr) -> Token {
    repeat(token, Bound::While(predicate))
}

fn repeat(token: Token, bound: Bound) -> Token {
    Token::new("", TokenKind::Repeat(Repeat { token, bound }))
}

#[derive(Clone)]
enum Bound {
    Unbounded,
    Count(ValueExpr),
    While(BoolExpr),
}

/// Every iteration runs in its own scope, inside the scope of the whole repetition.
#[derive(Clone)]
pub struct Repeat {
    token: Token,
    bound: Bound,
}

impl Combi for Repeat {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        // only `Some` for a counted repetition
        let mut remaining = match &self.bound {
            Bound::Count(count) => match count
                .eval_single(&env.state, env.encoding)
                .and_then(|c| c.as_u64())
            {
                Some(count) => Some(count),
                None => return Ok(None),
            },
            _ => None,
        };

        let mut state = env
            .state
            .add_branch(token)
            .push_iteration(token)
            .push_scope();
        loop {
            match (&self.bound, remaining) {
                (_, Some(0)) => break,
                (Bound::While(predicate), _) if !predicate.eval(&state, env.encoding) => break,
                _ => (),
            }
            let Some(next) = self.token.parse(env.with_state(state.push_scope()))? else {
                match self.bound {
                    Bound::Count(_) => return Ok(None),
                    _ => break,
                }
            };
            let next = next.pop_scope().iterate();
            if let Some(remaining) = remaining.as_mut() {
                *remaining -= 1;
            }
            // an unbounded repetition has nothing else to stop it
            if matches!(self.bound, Bound::Unbounded) && next.offset() == state.offset() {
                if !next.graph().ptr_eq(state.graph()) {
                    state = next;
                }
                break;
            }
            state = next;
        }
        Ok(Some(state.pop_scope().pop_iteration().close_branch(token)?))
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.bound {
            Bound::Unbounded => write!(f, "rep({})", self.token),
            Bound::Count(_) => write!(f, "repn({})", self.token),
            Bound::While(_) => write!(f, "whl({})", self.token),
        }
    }
}

/// The token, or nothing (and the original state) if it fails.
pub fn opt(token: Token) -> Token {
    Token::new("", TokenKind::Opt(Opt(token)))
}

#[derive(Clone)]
pub struct Opt(Token);

impl Combi for Opt {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        match self.0.parse(env.with_state(env.state.add_branch(token)))? {
            Some(state) => Ok(Some(state.close_branch(token)?)),
            None => Ok(Some(env.state)),
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "opt({})", self.0)
    }
}

/// Only parses `token` if `predicate` holds beforehand.
pub fn pre(token: Token, predicate: BoolExpr) -> Token {
    Token::new("", TokenKind::Pre(Pre { token, predicate }))
}

#[derive(Clone)]
pub struct Pre {
    token: Token,
    predicate: BoolExpr,
}

impl Combi for Pre {
    fn comp(&self, _: &Token, env: Environment<'_>) -> ParseResult {
        if self.predicate.eval(&env.state, env.encoding) {
            self.token.parse(env)
        } else {
            Ok(None)
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pre({})", self.token)
    }
}

/// Parses `token`, then only succeeds if `predicate` holds on the result.
pub fn post(token: Token, predicate: BoolExpr) -> Token {
    Token::new("", TokenKind::Post(Post { token, predicate }))
}

#[derive(Clone)]
pub struct Post {
    token: Token,
    predicate: BoolExpr,
}

impl Combi for Post {
    fn comp(&self, _: &Token, env: Environment<'_>) -> ParseResult {
        let encoding = env.encoding;
        Ok(self
            .token
            .parse(env)?
            .filter(|state| self.predicate.eval(state, encoding)))
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "post({})", self.token)
    }
}

/// Binds the shortest run of bytes after which `terminator` parses, then the terminator.
/// ```
/// # use bincombi::{parse, until, def, eq_num, def_where, Encoding, Source, selection::get_value};
/// let source = Source::from_bytes(b"abc\0rest".to_vec());
/// let token = until("text", def_where("nul", 1, eq_num(0)));
/// let state = parse(source, &token, Encoding::new()).unwrap().unwrap();
/// assert_eq!(get_value(state.graph(), "text").unwrap().as_string(), "abc");
/// assert_eq!(state.offset(), 4);
/// ```
pub fn until(name: &str, terminator: Token) -> Token {
    Token::new(
        "",
        TokenKind::Until(Until {
            name: name.to_string(),
            terminator,
        }),
    )
}

#[derive(Clone)]
pub struct Until {
    name: String,
    terminator: Token,
}

impl Combi for Until {
    fn comp(&self, token: &Token, env: Environment<'_>) -> ParseResult {
        let name = scoped(&env.scope, &self.name);
        let source = env.state.source().clone();
        let start = env.state.offset();
        let branched = env.state.add_branch(token);
        let mut data = Vec::new();
        loop {
            let end = start + data.len() as u64;
            let slice = Slice::new(source.clone(), start, Arc::from(data.as_slice()));
            let value = ParseValue::new(name.clone(), token.clone(), Value::new(slice, env.encoding));
            let state = branched.add(value).seek(end);
            if let Some(state) = self.terminator.parse(env.with_state(state))? {
                return Ok(Some(state.close_branch(token)?));
            }
            // one byte further, reading only the byte not yet seen
            let Some(next) = Slice::read(&source, end, 1)? else {
                return Ok(None);
            };
            data.extend_from_slice(next.data());
        }
    }

    fn repr(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "until({}, {})", self.name, self.terminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::parse,
        encoding::Encoding,
        expression::{con, current_iteration, eq_num, gt_num, last, lt_num, nth, ref_},
        graph::ParseItem,
        selection::{get_all_values, get_value},
        source::Source,
        state::ParseState,
        token::sub,
    };

    fn run(token: &Token, bytes: &[u8]) -> Option<ParseState> {
        parse(Source::from_bytes(bytes.to_vec()), token, Encoding::new()).unwrap()
    }

    fn numbers(state: &ParseState, name: &str) -> Vec<u64> {
        get_all_values(state.graph(), name)
            .iter()
            .filter_map(|v| v.as_u64())
            .collect()
    }

    #[test]
    fn def_reads_and_binds() {
        let state = run(&def("a", 2), &[1, 2, 3]).unwrap();
        assert_eq!(state.offset(), 2);
        assert_eq!(get_value(state.graph(), "a").unwrap().bytes(), &[1, 2]);
        assert!(run(&def("a", 4), &[1, 2, 3]).is_none());
    }

    #[test]
    fn def_size_from_reference() {
        let token = seq(def("len", 1), def("data", last(ref_("len"))));
        let state = run(&token, &[2, 7, 8, 9]).unwrap();
        assert_eq!(get_value(state.graph(), "data").unwrap().bytes(), &[7, 8]);
        // no binding of the size means no value
        assert!(run(&def("data", last(ref_("len"))), &[1]).is_none());
    }

    #[test]
    fn def_predicate_rolls_back() {
        let token = cho(def_where("small", 1, lt_num(con(10))), def("any", 1));
        let state = run(&token, &[42]).unwrap();
        assert!(get_value(state.graph(), "small").is_none());
        assert_eq!(numbers(&state, "any"), vec![42]);
    }

    #[test]
    fn nod_skips() {
        let state = run(&seq(nod(2), def("a", 1)), &[0, 0, 5]).unwrap();
        assert_eq!(numbers(&state, "a"), vec![5]);
        assert!(run(&nod(4), &[0, 0, 5]).is_none());
    }

    #[test]
    fn seq_fails_as_whole() {
        assert!(run(&seq(def("a", 1), def("b", 2)), &[1, 2]).is_none());
    }

    #[test]
    fn seq_of_needs_two() {
        assert!(matches!(
            Token::seq_of(vec![def("a", 1)]),
            Err(ParseError::InvalidArgument {
                combinator: "seq",
                ..
            })
        ));
        assert!(Token::cho_of(Vec::new()).is_err());
        assert!(Token::seq_of(vec![def("a", 1), def("b", 1)]).is_ok());
    }

    #[test]
    fn rep_until_failure() {
        let token = rep(def_where("x", 1, gt_num(con(0))));
        let state = run(&token, &[3, 2, 1, 0, 9]).unwrap();
        assert_eq!(numbers(&state, "x"), vec![3, 2, 1]);
        assert_eq!(state.offset(), 3);
        let empty = run(&token, &[]).unwrap();
        assert_eq!(empty.offset(), 0);
    }

    #[test]
    fn rep_stops_without_progress() {
        let token = rep(opt(def_where("x", 1, eq_num(con(1)))));
        let state = run(&token, &[1, 1, 2]).unwrap();
        assert_eq!(numbers(&state, "x"), vec![1, 1]);
        assert_eq!(state.offset(), 2);
    }

    #[test]
    fn repn_is_exact() {
        let state = run(&repn(def("x", 1), 2), &[1, 2, 3]).unwrap();
        assert_eq!(numbers(&state, "x"), vec![1, 2]);
        assert!(run(&repn(def("x", 1), 4), &[1, 2, 3]).is_none());
        let counted = seq(def("n", 1), repn(def("x", 1), last(ref_("n"))));
        assert_eq!(numbers(&run(&counted, &[2, 5, 6, 7]).unwrap(), "x"), vec![5, 6]);
    }

    #[test]
    fn whl_checks_before_iterations() {
        let token = whl(def("x", 1), current_iteration(0).lt_num(con(2)));
        let state = run(&token, &[1, 2, 3]).unwrap();
        assert_eq!(numbers(&state, "x"), vec![1, 2]);
    }

    #[test]
    fn whl_iterations_need_not_consume() {
        // a table of two pointers, each followed without moving the cursor
        let token = seq(
            repn(def("ptr", 1), 2),
            whl(
                sub(def("v", 1), nth(ref_("ptr"), current_iteration(0))),
                current_iteration(0).lt_num(con(2)),
            ),
        );
        let state = run(&token, &[2, 3, 10, 20]).unwrap();
        assert_eq!(numbers(&state, "v"), vec![10, 20]);
        assert_eq!(state.offset(), 2);
    }

    #[test]
    fn repn_iterations_need_not_consume() {
        let token = seq(def("ptr", 1), repn(sub(def("v", 1), last(ref_("ptr"))), 3));
        let state = run(&token, &[1, 9]).unwrap();
        assert_eq!(numbers(&state, "v"), vec![9]);
        assert_eq!(state.offset(), 1);
    }

    #[test]
    fn opt_keeps_original() {
        let token = seq(opt(def_where("a", 1, eq_num(con(1)))), def("b", 1));
        let state = run(&token, &[7]).unwrap();
        assert_eq!(numbers(&state, "b"), vec![7]);
        assert!(get_value(state.graph(), "a").is_none());
    }

    #[test]
    fn pre_and_post() {
        let token = seq(
            def("flag", 1),
            pre(def("a", 1), ref_("flag").eq_num(con(1))),
        );
        assert!(run(&token, &[1, 5]).is_some());
        assert!(run(&token, &[0, 5]).is_none());

        let checked = post(seq(def("a", 1), def("b", 1)), ref_("a").lt_num(ref_("b")));
        assert!(run(&checked, &[1, 2]).is_some());
        assert!(run(&checked, &[2, 1]).is_none());
    }

    #[test]
    fn until_terminator() {
        let token = until("text", def_where("end", 1, eq_num(con(0))));
        let state = run(&token, &[b'h', b'i', 0, 1]).unwrap();
        assert_eq!(get_value(state.graph(), "text").unwrap().as_string(), "hi");
        assert_eq!(state.offset(), 3);
        assert!(run(&token, &[b'h', b'i']).is_none());

        let empty = run(&token, &[0]).unwrap();
        let text = get_value(empty.graph(), "text").unwrap();
        assert!(text.is_empty());
        assert_eq!(text.offset(), 0);
    }

    #[test]
    fn names_extend_scope() {
        let token = seq(def("a", 1), seq(def("b", 1), def("c", 1)).named("inner"));
        let state = run(&token, &[1, 2, 3]).unwrap();
        let names: Vec<_> = state
            .graph()
            .walk()
            .filter_map(ParseItem::as_value)
            .map(|v| v.name().to_string())
            .collect();
        assert_eq!(names, vec!["inner.c", "inner.b", "a"]);
        assert!(get_value(state.graph(), "inner.b").is_some());
        assert!(get_value(state.graph(), "b").is_some());
    }

    #[test]
    fn encoding_overrides_nest() {
        let le = Encoding::new().little_endian();
        let token = seq(def("a", 2), def("b", 2).with_encoding(le));
        let state = run(&token, &[1, 0, 1, 0]).unwrap();
        assert_eq!(numbers(&state, "a"), vec![256]);
        assert_eq!(numbers(&state, "b"), vec![1]);
    }
}
