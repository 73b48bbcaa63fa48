//! Observers of a parse. Callbacks see every token applied (or only those of one token), and
//! struct sinks receive the finished graph of a [`structure`](crate::token::structure).

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{encoding::Encoding, graph::ParseGraph, state::ParseState, token::Token};

pub trait TokenCallback: Send + Sync {
    fn handle_success(&self, _token: &Token, _before: &ParseState, _after: &ParseState) {}

    fn handle_failure(&self, _token: &Token, _before: &ParseState) {}
}

pub trait StructSink: Send + Sync {
    /// `scope` is the full scoped name of the structure.
    fn handle(&self, scope: &str, encoding: Encoding, graph: &ParseGraph);
}

impl<F> StructSink for F
where
    F: Fn(&str, Encoding, &ParseGraph) + Send + Sync,
{
    fn handle(&self, scope: &str, encoding: Encoding, graph: &ParseGraph) {
        self(scope, encoding, graph)
    }
}

#[derive(Clone, Default)]
pub struct Callbacks {
    generic: Vec<Arc<dyn TokenCallback>>,
    per_token: FxHashMap<Token, Vec<Arc<dyn TokenCallback>>>,
}

impl Callbacks {
    /// Called for every token.
    pub fn add(mut self, callback: impl TokenCallback + 'static) -> Self {
        self.generic.push(Arc::new(callback));
        self
    }

    /// Called for `token` only.
    pub fn add_for(mut self, token: &Token, callback: impl TokenCallback + 'static) -> Self {
        self.per_token
            .entry(token.clone())
            .or_default()
            .push(Arc::new(callback));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.generic.is_empty() && self.per_token.is_empty()
    }

    fn for_token<'a>(&'a self, token: &Token) -> impl Iterator<Item = &'a Arc<dyn TokenCallback>> {
        self.generic
            .iter()
            .chain(self.per_token.get(token).into_iter().flatten())
    }

    pub(crate) fn handle_success(&self, token: &Token, before: &ParseState, after: &ParseState) {
        for callback in self.for_token(token) {
            callback.handle_success(token, before, after);
        }
    }

    pub(crate) fn handle_failure(&self, token: &Token, before: &ParseState) {
        for callback in self.for_token(token) {
            callback.handle_failure(token, before);
        }
    }
}

/// Reports every token applied at `debug` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCallback;

impl TokenCallback for LogCallback {
    fn handle_success(&self, token: &Token, before: &ParseState, after: &ParseState) {
        log::debug!(
            "success: {token} at {}..{}",
            before.offset(),
            after.offset()
        );
    }

    fn handle_failure(&self, token: &Token, before: &ParseState) {
        log::debug!("failure: {token} at {}", before.offset());
    }
}
