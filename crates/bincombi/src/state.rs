//! The immutable cursor threaded through every token.

use std::sync::Arc;

use derive_where::derive_where;

use crate::{
    error::{ParseError, SourceError},
    graph::{ParseGraph, ParseReference, EMPTY},
    source::{Slice, Source},
    token::Token,
    value::ParseValue,
};

/// A persistent stack, pushing shares the existing entries.
#[derive_where(Clone, Default)]
pub struct Stack<T> {
    top: Option<Arc<StackNode<T>>>,
    len: usize,
}

struct StackNode<T> {
    head: T,
    tail: Stack<T>,
}

impl<T> Stack<T> {
    pub fn new() -> Self {
        Stack { top: None, len: 0 }
    }

    pub fn push(&self, head: T) -> Self {
        Stack {
            top: Some(Arc::new(StackNode {
                head,
                tail: self.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// The stack without its top entry (an empty stack stays empty).
    pub fn pop(&self) -> Self {
        self.top
            .as_ref()
            .map(|node| node.tail.clone())
            .unwrap_or_default()
    }

    pub fn peek(&self) -> Option<&T> {
        self.get(0)
    }

    /// The entry `level` below the top.
    pub fn get(&self, level: usize) -> Option<&T> {
        let mut node = self.top.as_ref()?;
        for _ in 0..level {
            node = node.tail.top.as_ref()?;
        }
        Some(&node.head)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A repetition in progress, and how many iterations it has completed.
#[derive(Clone, Debug)]
pub struct Iteration {
    pub token: Token,
    pub index: u64,
}

/// A scope boundary: items added to the open branch at `depth` after it held `size` items
/// are inside the scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeFrame {
    pub depth: usize,
    pub size: usize,
}

#[derive(Clone)]
pub struct ParseState {
    graph: ParseGraph,
    offset: u64,
    source: Source,
    iterations: Stack<Iteration>,
    scopes: Stack<ScopeFrame>,
}

impl ParseState {
    pub fn new(source: Source, offset: u64) -> Self {
        ParseState {
            graph: EMPTY.clone(),
            offset,
            source,
            iterations: Stack::new(),
            scopes: Stack::new(),
        }
    }

    pub fn graph(&self) -> &ParseGraph {
        &self.graph
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The most recently bound value.
    pub fn current(&self) -> Option<&ParseValue> {
        self.graph.current()
    }

    fn with_graph(&self, graph: ParseGraph) -> Self {
        ParseState {
            graph,
            ..self.clone()
        }
    }

    pub fn add(&self, value: ParseValue) -> Self {
        self.with_graph(self.graph.add(value))
    }

    pub fn add_reference(&self, reference: ParseReference) -> Self {
        self.with_graph(self.graph.add_reference(reference))
    }

    pub fn add_branch(&self, definition: &Token) -> Self {
        self.with_graph(self.graph.add_branch(definition))
    }

    pub fn close_branch(&self, definition: &Token) -> Result<Self, ParseError> {
        Ok(self.with_graph(self.graph.close_branch(definition)?))
    }

    pub fn seek(&self, offset: u64) -> Self {
        ParseState {
            offset,
            ..self.clone()
        }
    }

    /// Continues on another source, as used when parsing over computed data.
    pub fn with_source(&self, source: Source, offset: u64) -> Self {
        ParseState {
            source,
            offset,
            ..self.clone()
        }
    }

    /// Reads `length` bytes at the current offset, `Ok(None)` if they are not available.
    pub fn slice(&self, length: u64) -> Result<Option<Slice>, SourceError> {
        Slice::read(&self.source, self.offset, length)
    }

    pub fn push_iteration(&self, token: &Token) -> Self {
        ParseState {
            iterations: self.iterations.push(Iteration {
                token: token.clone(),
                index: 0,
            }),
            ..self.clone()
        }
    }

    /// Counts a completed iteration of the innermost repetition.
    pub fn iterate(&self) -> Self {
        match self.iterations.peek() {
            Some(top) => ParseState {
                iterations: self.iterations.pop().push(Iteration {
                    token: top.token.clone(),
                    index: top.index + 1,
                }),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    pub fn pop_iteration(&self) -> Self {
        ParseState {
            iterations: self.iterations.pop(),
            ..self.clone()
        }
    }

    /// The iteration index of the repetition `level` levels out from the innermost.
    pub fn current_iteration(&self, level: usize) -> Option<u64> {
        self.iterations.get(level).map(|it| it.index)
    }

    pub fn iteration_depth(&self) -> usize {
        self.iterations.len()
    }

    /// Opens a scope at the current position of the innermost open branch.
    pub fn push_scope(&self) -> Self {
        let frame = ScopeFrame {
            depth: self.graph.open_depth(),
            size: self.graph.innermost_open().len(),
        };
        ParseState {
            scopes: self.scopes.push(frame),
            ..self.clone()
        }
    }

    pub fn pop_scope(&self) -> Self {
        ParseState {
            scopes: self.scopes.pop(),
            ..self.clone()
        }
    }

    /// The open graph of the scope `level` levels out, and how many of its (newest) items
    /// were added inside the scope.
    pub fn scope_graph(&self, level: usize) -> Option<(&ParseGraph, usize)> {
        let frame = self.scopes.get(level)?;
        let graph = self.graph.open_graph_at(frame.depth)?;
        Some((graph, graph.len().saturating_sub(frame.size)))
    }
}

impl std::fmt::Debug for ParseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseState")
            .field("offset", &self.offset)
            .field("source", &self.source)
            .field("graph", &self.graph)
            .finish()
    }
}
