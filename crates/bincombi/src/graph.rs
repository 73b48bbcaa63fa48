//! ## The persistent parse graph
//! Results are accumulated in a singly linked list of [`ParseItem`]s, newest item at the
//! head. Every operation returns a new graph that shares its tail with the old one, so a
//! token that fails simply drops its candidate graph and the caller's graph is untouched.
//!
//! ```text
//! seq(def a, cho(def b, def c), def d)    after parsing a, b and while parsing d:
//!
//!  root ─► [seq (open)] ─► ∅
//!             │
//!             ▼
//!            [d] ─► [cho] ─► [a] ─► ∅
//!                     │
//!                     ▼
//!                    [b] ─► ∅
//! ```
//! Composite tokens open a branch, which is pushed as a nested graph. While a branch is
//! open, additions are routed into the innermost open branch. Closing a branch finalizes
//! the nested graph.

use std::{
    fmt::{Debug, Formatter},
    sync::{Arc, LazyLock},
};

use crate::{
    error::ParseError,
    selection,
    source::Source,
    token::{Token, NONE},
    value::ParseValue,
};

/// The shared empty graph that every parse starts from.
pub static EMPTY: LazyLock<ParseGraph> = LazyLock::new(|| ParseGraph::empty(NONE.clone()));

#[derive(Clone, PartialEq)]
pub enum ParseItem {
    Value(ParseValue),
    Graph(ParseGraph),
    Reference(ParseReference),
}

impl ParseItem {
    pub fn definition(&self) -> &Token {
        match self {
            ParseItem::Value(v) => v.definition(),
            ParseItem::Graph(g) => g.definition(),
            ParseItem::Reference(r) => r.definition(),
        }
    }

    pub fn as_value(&self) -> Option<&ParseValue> {
        match self {
            ParseItem::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_graph(&self) -> Option<&ParseGraph> {
        match self {
            ParseItem::Graph(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ParseReference> {
        match self {
            ParseItem::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl Debug for ParseItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseItem::Value(v) => v.fmt(f),
            ParseItem::Graph(g) => g.fmt(f),
            ParseItem::Reference(r) => r.fmt(f),
        }
    }
}

/// Marks a position that is structurally the item already parsed by `definition` at
/// `location`. Resolved by searching the graph rather than holding a pointer, as the graph
/// has no back edges and the target may still be open when the reference is created.
#[derive(Clone, PartialEq)]
pub struct ParseReference {
    location: u64,
    source: Source,
    definition: Token,
}

impl ParseReference {
    pub fn new(location: u64, source: Source, definition: Token) -> Self {
        ParseReference {
            location,
            source,
            definition,
        }
    }

    pub fn location(&self) -> u64 {
        self.location
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn definition(&self) -> &Token {
        &self.definition
    }

    /// Finds the referenced item in `root`. A reference that does not resolve means the
    /// graph is inconsistent, and is reported as a hard error.
    pub fn resolve(&self, root: &ParseGraph) -> Result<ParseItem, ParseError> {
        let candidates = selection::get_all_unresolved(root, &self.definition);
        selection::find_item_at_offset(&candidates, self.location, &self.source).ok_or_else(
            || {
                let err = ParseError::UnresolvedReference {
                    offset: self.location,
                    definition: self.definition.to_string(),
                };
                log::debug!("{err}");
                err
            },
        )
    }
}

impl Debug for ParseReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ref({}@{})", self.definition, self.location)
    }
}

#[derive(Clone)]
pub struct ParseGraph(Arc<GraphNode>);

struct GraphNode {
    // INV: `head` is `None` only for the bottom node, which has no `tail`.
    head: Option<ParseItem>,
    tail: Option<ParseGraph>,
    // INV: when branched, `head` is an open nested graph.
    branched: bool,
    definition: Token,
    size: usize,
}

impl Drop for GraphNode {
    // Unlink the tail iteratively, recursive drops of a long graph would overflow the stack.
    fn drop(&mut self) {
        let mut next = self.tail.take();
        while let Some(ParseGraph(node)) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.tail.take(),
                Err(_) => break,
            }
        }
    }
}

impl Default for ParseGraph {
    fn default() -> Self {
        EMPTY.clone()
    }
}

impl ParseGraph {
    /// An empty graph produced by `definition`.
    pub fn empty(definition: Token) -> Self {
        ParseGraph(Arc::new(GraphNode {
            head: None,
            tail: None,
            branched: false,
            definition,
            size: 0,
        }))
    }

    fn cons(&self, head: ParseItem, branched: bool) -> Self {
        ParseGraph(Arc::new(GraphNode {
            head: Some(head),
            tail: Some(self.clone()),
            branched,
            definition: self.0.definition.clone(),
            size: self.0.size + 1,
        }))
    }

    /// Replaces the open branch at the head, keeping this node's tail.
    fn with_branch(&self, branch: ParseGraph, branched: bool) -> Self {
        ParseGraph(Arc::new(GraphNode {
            head: Some(ParseItem::Graph(branch)),
            tail: self.0.tail.clone(),
            branched,
            definition: self.0.definition.clone(),
            size: self.0.size,
        }))
    }

    fn open_branch(&self) -> Option<&ParseGraph> {
        if self.0.branched {
            self.0.head.as_ref().and_then(ParseItem::as_graph)
        } else {
            None
        }
    }

    fn add_item(&self, item: ParseItem) -> Self {
        match self.open_branch() {
            Some(branch) => self.with_branch(branch.add_item(item), true),
            None => self.cons(item, false),
        }
    }

    pub fn add(&self, value: ParseValue) -> Self {
        self.add_item(ParseItem::Value(value))
    }

    pub fn add_reference(&self, reference: ParseReference) -> Self {
        self.add_item(ParseItem::Reference(reference))
    }

    /// Opens a new innermost branch that subsequent additions go into.
    pub fn add_branch(&self, definition: &Token) -> Self {
        match self.open_branch() {
            Some(branch) => self.with_branch(branch.add_branch(definition), true),
            None => self.cons(ParseItem::Graph(ParseGraph::empty(definition.clone())), true),
        }
    }

    /// Closes the innermost open branch, which must have been opened by `definition`.
    pub fn close_branch(&self, definition: &Token) -> Result<Self, ParseError> {
        let Some(branch) = self.open_branch() else {
            return Err(ParseError::BranchMismatch {
                expected: definition.to_string(),
                found: String::from("<no open branch>"),
            });
        };
        if branch.0.branched {
            Ok(self.with_branch(branch.close_branch(definition)?, true))
        } else if branch.definition() == definition {
            Ok(self.with_branch(branch.clone(), false))
        } else {
            Err(ParseError::BranchMismatch {
                expected: definition.to_string(),
                found: branch.definition().to_string(),
            })
        }
    }

    pub fn head(&self) -> Option<&ParseItem> {
        self.0.head.as_ref()
    }

    /// The graph without its head, `None` for an empty graph.
    pub fn tail(&self) -> Option<&ParseGraph> {
        self.0.tail.as_ref()
    }

    pub fn definition(&self) -> &Token {
        &self.0.definition
    }

    pub fn is_empty(&self) -> bool {
        self.0.head.is_none()
    }

    /// The number of direct items (nested graphs count as one).
    pub fn len(&self) -> usize {
        self.0.size
    }

    pub fn is_branched(&self) -> bool {
        self.0.branched
    }

    /// The number of nested open branches below this graph.
    pub fn open_depth(&self) -> usize {
        let mut depth = 0;
        let mut graph = self;
        while let Some(branch) = graph.open_branch() {
            depth += 1;
            graph = branch;
        }
        depth
    }

    /// The open graph `depth` branches down, this graph at depth 0.
    pub fn open_graph_at(&self, depth: usize) -> Option<&ParseGraph> {
        let mut graph = self;
        for _ in 0..depth {
            graph = graph.open_branch()?;
        }
        Some(graph)
    }

    /// The graph additions are currently routed into.
    pub fn innermost_open(&self) -> &ParseGraph {
        let mut graph = self;
        while let Some(branch) = graph.open_branch() {
            graph = branch;
        }
        graph
    }

    /// The direct items, newest first.
    pub fn iter(&self) -> Items<'_> {
        Items { next: Some(self) }
    }

    /// The direct items in the order they were parsed.
    pub fn items_in_order(&self) -> Vec<ParseItem> {
        let mut items: Vec<_> = self.iter().cloned().collect();
        items.reverse();
        items
    }

    /// Every item at any depth, newest first. A nested graph is visited before its items.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self, usize::MAX)
    }

    /// The most recently added value.
    pub fn current(&self) -> Option<&ParseValue> {
        self.walk().find_map(ParseItem::as_value)
    }

    pub fn ptr_eq(&self, other: &ParseGraph) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ParseGraph {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.definition() == other.definition()
                && self.len() == other.len()
                && self.is_branched() == other.is_branched()
                && self.iter().zip(other.iter()).all(|(a, b)| a == b))
    }
}

impl Debug for ParseGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.definition())?;
        if self.is_branched() {
            write!(f, "(open)")?;
        }
        f.debug_list().entries(self.items_in_order()).finish()
    }
}

pub struct Items<'a> {
    next: Option<&'a ParseGraph>,
}

impl<'a> Iterator for Items<'a> {
    type Item = &'a ParseItem;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.next?;
        let head = graph.head()?;
        self.next = graph.tail();
        Some(head)
    }
}

struct Cursor<'a> {
    graph: &'a ParseGraph,
    remaining: usize,
}

/// Depth first, newest first traversal using an explicit stack.
pub struct Walk<'a> {
    stack: Vec<Cursor<'a>>,
}

impl<'a> Walk<'a> {
    /// Walks only the newest `limit` direct items of `graph` (and everything inside them).
    pub fn new(graph: &'a ParseGraph, limit: usize) -> Self {
        Walk {
            stack: vec![Cursor {
                graph,
                remaining: limit,
            }],
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a ParseItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let item = match top.graph.head() {
                Some(item) if top.remaining > 0 => item,
                _ => {
                    self.stack.pop();
                    continue;
                }
            };
            top.remaining -= 1;
            if let Some(tail) = top.graph.tail() {
                top.graph = tail;
            }
            if let ParseItem::Graph(nested) = item {
                self.stack.push(Cursor {
                    graph: nested,
                    remaining: usize::MAX,
                });
            }
            return Some(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encoding::Encoding,
        token::{def, seq},
        value::Value,
    };

    fn value(name: &str, token: &Token, byte: u8) -> ParseValue {
        ParseValue::new(name, token.clone(), Value::from_bytes(vec![byte], Encoding::new()))
    }

    #[test]
    fn empty_is_shared() {
        assert!(EMPTY.is_empty());
        assert!(ParseGraph::default().ptr_eq(&EMPTY));
        assert_eq!(EMPTY.definition(), &*NONE);
    }

    #[test]
    fn additions_go_into_innermost_branch() {
        let a = def("a", 1);
        let s = seq(a.clone(), a.clone());
        let g = EMPTY
            .add(value("a", &a, 1))
            .add_branch(&s)
            .add(value("a", &a, 2))
            .add(value("a", &a, 3));
        assert_eq!(g.len(), 2);
        assert_eq!(g.open_depth(), 1);
        assert_eq!(g.innermost_open().len(), 2);
        assert_eq!(g.current().unwrap().bytes(), &[3]);

        let closed = g.close_branch(&s).unwrap();
        assert_eq!(closed.open_depth(), 0);
        let after = closed.add(value("a", &a, 4));
        assert_eq!(after.len(), 3);
        let nested = after.iter().nth(1).and_then(ParseItem::as_graph).unwrap();
        assert_eq!(nested.definition(), &s);
        assert_eq!(nested.len(), 2);
    }

    #[test]
    fn close_mismatch_is_error() {
        let a = def("a", 1);
        let s = seq(a.clone(), a.clone());
        assert!(matches!(
            EMPTY.close_branch(&s),
            Err(ParseError::BranchMismatch { .. })
        ));
        assert!(matches!(
            EMPTY.add_branch(&s).close_branch(&a),
            Err(ParseError::BranchMismatch { .. })
        ));
    }

    #[test]
    fn old_graphs_are_untouched() {
        let a = def("a", 1);
        let s = seq(a.clone(), a.clone());
        let base = EMPTY.add(value("a", &a, 1)).add_branch(&s);
        let left = base.add(value("a", &a, 2));
        let right = base.add(value("a", &a, 3));
        assert_eq!(base.innermost_open().len(), 0);
        assert_eq!(left.current().unwrap().bytes(), &[2]);
        assert_eq!(right.current().unwrap().bytes(), &[3]);
    }

    #[test]
    fn walk_order_and_limit() {
        let a = def("a", 1);
        let s = seq(a.clone(), a.clone());
        let g = EMPTY
            .add(value("a", &a, 1))
            .add_branch(&s)
            .add(value("a", &a, 2))
            .close_branch(&s)
            .unwrap()
            .add(value("a", &a, 3));
        let bytes: Vec<u8> = g
            .walk()
            .filter_map(ParseItem::as_value)
            .map(|v| v.bytes()[0])
            .collect();
        assert_eq!(bytes, vec![3, 2, 1]);
        let limited: Vec<u8> = Walk::new(&g, 2)
            .filter_map(ParseItem::as_value)
            .map(|v| v.bytes()[0])
            .collect();
        assert_eq!(limited, vec![3, 2]);
    }

    #[test]
    fn long_graph_drops() {
        let a = def("a", 1);
        let mut g = EMPTY.clone();
        for i in 0..200_000u32 {
            g = g.add(value("a", &a, i as u8));
        }
        assert_eq!(g.len(), 200_000);
        drop(g);
    }
}
