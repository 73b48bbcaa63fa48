//! ## Selection
//! Queries over a parse graph, by name or by the token that produced an item.
//!
//! Every traversal here keeps its own stack, so arbitrarily deep graphs are fine. References
//! are resolved against the graph queried, but a resolved item is never descended into
//! again, which keeps queries over recursive formats finite.

use std::ops::Range;

use itertools::Itertools;

use crate::{
    error::ParseError,
    graph::{ParseGraph, ParseItem, ParseReference},
    source::Source,
    token::Token,
    value::ParseValue,
};

/// Every item at any depth in parse order. A nested graph comes before its items.
fn in_order(graph: &ParseGraph) -> Vec<&ParseItem> {
    let mut out = Vec::new();
    // newest first, so the oldest item is on top
    let mut stack: Vec<&ParseItem> = graph.iter().collect();
    while let Some(item) = stack.pop() {
        out.push(item);
        if let ParseItem::Graph(nested) = item {
            stack.extend(nested.iter());
        }
    }
    out
}

/// The most recently bound value matching `name`.
pub fn get_value(graph: &ParseGraph, name: &str) -> Option<ParseValue> {
    graph
        .walk()
        .filter_map(ParseItem::as_value)
        .find(|v| v.matches(name))
        .cloned()
}

/// Every value matching `name`, in parse order.
pub fn get_all_values(graph: &ParseGraph, name: &str) -> Vec<ParseValue> {
    get_all_values_where(graph, |v| v.matches(name))
}

pub fn get_all_values_where(
    graph: &ParseGraph,
    predicate: impl Fn(&ParseValue) -> bool,
) -> Vec<ParseValue> {
    in_order(graph)
        .into_iter()
        .filter_map(ParseItem::as_value)
        .filter(|v| predicate(v))
        .cloned()
        .collect()
}

/// The most recent item produced by `token`, with a reference resolved against `root`.
pub fn get(root: &ParseGraph, token: &Token) -> Result<Option<ParseItem>, ParseError> {
    let target = token.target();
    match root.walk().find(|item| item.definition() == &target) {
        Some(ParseItem::Reference(reference)) => reference.resolve(root).map(Some),
        Some(item) => Ok(Some(item.clone())),
        None => Ok(None),
    }
}

/// Every item produced by `token`, in parse order, with references resolved against `root`.
pub fn get_all(root: &ParseGraph, token: &Token) -> Result<Vec<ParseItem>, ParseError> {
    let target = token.target();
    in_order(root)
        .into_iter()
        .filter(|item| item.definition() == &target)
        .map(|item| match item {
            ParseItem::Reference(reference) => reference.resolve(root),
            item => Ok(item.clone()),
        })
        .collect()
}

/// Every item produced by `token`, including references and branches still open.
pub fn get_all_unresolved(graph: &ParseGraph, token: &Token) -> Vec<ParseItem> {
    let target = token.target();
    in_order(graph)
        .into_iter()
        .filter(|item| item.definition() == &target)
        .cloned()
        .collect()
}

/// The outermost items produced by `token`: nothing inside a match is visited, so nested
/// occurrences of a recursive token are not reported. `graph` itself is a root if `token`
/// produced it.
pub fn get_all_roots(graph: &ParseGraph, token: &Token) -> Vec<ParseItem> {
    let target = token.target();
    if graph.definition() == &target {
        return vec![ParseItem::Graph(graph.clone())];
    }
    let mut roots = Vec::new();
    let mut stack: Vec<&ParseItem> = graph.iter().collect();
    while let Some(item) = stack.pop() {
        match item {
            ParseItem::Reference(_) => (),
            item if item.definition() == &target => roots.push(item.clone()),
            ParseItem::Graph(nested) => stack.extend(nested.iter()),
            ParseItem::Value(_) => (),
        }
    }
    roots
}

/// Every reference, in parse order.
pub fn get_references(graph: &ParseGraph) -> Vec<ParseReference> {
    in_order(graph)
        .into_iter()
        .filter_map(ParseItem::as_reference)
        .cloned()
        .collect()
}

/// The value at the lowest offset anywhere in `graph`.
pub fn lowest_offset_value(graph: &ParseGraph) -> Option<ParseValue> {
    graph
        .walk()
        .filter_map(ParseItem::as_value)
        .min_by_key(|v| v.offset())
        .cloned()
}

/// The item among `items` that starts at `offset` of `source`. A graph starts where its
/// lowest value starts.
pub fn find_item_at_offset(items: &[ParseItem], offset: u64, source: &Source) -> Option<ParseItem> {
    items
        .iter()
        .find(|item| match item {
            ParseItem::Value(v) => v.offset() == offset && v.source().same(source),
            ParseItem::Graph(g) => lowest_offset_value(g)
                .is_some_and(|v| v.offset() == offset && v.source().same(source)),
            ParseItem::Reference(r) => r.location() == offset && r.source().same(source),
        })
        .cloned()
}

/// The byte ranges of `source` covered by values, merged and in order.
pub fn coverage(graph: &ParseGraph, source: &Source) -> Vec<Range<u64>> {
    graph
        .walk()
        .filter_map(ParseItem::as_value)
        .filter(|v| v.source().same(source) && !v.is_empty())
        .map(|v| v.offset()..v.offset() + v.len())
        .sorted_by_key(|r| (r.start, r.end))
        .coalesce(|a, b| {
            if b.start <= a.end {
                Ok(a.start..a.end.max(b.end))
            } else {
                Err((a, b))
            }
        })
        .collect()
}

/// The byte ranges of `source` no value covers, `None` if the size of the source is unknown.
pub fn gaps(graph: &ParseGraph, source: &Source) -> Option<Vec<Range<u64>>> {
    let size = source.size()?;
    let mut gaps = Vec::new();
    let mut at = 0;
    for covered in coverage(graph, source) {
        if covered.start > at {
            gaps.push(at..covered.start);
        }
        at = at.max(covered.end);
    }
    if at < size {
        gaps.push(at..size);
    }
    Some(gaps)
}
