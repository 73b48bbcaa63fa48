//! ## Expressions
//! Side effect free computations over the values bound so far, used for sizes, counts,
//! addresses and predicates.
//!
//! A [`ValueExpr`] evaluates to a list of slots ([`Values`]), one per value, so that an
//! expression over a repeated name works on every binding of it. A slot is `None` when its
//! computation is undefined (division by zero, a missing operand, ..). Nothing here fails
//! loudly: an unknown name is an empty list, and a token consuming an empty list or an empty
//! slot simply fails to parse.
//!
//! ```text
//! def("length", 4)
//! def("data", last(ref_("length")))
//! def_where("total", 2, eq_num(fold_left(len(refs(&["length", "data"])), add)))
//! ```
//!
//! Lists combine pairwise. A single element list is broadcast over the other operand, and a
//! slot without a partner in the other list is `None`.

use std::sync::Arc;

use crate::{encoding::Encoding, token::Token, value::Value};

mod boolean;
mod value;

pub use boolean::{and_b, not_b, or_b, BoolExpr, Comparison, FALSE, TRUE};

/// The result of evaluating a [`ValueExpr`].
pub type Values = Vec<Option<Value>>;

/// Combines two (constant) expressions into one, see [`fold_left`].
pub type Reducer = fn(ValueExpr, ValueExpr) -> ValueExpr;

#[derive(Clone, Debug)]
pub enum RefTarget {
    /// Values whose scoped name matches any of these.
    Names(Vec<String>),
    /// Values (and only values) bound by this token.
    Definition(Token),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    ShiftLeft,
    ShiftRight,
    Cat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldDirection {
    Left,
    Right,
}

#[derive(Clone, Debug)]
pub enum ValueExpr {
    Const(Value),
    /// The most recently bound value.
    SelfValue,
    Ref {
        target: RefTarget,
        /// Only the newest `limit` bindings of each name.
        limit: Option<Arc<ValueExpr>>,
    },
    /// Like [`ValueExpr::Ref`], but only sees values bound inside the scope `level` levels
    /// out from the innermost.
    LocalRef {
        names: Vec<String>,
        level: usize,
    },
    CurrentOffset,
    CurrentIteration(usize),
    IterationDepth,
    First(Arc<ValueExpr>),
    Last(Arc<ValueExpr>),
    Nth {
        values: Arc<ValueExpr>,
        indices: Arc<ValueExpr>,
    },
    Count(Arc<ValueExpr>),
    Len(Arc<ValueExpr>),
    Offset(Arc<ValueExpr>),
    Reverse(Arc<ValueExpr>),
    Bytes(Arc<ValueExpr>),
    Expand {
        values: Arc<ValueExpr>,
        count: Arc<ValueExpr>,
    },
    Unary(UnaryOp, Arc<ValueExpr>),
    Binary(BinaryOp, Arc<ValueExpr>, Arc<ValueExpr>),
    Fold {
        values: Arc<ValueExpr>,
        reducer: Reducer,
        initial: Option<Arc<ValueExpr>>,
        direction: FoldDirection,
    },
    /// Each slot of the left, or where it is empty (or the whole list is), the right.
    Elvis(Arc<ValueExpr>, Arc<ValueExpr>),
    When(Arc<ValueExpr>, Arc<BoolExpr>),
}

impl From<Value> for ValueExpr {
    fn from(value: Value) -> Self {
        ValueExpr::Const(value)
    }
}

impl From<&str> for ValueExpr {
    fn from(text: &str) -> Self {
        con_str(text)
    }
}

macro_rules! numeric_constants {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ValueExpr {
                fn from(n: $t) -> Self {
                    con(n)
                }
            }
        )*
    };
}

numeric_constants!(i32, i64, u8, u32, u64, usize);

/// A numeric constant in the default encoding, signed when negative.
pub fn con(n: impl Into<num_bigint::BigInt>) -> ValueExpr {
    let n = n.into();
    let encoding = if n.sign() == num_bigint::Sign::Minus {
        Encoding::new().signed()
    } else {
        Encoding::new()
    };
    ValueExpr::Const(Value::from_numeric(&n, encoding))
}

pub fn con_encoded(n: impl Into<num_bigint::BigInt>, encoding: Encoding) -> ValueExpr {
    ValueExpr::Const(Value::from_numeric(&n.into(), encoding))
}

pub fn con_bytes(bytes: &[u8]) -> ValueExpr {
    ValueExpr::Const(Value::from_bytes(bytes, Encoding::new()))
}

pub fn con_str(text: &str) -> ValueExpr {
    ValueExpr::Const(Value::from_string(text, Encoding::new()))
}

pub fn self_value() -> ValueExpr {
    ValueExpr::SelfValue
}

pub fn ref_(name: &str) -> ValueExpr {
    refs(&[name])
}

/// Every binding of each name, name by name, each in parse order.
pub fn refs(names: &[&str]) -> ValueExpr {
    ValueExpr::Ref {
        target: RefTarget::Names(names.iter().map(|n| n.to_string()).collect()),
        limit: None,
    }
}

pub fn ref_limit(name: &str, limit: impl Into<ValueExpr>) -> ValueExpr {
    ValueExpr::Ref {
        target: RefTarget::Names(vec![name.to_string()]),
        limit: Some(Arc::new(limit.into())),
    }
}

pub fn ref_token(definition: &Token) -> ValueExpr {
    ValueExpr::Ref {
        target: RefTarget::Definition(definition.clone()),
        limit: None,
    }
}

/// Bindings of `name` inside the scope `level` levels out (0 is the innermost struct or
/// repetition iteration).
pub fn local_ref(name: &str, level: usize) -> ValueExpr {
    local_refs(&[name], level)
}

pub fn local_refs(names: &[&str], level: usize) -> ValueExpr {
    ValueExpr::LocalRef {
        names: names.iter().map(|n| n.to_string()).collect(),
        level,
    }
}

pub fn current_offset() -> ValueExpr {
    ValueExpr::CurrentOffset
}

pub fn current_iteration(level: usize) -> ValueExpr {
    ValueExpr::CurrentIteration(level)
}

pub fn iteration_depth() -> ValueExpr {
    ValueExpr::IterationDepth
}

macro_rules! unary_constructors {
    ($($name:ident => $variant:ident),*) => {
        $(
            pub fn $name(values: impl Into<ValueExpr>) -> ValueExpr {
                ValueExpr::$variant(Arc::new(values.into()))
            }
        )*
    };
}

unary_constructors!(
    first => First,
    last => Last,
    count => Count,
    len => Len,
    offset => Offset,
    rev => Reverse,
    bytes => Bytes
);

pub fn nth(values: impl Into<ValueExpr>, indices: impl Into<ValueExpr>) -> ValueExpr {
    ValueExpr::Nth {
        values: Arc::new(values.into()),
        indices: Arc::new(indices.into()),
    }
}

/// The list of `values` repeated `count` times.
pub fn expand(values: impl Into<ValueExpr>, count: impl Into<ValueExpr>) -> ValueExpr {
    ValueExpr::Expand {
        values: Arc::new(values.into()),
        count: Arc::new(count.into()),
    }
}

pub fn neg(operand: impl Into<ValueExpr>) -> ValueExpr {
    ValueExpr::Unary(UnaryOp::Neg, Arc::new(operand.into()))
}

/// Bitwise complement, keeping the length of each value.
pub fn not(operand: impl Into<ValueExpr>) -> ValueExpr {
    ValueExpr::Unary(UnaryOp::Not, Arc::new(operand.into()))
}

macro_rules! binary_constructors {
    ($($(#[$doc:meta])* $name:ident => $op:ident),*) => {
        $(
            $(#[$doc])*
            pub fn $name(left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> ValueExpr {
                ValueExpr::Binary(BinaryOp::$op, Arc::new(left.into()), Arc::new(right.into()))
            }
        )*
    };
}

binary_constructors!(
    add => Add,
    subtract => Sub,
    mul => Mul,
    /// Truncating division, no value when dividing by zero.
    div => Div,
    /// The non-negative remainder, no value for a divisor below one.
    modulo => Mod,
    and => And,
    or => Or,
    shl => ShiftLeft,
    shr => ShiftRight,
    /// Byte concatenation.
    cat => Cat
);

pub fn fold_left(values: impl Into<ValueExpr>, reducer: Reducer) -> ValueExpr {
    fold(values.into(), reducer, None, FoldDirection::Left)
}

pub fn fold_left_from(
    values: impl Into<ValueExpr>,
    reducer: Reducer,
    initial: impl Into<ValueExpr>,
) -> ValueExpr {
    fold(values.into(), reducer, Some(initial.into()), FoldDirection::Left)
}

pub fn fold_right(values: impl Into<ValueExpr>, reducer: Reducer) -> ValueExpr {
    fold(values.into(), reducer, None, FoldDirection::Right)
}

/// All values concatenated into one.
pub fn fold_cat(values: impl Into<ValueExpr>) -> ValueExpr {
    fold_left(values, cat)
}

fn fold(
    values: ValueExpr,
    reducer: Reducer,
    initial: Option<ValueExpr>,
    direction: FoldDirection,
) -> ValueExpr {
    ValueExpr::Fold {
        values: Arc::new(values),
        reducer,
        initial: initial.map(Arc::new),
        direction,
    }
}

pub fn elvis(left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> ValueExpr {
    ValueExpr::Elvis(Arc::new(left.into()), Arc::new(right.into()))
}

/// The values if the predicate holds, no values otherwise.
pub fn when(values: impl Into<ValueExpr>, predicate: BoolExpr) -> ValueExpr {
    ValueExpr::When(Arc::new(values.into()), Arc::new(predicate))
}

macro_rules! self_comparisons {
    ($($(#[$doc:meta])* $name:ident => $kind:ident),*) => {
        $(
            $(#[$doc])*
            pub fn $name(predicate: impl Into<ValueExpr>) -> BoolExpr {
                BoolExpr::Compare {
                    kind: Comparison::$kind,
                    value: None,
                    predicate: Arc::new(predicate.into()),
                }
            }
        )*
    };
}

self_comparisons!(
    /// The most recent value has the same bytes as the predicate.
    eq => Eq,
    eq_num => EqNum,
    eq_str => EqStr,
    gt_num => GtNum,
    lt_num => LtNum,
    gt_eq_num => GtEqNum,
    lt_eq_num => LtEqNum
);

macro_rules! value_comparisons {
    ($($name:ident => $kind:ident),*) => {
        impl ValueExpr {
            $(
                pub fn $name(self, predicate: impl Into<ValueExpr>) -> BoolExpr {
                    BoolExpr::Compare {
                        kind: Comparison::$kind,
                        value: Some(Arc::new(self)),
                        predicate: Arc::new(predicate.into()),
                    }
                }
            )*
        }
    };
}

value_comparisons!(
    eq => Eq,
    eq_num => EqNum,
    eq_str => EqStr,
    gt_num => GtNum,
    lt_num => LtNum,
    gt_eq_num => GtEqNum,
    lt_eq_num => LtEqNum
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::parse,
        source::Source,
        state::ParseState,
        token::{def, rep},
    };

    fn state(bytes: &[u8]) -> ParseState {
        parse(Source::from_bytes(bytes), &rep(def("a", 1)), Encoding::new())
            .unwrap()
            .unwrap()
    }

    fn numbers(expr: &ValueExpr, state: &ParseState) -> Vec<Option<u64>> {
        expr.eval(state, Encoding::new())
            .into_iter()
            .map(|slot| slot.and_then(|v| v.as_u64()))
            .collect()
    }

    fn single(expr: ValueExpr) -> Option<u64> {
        expr.eval_single(&state(&[]), Encoding::new())
            .and_then(|v| v.as_u64())
    }

    #[test]
    fn arithmetic() {
        assert_eq!(single(add(2, 3)), Some(5));
        assert_eq!(single(subtract(mul(4, 5), 6)), Some(14));
        assert_eq!(single(div(7, 2)), Some(3));
        assert_eq!(single(div(7, 0)), None);
        assert_eq!(single(modulo(7, 3)), Some(1));
        assert_eq!(single(modulo(7, 0)), None);
        assert_eq!(single(modulo(neg(7), 3)), Some(2));
        assert_eq!(single(shl(1, 12)), Some(4096));
        assert_eq!(single(shr(4096, 4)), Some(256));
        assert_eq!(single(shl(1, 1 << 20)), None);
    }

    #[test]
    fn bitwise() {
        assert_eq!(single(and(0x1FF, 0x0F)), Some(0x0F));
        assert_eq!(single(or(0x100, 0x0F)), Some(0x10F));
        let complement = not(con_bytes(&[0x0F, 0xF0]))
            .eval_single(&state(&[]), Encoding::new())
            .unwrap();
        assert_eq!(complement.bytes(), &[0xF0, 0x0F]);
    }

    #[test]
    fn negative_constants_are_signed() {
        let value = con(-1).eval_single(&state(&[]), Encoding::new()).unwrap();
        assert_eq!(value.bytes(), &[0xFF]);
        assert_eq!(value.as_numeric(), num_bigint::BigInt::from(-1));
        assert_eq!(con(255).eval_single(&state(&[]), Encoding::new()).unwrap().bytes(), &[0xFF]);
    }

    #[test]
    fn references() {
        let s = state(&[1, 2, 3]);
        assert_eq!(numbers(&ref_("a"), &s), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(numbers(&ref_limit("a", 2), &s), vec![Some(2), Some(3)]);
        assert_eq!(numbers(&last(ref_("a")), &s), vec![Some(3)]);
        assert_eq!(numbers(&first(ref_("a")), &s), vec![Some(1)]);
        assert_eq!(numbers(&count(ref_("a")), &s), vec![Some(3)]);
        assert_eq!(numbers(&offset(ref_("a")), &s), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(numbers(&rev(ref_("a")), &s), vec![Some(3), Some(2), Some(1)]);
        assert_eq!(numbers(&self_value(), &s), vec![Some(3)]);
        assert_eq!(numbers(&current_offset(), &s), vec![Some(3)]);
        assert!(ref_("b").eval(&s, Encoding::new()).is_empty());
    }

    #[test]
    fn lists_pair_up() {
        let s = state(&[1, 2, 3]);
        assert_eq!(numbers(&add(ref_("a"), 10), &s), vec![Some(11), Some(12), Some(13)]);
        assert_eq!(numbers(&add(ref_("a"), ref_("a")), &s), vec![Some(2), Some(4), Some(6)]);
        assert_eq!(
            numbers(&add(ref_("a"), ref_limit("a", 2)), &s),
            vec![Some(3), Some(5), None]
        );
        assert!(add(ref_("a"), ref_("b")).eval(&s, Encoding::new()).is_empty());
    }

    #[test]
    fn selecting() {
        let s = state(&[5, 6, 7]);
        assert_eq!(numbers(&nth(ref_("a"), 1), &s), vec![Some(6)]);
        assert_eq!(numbers(&nth(ref_("a"), 9), &s), vec![None]);
        assert_eq!(numbers(&expand(7, 3), &s), vec![Some(7); 3]);
        assert_eq!(numbers(&bytes(con_bytes(&[1, 2])), &s), vec![Some(1), Some(2)]);
        assert_eq!(numbers(&len(con_bytes(&[1, 2])), &s), vec![Some(2)]);
    }

    #[test]
    fn folds() {
        let s = state(&[1, 2, 3]);
        assert_eq!(numbers(&fold_left(ref_("a"), add), &s), vec![Some(6)]);
        assert_eq!(numbers(&fold_left_from(ref_("a"), add, 10), &s), vec![Some(16)]);
        let d = state(&[8, 2, 1]);
        assert_eq!(numbers(&fold_left(ref_("a"), subtract), &d), vec![Some(5)]);
        assert_eq!(numbers(&fold_right(ref_("a"), subtract), &d), vec![Some(7)]);
        let joined = fold_cat(ref_("a")).eval_single(&s, Encoding::new()).unwrap();
        assert_eq!(joined.bytes(), &[1, 2, 3]);
        assert!(fold_left(ref_("b"), add).eval(&s, Encoding::new()).is_empty());
        assert_eq!(numbers(&fold_left(add(ref_("a"), div(1, 0)), add), &s), vec![None]);
    }

    #[test]
    fn fallbacks() {
        let s = state(&[1, 2]);
        assert_eq!(numbers(&elvis(ref_("b"), 9), &s), vec![Some(9)]);
        assert_eq!(numbers(&elvis(div(ref_("a"), 0), 9), &s), vec![Some(9), Some(9)]);
        assert_eq!(numbers(&elvis(ref_("a"), 9), &s), vec![Some(1), Some(2)]);
        assert_eq!(numbers(&when(ref_("a"), TRUE), &s), vec![Some(1), Some(2)]);
        assert!(when(ref_("a"), FALSE).eval(&s, Encoding::new()).is_empty());
    }

    #[test]
    fn comparisons() {
        let s = state(&[1, 2]);
        let holds = |expr: BoolExpr| expr.eval(&s, Encoding::new());
        assert!(holds(eq_num(2)));
        assert!(holds(ref_("a").gt_num(0)));
        assert!(!holds(ref_("a").gt_num(1)));
        assert!(holds(ref_("a").eq_num(ref_("a"))));
        assert!(holds(ref_("a").lt_eq_num(2) & gt_eq_num(2)));
        assert!(holds(!eq_num(1) | FALSE));
        assert!(!holds(ref_("b").eq_num(ref_("b"))));
        assert!(!holds(ref_("a").eq_num(ref_limit("a", 1))));
        assert!(holds(con_str("abc").eq_str("abc")));
        assert!(holds(con_bytes(&[0, 1]).eq(con_bytes(&[0, 1]))));
        assert!(!holds(con_bytes(&[0, 1]).eq(con(1))));
        assert!(holds(con_bytes(&[0, 1]).eq_num(1)));
    }
}
