use itertools::{EitherOrBoth, Itertools};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use super::{BinaryOp, FoldDirection, RefTarget, UnaryOp, ValueExpr, Values};
use crate::{
    encoding::Encoding,
    graph::{ParseItem, Walk},
    state::ParseState,
    value::{ParseValue, Value},
};

/// Shifting further than this has no value, rather than allocating an enormous integer.
const MAX_SHIFT: usize = 1 << 16;

impl ValueExpr {
    /// Evaluates against the values bound in `state`. `encoding` is used for the values this
    /// creates (offsets, counts, lengths).
    pub fn eval(&self, state: &ParseState, encoding: Encoding) -> Values {
        match self {
            ValueExpr::Const(value) => vec![Some(value.clone())],
            ValueExpr::SelfValue => state
                .current()
                .map(|v| vec![Some(v.value().clone())])
                .unwrap_or_default(),
            ValueExpr::Ref { target, limit } => {
                let limit = match limit {
                    Some(limit) => match limit.eval_single(state, encoding).and_then(|l| l.as_u64())
                    {
                        Some(l) => usize::try_from(l).unwrap_or(usize::MAX),
                        None => return Vec::new(),
                    },
                    None => usize::MAX,
                };
                eval_ref(target, limit, state)
            }
            ValueExpr::LocalRef { names, level } => match state.scope_graph(*level) {
                Some((graph, count)) => names
                    .iter()
                    .flat_map(|name| {
                        let mut found: Vec<_> = Walk::new(graph, count)
                            .filter_map(ParseItem::as_value)
                            .filter(|v| v.matches(name))
                            .map(|v| Some(v.value().clone()))
                            .collect();
                        found.reverse();
                        found
                    })
                    .collect(),
                None => Vec::new(),
            },
            ValueExpr::CurrentOffset => vec![Some(number(state.offset(), encoding))],
            ValueExpr::CurrentIteration(level) => state
                .current_iteration(*level)
                .map(|i| vec![Some(number(i, encoding))])
                .unwrap_or_default(),
            ValueExpr::IterationDepth => vec![Some(number(state.iteration_depth(), encoding))],
            ValueExpr::First(values) => values.eval(state, encoding).into_iter().take(1).collect(),
            ValueExpr::Last(values) => match &**values {
                // only the newest binding is needed, so the walk can stop early
                ValueExpr::Ref {
                    target,
                    limit: None,
                } => eval_ref(target, 1, state).into_iter().last().into_iter().collect(),
                values => values.eval(state, encoding).pop().into_iter().collect(),
            },
            ValueExpr::Nth { values, indices } => {
                let values = values.eval(state, encoding);
                indices
                    .eval(state, encoding)
                    .into_iter()
                    .map(|index| {
                        let index = usize::try_from(index?.as_u64()?).ok()?;
                        values.get(index).cloned().flatten()
                    })
                    .collect()
            }
            ValueExpr::Count(values) => {
                vec![Some(number(values.eval(state, encoding).len(), encoding))]
            }
            ValueExpr::Len(values) => map_slots(values.eval(state, encoding), |v| {
                Some(number(v.len(), encoding))
            }),
            ValueExpr::Offset(values) => map_slots(values.eval(state, encoding), |v| {
                Some(number(v.offset(), encoding))
            }),
            ValueExpr::Reverse(values) => {
                let mut values = values.eval(state, encoding);
                values.reverse();
                values
            }
            ValueExpr::Bytes(values) => values
                .eval(state, encoding)
                .into_iter()
                .flat_map(|slot| match slot {
                    Some(v) => v
                        .bytes()
                        .iter()
                        .map(|b| Some(Value::from_bytes(vec![*b], v.encoding())))
                        .collect(),
                    None => vec![None],
                })
                .collect(),
            ValueExpr::Expand { values, count } => {
                let Some(count) = count.eval_single(state, encoding).and_then(|c| c.as_u64())
                else {
                    return Vec::new();
                };
                let values = values.eval(state, encoding);
                let Some(total) = usize::try_from(count)
                    .ok()
                    .and_then(|c| c.checked_mul(values.len()))
                else {
                    return Vec::new();
                };
                values.into_iter().cycle().take(total).collect()
            }
            ValueExpr::Unary(op, operand) => {
                map_slots(operand.eval(state, encoding), |v| unary(*op, &v))
            }
            ValueExpr::Binary(op, left, right) => pairwise(
                left.eval(state, encoding),
                right.eval(state, encoding),
                |l, r| binary(*op, l, r),
            ),
            ValueExpr::Fold {
                values,
                reducer,
                initial,
                direction,
            } => {
                let mut values = values.eval(state, encoding);
                if *direction == FoldDirection::Right {
                    values.reverse();
                }
                let mut acc = match initial {
                    Some(initial) => initial.eval_single(state, encoding),
                    None if values.is_empty() => return Vec::new(),
                    None => values.remove(0),
                };
                for next in values {
                    acc = match (acc, next) {
                        (Some(acc), Some(next)) => {
                            let (l, r) = match direction {
                                FoldDirection::Left => (acc, next),
                                FoldDirection::Right => (next, acc),
                            };
                            reducer(ValueExpr::Const(l), ValueExpr::Const(r))
                                .eval_single(state, encoding)
                        }
                        _ => None,
                    };
                }
                vec![acc]
            }
            ValueExpr::Elvis(left, right) => {
                let left = left.eval(state, encoding);
                let right = right.eval(state, encoding);
                if left.is_empty() {
                    return right;
                }
                let broadcast = right.len() == 1;
                left.into_iter()
                    .enumerate()
                    .map(|(i, slot)| {
                        slot.or_else(|| {
                            let fallback = if broadcast { right.first() } else { right.get(i) };
                            fallback.cloned().flatten()
                        })
                    })
                    .collect()
            }
            ValueExpr::When(values, predicate) => {
                if predicate.eval(state, encoding) {
                    values.eval(state, encoding)
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// The last (most recent) element, for contexts that need exactly one value.
    pub fn eval_single(&self, state: &ParseState, encoding: Encoding) -> Option<Value> {
        self.eval(state, encoding).pop().flatten()
    }
}

fn number(n: impl Into<BigInt>, encoding: Encoding) -> Value {
    Value::from_numeric(&n.into(), encoding)
}

fn map_slots(values: Values, f: impl Fn(Value) -> Option<Value>) -> Values {
    values.into_iter().map(|slot| slot.and_then(&f)).collect()
}

/// Values bound by `target`, grouped per name in parse order. At most `limit` (the newest)
/// bindings of each name are kept.
fn eval_ref(target: &RefTarget, limit: usize, state: &ParseState) -> Values {
    let newest = |pred: &dyn Fn(&ParseValue) -> bool| {
        let mut found: Vec<_> = state
            .graph()
            .walk()
            .filter_map(ParseItem::as_value)
            .filter(|&v| pred(v))
            .take(limit)
            .map(|v| Some(v.value().clone()))
            .collect();
        found.reverse();
        found
    };
    match target {
        RefTarget::Names(names) => names
            .iter()
            .flat_map(|name| newest(&|v| v.matches(name)))
            .collect(),
        RefTarget::Definition(token) => newest(&|v| v.definition() == token),
    }
}

/// Combines two lists slot by slot. A single element list is applied to every slot of the
/// other, and an empty operand gives an empty result.
pub(super) fn pairwise<T>(
    left: Values,
    right: Values,
    f: impl Fn(&Value, &Value) -> Option<T>,
) -> Vec<Option<T>> {
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }
    let apply = |l: &Option<Value>, r: &Option<Value>| match (l, r) {
        (Some(l), Some(r)) => f(l, r),
        _ => None,
    };
    match (left.len(), right.len()) {
        (1, _) => right.iter().map(|r| apply(&left[0], r)).collect(),
        (_, 1) => left.iter().map(|l| apply(l, &right[0])).collect(),
        _ => left
            .iter()
            .zip_longest(right.iter())
            .map(|pair| match pair {
                EitherOrBoth::Both(l, r) => apply(l, r),
                EitherOrBoth::Left(_) | EitherOrBoth::Right(_) => None,
            })
            .collect(),
    }
}

fn unary(op: UnaryOp, operand: &Value) -> Option<Value> {
    match op {
        UnaryOp::Neg => Some(Value::from_numeric(
            &-operand.as_numeric(),
            operand.encoding().signed(),
        )),
        UnaryOp::Not => {
            let bytes: Vec<u8> = operand.bytes().iter().map(|b| !b).collect();
            Some(Value::from_bytes(bytes, operand.encoding()))
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    let encoding = left.encoding();
    let numeric = |n: BigInt| Some(Value::from_numeric(&n, encoding));
    let (l, r) = (left.as_numeric(), right.as_numeric());
    match op {
        BinaryOp::Add => numeric(l + r),
        BinaryOp::Sub => numeric(l - r),
        BinaryOp::Mul => numeric(l * r),
        BinaryOp::Div if r.is_zero() => None,
        BinaryOp::Div => numeric(l / r),
        BinaryOp::Mod if !r.is_positive() => None,
        BinaryOp::Mod => {
            let rem = &l % &r;
            numeric(if rem.is_negative() { rem + r } else { rem })
        }
        BinaryOp::And => bitwise(left, right, |a, b| a & b),
        BinaryOp::Or => bitwise(left, right, |a, b| a | b),
        BinaryOp::ShiftLeft => numeric(l << shift_amount(&r)?),
        BinaryOp::ShiftRight => numeric(l >> shift_amount(&r)?),
        BinaryOp::Cat => {
            let bytes = [left.bytes(), right.bytes()].concat();
            Some(Value::from_bytes(bytes, encoding))
        }
    }
}

fn shift_amount(n: &BigInt) -> Option<usize> {
    n.to_usize().filter(|s| *s <= MAX_SHIFT)
}

/// Byte-wise on the unsigned big-endian views, the shorter operand zero-extended. The result
/// is as long as the longer operand.
fn bitwise(left: &Value, right: &Value, f: impl Fn(u8, u8) -> u8) -> Option<Value> {
    let encoding = left.encoding();
    let l = left.encoding().byte_order.apply(left.bytes());
    let r = right.encoding().byte_order.apply(right.bytes());
    let width = l.len().max(r.len());
    let padded = |b: &[u8]| -> Vec<u8> {
        std::iter::repeat(0)
            .take(width - b.len())
            .chain(b.iter().copied())
            .collect()
    };
    let combined: Vec<u8> = padded(&l)
        .into_iter()
        .zip(padded(&r))
        .map(|(a, b)| f(a, b))
        .collect();
    Some(Value::from_bytes(
        encoding.byte_order.apply(&combined),
        encoding,
    ))
}
