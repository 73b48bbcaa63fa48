use std::{
    ops::{BitAnd, BitOr, Not},
    sync::Arc,
};

use super::{value::pairwise, ValueExpr};
use crate::{encoding::Encoding, state::ParseState, value::Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Identical bytes.
    Eq,
    EqNum,
    EqStr,
    GtNum,
    LtNum,
    GtEqNum,
    LtEqNum,
}

impl Comparison {
    fn holds(self, left: &Value, right: &Value) -> bool {
        match self {
            Comparison::Eq => left.bytes() == right.bytes(),
            Comparison::EqNum => left.as_numeric() == right.as_numeric(),
            Comparison::EqStr => left.as_string() == right.as_string(),
            Comparison::GtNum => left.as_numeric() > right.as_numeric(),
            Comparison::LtNum => left.as_numeric() < right.as_numeric(),
            Comparison::GtEqNum => left.as_numeric() >= right.as_numeric(),
            Comparison::LtEqNum => left.as_numeric() <= right.as_numeric(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum BoolExpr {
    True,
    False,
    Compare {
        kind: Comparison,
        /// Compared against the most recently bound value when `None`.
        value: Option<Arc<ValueExpr>>,
        predicate: Arc<ValueExpr>,
    },
    And(Arc<BoolExpr>, Arc<BoolExpr>),
    Or(Arc<BoolExpr>, Arc<BoolExpr>),
    Not(Arc<BoolExpr>),
}

pub const TRUE: BoolExpr = BoolExpr::True;
pub const FALSE: BoolExpr = BoolExpr::False;

impl BoolExpr {
    /// Comparisons hold when both sides have values, pair up (a single value is compared
    /// against every value of the other side) and every pair compares.
    pub fn eval(&self, state: &ParseState, encoding: Encoding) -> bool {
        match self {
            BoolExpr::True => true,
            BoolExpr::False => false,
            BoolExpr::Compare {
                kind,
                value,
                predicate,
            } => {
                let left = match value {
                    Some(value) => value.eval(state, encoding),
                    None => ValueExpr::SelfValue.eval(state, encoding),
                };
                let right = predicate.eval(state, encoding);
                let results = pairwise(left, right, |l, r| Some(kind.holds(l, r)));
                !results.is_empty() && results.into_iter().all(|r| r == Some(true))
            }
            BoolExpr::And(l, r) => l.eval(state, encoding) && r.eval(state, encoding),
            BoolExpr::Or(l, r) => l.eval(state, encoding) || r.eval(state, encoding),
            BoolExpr::Not(e) => !e.eval(state, encoding),
        }
    }
}

pub fn and_b(left: BoolExpr, right: BoolExpr) -> BoolExpr {
    BoolExpr::And(Arc::new(left), Arc::new(right))
}

pub fn or_b(left: BoolExpr, right: BoolExpr) -> BoolExpr {
    BoolExpr::Or(Arc::new(left), Arc::new(right))
}

pub fn not_b(operand: BoolExpr) -> BoolExpr {
    BoolExpr::Not(Arc::new(operand))
}

impl BitAnd for BoolExpr {
    type Output = BoolExpr;

    fn bitand(self, rhs: BoolExpr) -> BoolExpr {
        and_b(self, rhs)
    }
}

impl BitOr for BoolExpr {
    type Output = BoolExpr;

    fn bitor(self, rhs: BoolExpr) -> BoolExpr {
        or_b(self, rhs)
    }
}

impl Not for BoolExpr {
    type Output = BoolExpr;

    fn not(self) -> BoolExpr {
        not_b(self)
    }
}
