//! Relational operators over values.
//!
//! The match/in/ni relations are double dispatch over value discriminants:
//! only the semantically meaningful pairs are implemented, everything else
//! is false. Equality and the four orderings lean on the value model's
//! `PartialEq`/`PartialOrd`, so heterogeneous pairs never order and never
//! compare equal.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The relational operator of a predicate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelOp {
    Match,
    NotMatch,
    In,
    NotIn,
    Ni,
    NotNi,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl RelOp {
    /// The complement operator, used to push negation into predicates.
    pub fn negate(self) -> Self {
        match self {
            RelOp::Match => RelOp::NotMatch,
            RelOp::NotMatch => RelOp::Match,
            RelOp::In => RelOp::NotIn,
            RelOp::NotIn => RelOp::In,
            RelOp::Ni => RelOp::NotNi,
            RelOp::NotNi => RelOp::Ni,
            RelOp::Equal => RelOp::NotEqual,
            RelOp::NotEqual => RelOp::Equal,
            RelOp::Less => RelOp::GreaterEqual,
            RelOp::LessEqual => RelOp::Greater,
            RelOp::Greater => RelOp::LessEqual,
            RelOp::GreaterEqual => RelOp::Less,
        }
    }

    /// Whether this operator is the negated member of its pair.
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            RelOp::NotMatch | RelOp::NotIn | RelOp::NotNi | RelOp::NotEqual
        )
    }

    /// Apply the operator to a pair of values.
    pub fn holds(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            RelOp::Match => matches(lhs, rhs),
            RelOp::NotMatch => !matches(lhs, rhs),
            RelOp::In => is_in(lhs, rhs),
            RelOp::NotIn => !is_in(lhs, rhs),
            RelOp::Ni => contains(lhs, rhs),
            RelOp::NotNi => !contains(lhs, rhs),
            RelOp::Equal => lhs == rhs,
            RelOp::NotEqual => lhs != rhs,
            RelOp::Less => lhs.partial_cmp(rhs) == Some(Ordering::Less),
            RelOp::LessEqual => matches!(
                lhs.partial_cmp(rhs),
                Some(Ordering::Less | Ordering::Equal)
            ),
            RelOp::Greater => lhs.partial_cmp(rhs) == Some(Ordering::Greater),
            RelOp::GreaterEqual => matches!(
                lhs.partial_cmp(rhs),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelOp::Match => "~",
            RelOp::NotMatch => "!~",
            RelOp::In => "in",
            RelOp::NotIn => "!in",
            RelOp::Ni => "ni",
            RelOp::NotNi => "!ni",
            RelOp::Equal => "==",
            RelOp::NotEqual => "!=",
            RelOp::Less => "<",
            RelOp::LessEqual => "<=",
            RelOp::Greater => ">",
            RelOp::GreaterEqual => ">=",
        }
    }
}

impl std::fmt::Display for RelOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `lhs ~ rhs`: the pattern on the right matches the whole string on the
/// left.
pub fn matches(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Str(s), Value::Pattern(p)) => p.matches(s),
        _ => false,
    }
}

/// `lhs in rhs`: the left value occurs within the right one.
pub fn is_in(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Str(l), Value::Str(r)) => r.contains(l.as_str()),
        (Value::Str(l), Value::Pattern(p)) => p.search(l),
        (Value::Addr(a), Value::Subnet(s)) => s.contains(a),
        _ => false,
    }
}

/// `lhs ni rhs`: the left value contains the right one. This is `in` with
/// the operands swapped.
pub fn contains(lhs: &Value, rhs: &Value) -> bool {
    is_in(rhs, lhs)
}

/// Add two values, where the combination is meaningful.
pub fn add(lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.checked_add(*b)?)),
        (Value::UInt(a), Value::UInt(b)) => Some(Value::UInt(a.checked_add(*b)?)),
        (Value::Double(a), Value::Double(b)) => Some(Value::Double(a + b)),
        (Value::Span(a), Value::Span(b)) => Some(Value::Span(a.checked_add(*b)?)),
        (Value::Stamp(a), Value::Span(b)) => Some(Value::Stamp(*a + *b)),
        _ => None,
    }
}

/// Subtract two values, where the combination is meaningful.
pub fn sub(lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.checked_sub(*b)?)),
        (Value::UInt(a), Value::UInt(b)) => Some(Value::UInt(a.checked_sub(*b)?)),
        (Value::Double(a), Value::Double(b)) => Some(Value::Double(a - b)),
        (Value::Span(a), Value::Span(b)) => Some(Value::Span(a.checked_sub(*b)?)),
        (Value::Stamp(a), Value::Span(b)) => Some(Value::Stamp(*a - *b)),
        (Value::Stamp(a), Value::Stamp(b)) => Some(Value::Span(*a - *b)),
        _ => None,
    }
}

/// Multiply two values, where the combination is meaningful.
pub fn mul(lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.checked_mul(*b)?)),
        (Value::UInt(a), Value::UInt(b)) => Some(Value::UInt(a.checked_mul(*b)?)),
        (Value::Double(a), Value::Double(b)) => Some(Value::Double(a * b)),
        _ => None,
    }
}

/// Divide two values, where the combination is meaningful.
pub fn div(lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.checked_div(*b)?)),
        (Value::UInt(a), Value::UInt(b)) => Some(Value::UInt(a.checked_div(*b)?)),
        (Value::Double(a), Value::Double(b)) if *b != 0.0 => Some(Value::Double(a / b)),
        _ => None,
    }
}

/// Negate a value, where meaningful.
pub fn neg(operand: &Value) -> Option<Value> {
    match operand {
        Value::Int(a) => Some(Value::Int(a.checked_neg()?)),
        Value::Double(a) => Some(Value::Double(-a)),
        Value::Span(a) => Some(Value::Span(-*a)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Pattern, Subnet};

    #[test]
    fn test_negation_involution() {
        let all = [
            RelOp::Match,
            RelOp::NotMatch,
            RelOp::In,
            RelOp::NotIn,
            RelOp::Ni,
            RelOp::NotNi,
            RelOp::Equal,
            RelOp::NotEqual,
            RelOp::Less,
            RelOp::LessEqual,
            RelOp::Greater,
            RelOp::GreaterEqual,
        ];
        for op in all {
            assert_eq!(op.negate().negate(), op);
        }
        assert_eq!(RelOp::Less.negate(), RelOp::GreaterEqual);
        assert_eq!(RelOp::LessEqual.negate(), RelOp::Greater);
    }

    #[test]
    fn test_match_dispatch() {
        let s = Value::from("foo");
        let p = Value::from(Pattern::new("f.o").unwrap());
        assert!(RelOp::Match.holds(&s, &p));
        assert!(!RelOp::NotMatch.holds(&s, &p));
        // Unsupported pair defaults to false.
        assert!(!RelOp::Match.holds(&p, &s));
        assert!(!RelOp::Match.holds(&s, &Value::from(42i64)));
    }

    #[test]
    fn test_in_dispatch() {
        let needle = Value::from("oo");
        let hay = Value::from("foobar");
        assert!(RelOp::In.holds(&needle, &hay));
        assert!(RelOp::Ni.holds(&hay, &needle));
        assert!(!RelOp::In.holds(&hay, &needle));

        let addr = Value::from("10.1.1.2".parse::<crate::Address>().unwrap());
        let net = Value::from("10.0.0.0/8".parse::<Subnet>().unwrap());
        assert!(RelOp::In.holds(&addr, &net));
        assert!(RelOp::Ni.holds(&net, &addr));
        assert!(!RelOp::In.holds(&net, &addr));
    }

    #[test]
    fn test_ordering_ops() {
        let a = Value::from(1i64);
        let b = Value::from(2i64);
        assert!(RelOp::Less.holds(&a, &b));
        assert!(RelOp::LessEqual.holds(&a, &a));
        assert!(RelOp::GreaterEqual.holds(&b, &a));
        assert!(!RelOp::Greater.holds(&a, &b));

        // Heterogeneous pairs satisfy no ordering operator, but are unequal.
        let s = Value::from("1");
        assert!(!RelOp::Less.holds(&a, &s));
        assert!(!RelOp::GreaterEqual.holds(&a, &s));
        assert!(RelOp::NotEqual.holds(&a, &s));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            add(&Value::Int(40), &Value::Int(2)),
            Some(Value::Int(42))
        );
        assert_eq!(sub(&Value::UInt(2), &Value::UInt(3)), None);
        assert_eq!(
            mul(&Value::Double(1.5), &Value::Double(2.0)),
            Some(Value::Double(3.0))
        );
        assert_eq!(div(&Value::Int(7), &Value::Int(0)), None);
        assert_eq!(neg(&Value::Int(5)), Some(Value::Int(-5)));
        assert_eq!(add(&Value::Int(1), &Value::UInt(1)), None);
    }
}
