//! The tagged variant over all domain value types.

use crate::{Address, Offset, Pattern, Port, Subnet, TimeSpan, TimeStamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The discriminant of a [`Value`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Invalid,
    Bool,
    Int,
    UInt,
    Double,
    TimeSpan,
    TimeStamp,
    String,
    Pattern,
    Address,
    Subnet,
    Port,
    Record,
    Vector,
    Set,
    Table,
}

impl ValueKind {
    /// Stable single-byte encoding used by the index image.
    pub fn discriminant(self) -> u8 {
        match self {
            ValueKind::Invalid => 0,
            ValueKind::Bool => 1,
            ValueKind::Int => 2,
            ValueKind::UInt => 3,
            ValueKind::Double => 4,
            ValueKind::TimeSpan => 5,
            ValueKind::TimeStamp => 6,
            ValueKind::String => 7,
            ValueKind::Pattern => 8,
            ValueKind::Address => 9,
            ValueKind::Subnet => 10,
            ValueKind::Port => 11,
            ValueKind::Record => 12,
            ValueKind::Vector => 13,
            ValueKind::Set => 14,
            ValueKind::Table => 15,
        }
    }

    pub fn from_discriminant(d: u8) -> Option<Self> {
        Some(match d {
            0 => ValueKind::Invalid,
            1 => ValueKind::Bool,
            2 => ValueKind::Int,
            3 => ValueKind::UInt,
            4 => ValueKind::Double,
            5 => ValueKind::TimeSpan,
            6 => ValueKind::TimeStamp,
            7 => ValueKind::String,
            8 => ValueKind::Pattern,
            9 => ValueKind::Address,
            10 => ValueKind::Subnet,
            11 => ValueKind::Port,
            12 => ValueKind::Record,
            13 => ValueKind::Vector,
            14 => ValueKind::Set,
            15 => ValueKind::Table,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Invalid => "invalid",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Double => "double",
            ValueKind::TimeSpan => "span",
            ValueKind::TimeStamp => "time",
            ValueKind::String => "string",
            ValueKind::Pattern => "pattern",
            ValueKind::Address => "addr",
            ValueKind::Subnet => "subnet",
            ValueKind::Port => "port",
            ValueKind::Record => "record",
            ValueKind::Vector => "vector",
            ValueKind::Set => "set",
            ValueKind::Table => "table",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered sequence of values, indexed by [`Offset`] paths.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Record(pub Vec<Value>);

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Navigate to the value at the given offset path. Intermediate steps
    /// descend nested records only.
    pub fn at(&self, offset: &Offset) -> Option<&Value> {
        let mut indices = offset.as_slice().iter();
        let first = indices.next()?;
        let mut current = self.get(*first)?;
        for index in indices {
            match current {
                Value::Record(inner) => current = inner.get(*index)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

impl std::ops::Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl FromIterator<Value> for Record {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A tagged variant of all domain values.
///
/// Scalars are stored in place; containers are distinct allocations.
/// Equality requires identical discriminants, so `!=` across kinds is
/// always true. Ordering is total within a discriminant and undefined
/// (`None`) across discriminants.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    #[default]
    Invalid,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Span(TimeSpan),
    Stamp(TimeStamp),
    Str(String),
    Pattern(Pattern),
    Addr(Address),
    Subnet(Subnet),
    Port(Port),
    Record(Record),
    Vector(Vec<Value>),
    Set(Vec<Value>),
    Table(Vec<(Value, Value)>),
}

impl Value {
    /// The discriminant of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Invalid => ValueKind::Invalid,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Double(_) => ValueKind::Double,
            Value::Span(_) => ValueKind::TimeSpan,
            Value::Stamp(_) => ValueKind::TimeStamp,
            Value::Str(_) => ValueKind::String,
            Value::Pattern(_) => ValueKind::Pattern,
            Value::Addr(_) => ValueKind::Address,
            Value::Subnet(_) => ValueKind::Subnet,
            Value::Port(_) => ValueKind::Port,
            Value::Record(_) => ValueKind::Record,
            Value::Vector(_) => ValueKind::Vector,
            Value::Set(_) => ValueKind::Set,
            Value::Table(_) => ValueKind::Table,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    /// True exactly for `Bool(true)`. Anything else, including `Invalid`,
    /// is false.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Invalid, Invalid) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int(a), Int(b)) => a.partial_cmp(b),
            (UInt(a), UInt(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Span(a), Span(b)) => a.partial_cmp(b),
            (Stamp(a), Stamp(b)) => a.partial_cmp(b),
            (Str(a), Str(b)) => a.partial_cmp(b),
            (Pattern(a), Pattern(b)) => a.partial_cmp(b),
            (Addr(a), Addr(b)) => a.partial_cmp(b),
            (Subnet(a), Subnet(b)) => a.partial_cmp(b),
            (Port(a), Port(b)) => a.partial_cmp(b),
            (Record(a), Record(b)) => seq_partial_cmp(a.0.iter(), b.0.iter()),
            (Vector(a), Vector(b)) => seq_partial_cmp(a.iter(), b.iter()),
            (Set(a), Set(b)) => seq_partial_cmp(a.iter(), b.iter()),
            (Table(a), Table(b)) => seq_partial_cmp(
                a.iter().flat_map(|(k, v)| [k, v]),
                b.iter().flat_map(|(k, v)| [k, v]),
            ),
            _ => None,
        }
    }
}

/// Lexicographic partial comparison over two value sequences.
fn seq_partial_cmp<'a>(
    mut a: impl Iterator<Item = &'a Value>,
    mut b: impl Iterator<Item = &'a Value>,
) -> Option<Ordering> {
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Some(Ordering::Equal),
            (None, Some(_)) => return Some(Ordering::Less),
            (Some(_), None) => return Some(Ordering::Greater),
            (Some(x), Some(y)) => match x.partial_cmp(y)? {
                Ordering::Equal => continue,
                other => return Some(other),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<TimeSpan> for Value {
    fn from(v: TimeSpan) -> Self {
        Value::Span(v)
    }
}

impl From<TimeStamp> for Value {
    fn from(v: TimeStamp) -> Self {
        Value::Stamp(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Pattern> for Value {
    fn from(v: Pattern) -> Self {
        Value::Pattern(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Value::Addr(v)
    }
}

impl From<Subnet> for Value {
    fn from(v: Subnet) -> Self {
        Value::Subnet(v)
    }
}

impl From<Port> for Value {
    fn from(v: Port) -> Self {
        Value::Port(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Invalid => write!(f, "<invalid>"),
            Value::Bool(true) => write!(f, "T"),
            Value::Bool(false) => write!(f, "F"),
            Value::Int(v) => write!(f, "{v:+}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Span(v) => write!(f, "{v}"),
            Value::Stamp(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Pattern(v) => write!(f, "{v}"),
            Value::Addr(v) => write!(f, "{v}"),
            Value::Subnet(v) => write!(f, "{v}"),
            Value::Port(v) => write!(f, "{v}"),
            Value::Record(r) => display_seq(f, r.iter(), "(", ")"),
            Value::Vector(v) => display_seq(f, v.iter(), "[", "]"),
            Value::Set(v) => display_seq(f, v.iter(), "{", "}"),
            Value::Table(t) => {
                write!(f, "{{")?;
                for (i, (k, v)) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} -> {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn display_seq<'a>(
    f: &mut std::fmt::Formatter<'_>,
    values: impl Iterator<Item = &'a Value>,
    open: &str,
    close: &str,
) -> std::fmt::Result {
    write!(f, "{open}")?;
    for (i, v) in values.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v}")?;
    }
    write!(f, "{close}")
}

/// Build a [`Record`] value from a list of expressions convertible to values.
#[macro_export]
macro_rules! record {
    ($($v:expr),* $(,)?) => {
        $crate::Value::Record($crate::Record::new(vec![$($crate::Value::from($v)),*]))
    };
}
