//! Event schemas: typed record shapes and name-path resolution.
//!
//! A schema maps event names to the record shape of their arguments. Query
//! normalization uses it to resolve name paths (e.g. `b.y`) into the
//! positional offsets of every matching leaf field.

use crate::{Offset, ValueKind};
use serde::{Deserialize, Serialize};

/// The type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Bool,
    Int,
    UInt,
    Double,
    Span,
    Time,
    String,
    Pattern,
    Addr,
    Subnet,
    Port,
    Record(Vec<Field>),
    Vector(Box<Type>),
    Set(Box<Type>),
    Table(Box<Type>, Box<Type>),
}

/// A named field inside a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Type {
    /// The value discriminant this type corresponds to.
    pub fn kind(&self) -> ValueKind {
        match self {
            Type::Bool => ValueKind::Bool,
            Type::Int => ValueKind::Int,
            Type::UInt => ValueKind::UInt,
            Type::Double => ValueKind::Double,
            Type::Span => ValueKind::TimeSpan,
            Type::Time => ValueKind::TimeStamp,
            Type::String => ValueKind::String,
            Type::Pattern => ValueKind::Pattern,
            Type::Addr => ValueKind::Address,
            Type::Subnet => ValueKind::Subnet,
            Type::Port => ValueKind::Port,
            Type::Record(_) => ValueKind::Record,
            Type::Vector(_) => ValueKind::Vector,
            Type::Set(_) => ValueKind::Set,
            Type::Table(..) => ValueKind::Table,
        }
    }

    /// Structural compatibility: two types represent each other when their
    /// shapes agree, ignoring field names.
    pub fn represents(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Record(a), Type::Record(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.ty.represents(&y.ty))
            }
            (Type::Vector(a), Type::Vector(b)) | (Type::Set(a), Type::Set(b)) => {
                a.represents(b)
            }
            (Type::Table(ak, av), Type::Table(bk, bv)) => {
                ak.represents(bk) && av.represents(bv)
            }
            _ => self.kind() == other.kind(),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Record(fields) => {
                write!(f, "record {{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            Type::Vector(t) => write!(f, "vector of {t}"),
            Type::Set(t) => write!(f, "set[{t}]"),
            Type::Table(k, v) => write!(f, "table[{k}] of {v}"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// The declaration of one event: its name and argument record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    pub args: Vec<Field>,
}

impl EventDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument field (builder style).
    pub fn arg(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.args.push(Field::new(name, ty));
        self
    }
}

/// A collection of event declarations, read-only after load.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    events: Vec<EventDecl>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema from its JSON representation.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the schema to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn add(&mut self, decl: EventDecl) {
        self.events.push(decl);
    }

    pub fn events(&self) -> &[EventDecl] {
        &self.events
    }

    pub fn event(&self, name: &str) -> Option<&EventDecl> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Resolve a name path to the offsets of all matching leaf fields.
    ///
    /// A leaf matches when the final path component equals the leaf's field
    /// name and the preceding components appear, in order, among the names
    /// of its enclosing record fields. `["b", "y"]` thus finds every leaf
    /// named `y` nested (at any depth) below a record field named `b`.
    pub fn find_offsets(&self, path: &[impl AsRef<str>]) -> Vec<(String, Offset)> {
        let path: Vec<&str> = path.iter().map(|p| p.as_ref()).collect();
        let mut found = Vec::new();
        if path.is_empty() {
            return found;
        }
        for event in &self.events {
            let mut names = Vec::new();
            let mut offset = Vec::new();
            walk_fields(
                &event.args,
                &path,
                &mut names,
                &mut offset,
                &mut |off| found.push((event.name.clone(), Offset::new(off.to_vec()))),
            );
        }
        found
    }

    /// The type at the given offset within an event declaration.
    pub fn find_type(&self, event: &str, offset: &Offset) -> Option<&Type> {
        let decl = self.event(event)?;
        let mut indices = offset.as_slice().iter();
        let mut current = &decl.args.get(*indices.next()?)?.ty;
        for index in indices {
            match current {
                Type::Record(fields) => current = &fields.get(*index)?.ty,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// Depth-first walk over a record shape, invoking `emit` for every leaf
/// whose name chain matches the queried path.
fn walk_fields(
    fields: &[Field],
    path: &[&str],
    names: &mut Vec<String>,
    offset: &mut Vec<usize>,
    emit: &mut impl FnMut(&[usize]),
) {
    for (i, field) in fields.iter().enumerate() {
        offset.push(i);
        match &field.ty {
            Type::Record(inner) => {
                names.push(field.name.clone());
                walk_fields(inner, path, names, offset, emit);
                names.pop();
            }
            _ => {
                let (last, prefix) = path.split_last().expect("non-empty path");
                if field.name == *last && is_subsequence(prefix, names) {
                    emit(offset);
                }
            }
        }
        offset.pop();
    }
}

/// Whether `needle` occurs as an in-order (gap-allowed) subsequence of
/// `haystack`.
fn is_subsequence(needle: &[&str], haystack: &[String]) -> bool {
    let mut it = haystack.iter();
    needle
        .iter()
        .all(|n| it.by_ref().any(|h| h == n))
}
