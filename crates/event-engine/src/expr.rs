//! The normalized expression AST.
//!
//! Nodes are a plain sum type: extractor and constant leaves, binary
//! predicates, and n-ary boolean connectives. Negation never appears as a
//! node; normalization pushes it into the predicate operators.

use event_core::{Offset, RelOp, Value, ValueKind};

/// An AST leaf that reads a value out of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Extractor {
    /// The event name.
    Name,
    /// The event timestamp.
    Timestamp,
    /// The event ID.
    Id,
    /// The record field at `offset`, valid for events named `event`.
    Offset { event: String, offset: Offset },
    /// Every value of the given kind in the event's record tree.
    Kind(ValueKind),
}

/// A binary relational node.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub op: RelOp,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

impl Predicate {
    pub fn new(op: RelOp, lhs: Node, rhs: Node) -> Self {
        Self {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The constant on the right-hand side, if the RHS is a constant.
    pub fn constant(&self) -> Option<&Value> {
        match self.rhs.as_ref() {
            Node::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// The extractor on the left-hand side, if the LHS is an extractor.
    pub fn extractor(&self) -> Option<&Extractor> {
        match self.lhs.as_ref() {
            Node::Extractor(extractor) => Some(extractor),
            _ => None,
        }
    }
}

/// One node of the normalized AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(Value),
    Extractor(Extractor),
    Predicate(Predicate),
    Conjunction(Vec<Node>),
    Disjunction(Vec<Node>),
}

impl Node {
    /// Build a predicate node.
    pub fn predicate(op: RelOp, lhs: Node, rhs: Node) -> Self {
        Node::Predicate(Predicate::new(op, lhs, rhs))
    }

    /// Collect all leaf predicates, in evaluation order.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut leaves = Vec::new();
        self.collect_predicates(&mut leaves);
        leaves
    }

    fn collect_predicates<'a>(&'a self, leaves: &mut Vec<&'a Predicate>) {
        match self {
            Node::Predicate(predicate) => leaves.push(predicate),
            Node::Conjunction(operands) | Node::Disjunction(operands) => {
                for operand in operands {
                    operand.collect_predicates(leaves);
                }
            }
            Node::Constant(_) | Node::Extractor(_) => {}
        }
    }
}

impl std::fmt::Display for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extractor::Name => write!(f, "&name"),
            Extractor::Timestamp => write!(f, "&time"),
            Extractor::Id => write!(f, "&id"),
            Extractor::Offset { event, offset } => write!(f, "{event}@{offset}"),
            Extractor::Kind(kind) => write!(f, ":{kind}"),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Constant(value) => write!(f, "{value}"),
            Node::Extractor(extractor) => write!(f, "{extractor}"),
            Node::Predicate(p) => write!(f, "{} {} {}", p.lhs, p.op, p.rhs),
            Node::Conjunction(operands) => fmt_operands(f, operands, " && "),
            Node::Disjunction(operands) => fmt_operands(f, operands, " || "),
        }
    }
}

fn fmt_operands(
    f: &mut std::fmt::Formatter<'_>,
    operands: &[Node],
    separator: &str,
) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{operand}")?;
    }
    write!(f, ")")
}

/// A normalized query AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    root: Option<Node>,
}

impl Ast {
    pub fn new(root: Node) -> Self {
        Self { root: Some(root) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Collect the leaf predicates of the whole AST.
    pub fn predicates(&self) -> Vec<&Predicate> {
        match &self.root {
            Some(root) => root.predicates(),
            None => Vec::new(),
        }
    }
}

impl From<Node> for Ast {
    fn from(root: Node) -> Self {
        Self::new(root)
    }
}

impl std::fmt::Display for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{root}"),
            None => write!(f, "<empty>"),
        }
    }
}
