//! Per-event evaluation of normalized ASTs.
//!
//! Evaluation walks the AST depth-first against one event. Kind extractors
//! carry an explicit cursor over the event's record tree; the enclosing
//! predicate retries with each yielded value until one satisfies it or the
//! cursor is exhausted.

use crate::expr::{Ast, Extractor, Node};
use event_core::{Event, Record, Value, ValueKind};

/// Evaluate an AST against a single event. The empty AST evaluates to
/// `Invalid`, which callers treat as false.
pub fn evaluate(ast: &Ast, event: &Event) -> Value {
    match ast.root() {
        Some(root) => Evaluator::new(event).eval(root),
        None => Value::Invalid,
    }
}

/// Evaluate a single node against an event.
pub fn evaluate_node(node: &Node, event: &Event) -> Value {
    Evaluator::new(event).eval(node)
}

/// The cursor of an in-flight kind extraction: a stack of record positions
/// plus a flag raised once the walk has covered the whole tree.
struct ExtractorState<'a> {
    pos: Vec<(&'a Record, usize)>,
    complete: bool,
}

struct Evaluator<'a> {
    event: &'a Event,
    state: Option<ExtractorState<'a>>,
}

impl<'a> Evaluator<'a> {
    fn new(event: &'a Event) -> Self {
        Self { event, state: None }
    }

    fn eval(&mut self, node: &Node) -> Value {
        match node {
            Node::Constant(value) => value.clone(),
            Node::Extractor(Extractor::Name) => Value::Str(self.event.name().to_string()),
            Node::Extractor(Extractor::Timestamp) => Value::Stamp(self.event.timestamp()),
            Node::Extractor(Extractor::Id) => Value::UInt(self.event.id().get()),
            Node::Extractor(Extractor::Offset { event, offset }) => {
                if self.event.name() == event {
                    self.event.at(offset).cloned().unwrap_or(Value::Invalid)
                } else {
                    Value::Invalid
                }
            }
            Node::Extractor(Extractor::Kind(kind)) => self.next_of_kind(*kind),
            Node::Predicate(predicate) => {
                let mut result = false;
                loop {
                    let lhs = self.eval(&predicate.lhs);
                    let rhs = self.eval(&predicate.rhs);
                    result = predicate.op.holds(&lhs, &rhs);
                    if result {
                        break;
                    }
                    match &self.state {
                        Some(state) if !state.complete => continue,
                        _ => break,
                    }
                }
                self.state = None;
                Value::Bool(result)
            }
            Node::Conjunction(operands) => {
                Value::Bool(operands.iter().all(|operand| self.eval(operand).is_true()))
            }
            Node::Disjunction(operands) => {
                Value::Bool(operands.iter().any(|operand| self.eval(operand).is_true()))
            }
        }
    }

    /// Yield the next value of the given kind from the event's record
    /// tree, advancing the cursor. Returns `Invalid` once exhausted.
    fn next_of_kind(&mut self, kind: ValueKind) -> Value {
        if self.state.is_none() {
            match self.event.data() {
                Value::Record(record) => {
                    self.state = Some(ExtractorState {
                        pos: vec![(record, 0)],
                        complete: false,
                    });
                }
                data => {
                    // Non-record event data: at most one value to offer.
                    self.state = Some(ExtractorState {
                        pos: Vec::new(),
                        complete: true,
                    });
                    return if data.kind() == kind {
                        data.clone()
                    } else {
                        Value::Invalid
                    };
                }
            }
        }
        let state = self.state.as_mut().expect("state initialized above");
        let mut result = Value::Invalid;
        while let Some(&(record, index)) = state.pos.last() {
            if index == record.len() {
                state.pos.pop();
                continue;
            }
            let top = state.pos.len() - 1;
            state.pos[top].1 = index + 1;
            let value = &record[index];
            if value.is_invalid() {
                continue;
            }
            if let Value::Record(inner) = value {
                state.pos.push((inner, 0));
                continue;
            }
            if value.kind() == kind {
                result = value.clone();
                break;
            }
        }
        if state.pos.is_empty() {
            // The walk covered the whole tree: nothing left to retry with.
            state.complete = true;
        }
        result
    }
}
