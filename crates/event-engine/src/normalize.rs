//! Query normalization.
//!
//! Turns a validated parsed query into a predicate-centric AST:
//!
//! 1. The query splits at every OR into a disjunction of conjunctions;
//!    a single-predicate query is wrapped in a conjunction.
//! 2. Negation is pushed into predicate operators via their complements,
//!    so no negation node survives.
//! 3. Schema name paths resolve into offset predicates, one per matching
//!    offset, joined by disjunction; all resolved types must be mutually
//!    representative.
//! 4. Name-equality predicates whose right-hand side contains glob
//!    metacharacters are rewritten to pattern matches.

use crate::expr::{Ast, Extractor, Node};
use crate::query::{LogicalOp, ParsedPredicate, ParsedQuery, TagField};
use crate::{EngineError, Result};
use event_core::{Pattern, RelOp, Schema, Value};

/// Normalize a parsed query against a schema.
pub fn normalize(query: &ParsedQuery, schema: &Schema) -> Result<Ast> {
    // Split the predicate chain at each OR.
    let mut groups: Vec<Vec<&ParsedPredicate>> = vec![vec![&query.first]];
    for (op, predicate) in &query.rest {
        match op {
            LogicalOp::Or => groups.push(vec![predicate]),
            LogicalOp::And => groups
                .last_mut()
                .expect("groups start non-empty")
                .push(predicate),
        }
    }

    if groups.len() == 1 {
        // A single conjunction is the whole query; a lone predicate is
        // wrapped for uniformity.
        let operands = convert_group(&groups[0], schema)?;
        return Ok(Ast::new(Node::Conjunction(operands)));
    }

    let mut terms = Vec::with_capacity(groups.len());
    for group in &groups {
        let mut operands = convert_group(group, schema)?;
        terms.push(if operands.len() == 1 {
            operands.pop().expect("one operand")
        } else {
            Node::Conjunction(operands)
        });
    }
    Ok(Ast::new(Node::Disjunction(terms)))
}

fn convert_group(group: &[&ParsedPredicate], schema: &Schema) -> Result<Vec<Node>> {
    group
        .iter()
        .map(|predicate| convert(predicate, schema, false))
        .collect()
}

fn convert(predicate: &ParsedPredicate, schema: &Schema, negated: bool) -> Result<Node> {
    match predicate {
        ParsedPredicate::Negated(inner) => {
            // Every operator has a complement, so the negation moves into
            // the operator instead of staying a node.
            convert(inner, schema, !negated)
        }
        ParsedPredicate::Tag { field, op, rhs } => {
            let op = apply_negation(*op, negated);
            let rhs = rhs.fold()?;
            if *field == TagField::Name {
                if let Some(node) = glob_rewrite(op, &rhs)? {
                    return Ok(node);
                }
            }
            let extractor = match field {
                TagField::Name => Extractor::Name,
                TagField::Time => Extractor::Timestamp,
                TagField::Id => Extractor::Id,
            };
            Ok(Node::predicate(
                op,
                Node::Extractor(extractor),
                Node::Constant(rhs),
            ))
        }
        ParsedPredicate::Kind { kind, op, rhs } => Ok(Node::predicate(
            apply_negation(*op, negated),
            Node::Extractor(Extractor::Kind(*kind)),
            Node::Constant(rhs.fold()?),
        )),
        ParsedPredicate::Offset {
            event,
            offset,
            op,
            rhs,
        } => Ok(Node::predicate(
            apply_negation(*op, negated),
            Node::Extractor(Extractor::Offset {
                event: event.clone(),
                offset: offset.clone(),
            }),
            Node::Constant(rhs.fold()?),
        )),
        ParsedPredicate::Schema { path, op, rhs } => {
            resolve_schema_predicate(path, apply_negation(*op, negated), rhs, schema)
        }
    }
}

fn apply_negation(op: RelOp, negated: bool) -> RelOp {
    if negated {
        op.negate()
    } else {
        op
    }
}

/// Rewrite a name-equality predicate with a glob-shaped RHS into a pattern
/// match.
fn glob_rewrite(op: RelOp, rhs: &Value) -> Result<Option<Node>> {
    let Value::Str(s) = rhs else {
        return Ok(None);
    };
    if !Pattern::is_glob(s) {
        return Ok(None);
    }
    let op = match op {
        RelOp::Equal => RelOp::Match,
        RelOp::NotEqual => RelOp::NotMatch,
        _ => return Ok(None),
    };
    let pattern = Pattern::glob(s).map_err(EngineError::from)?;
    Ok(Some(Node::predicate(
        op,
        Node::Extractor(Extractor::Name),
        Node::Constant(Value::Pattern(pattern)),
    )))
}

/// Expand a name-path predicate into offset predicates over every
/// resolved offset, after checking that the offsets agree on type.
fn resolve_schema_predicate(
    path: &[String],
    op: RelOp,
    rhs: &crate::query::ValueExpr,
    schema: &Schema,
) -> Result<Node> {
    let offsets = schema.find_offsets(path);
    if offsets.is_empty() {
        return Err(EngineError::SchemaResolution(path.join(".")));
    }

    let mut types = Vec::with_capacity(offsets.len());
    for (event, offset) in &offsets {
        let ty = schema
            .find_type(event, offset)
            .ok_or_else(|| EngineError::SchemaResolution(path.join(".")))?;
        types.push(ty);
    }
    for ty in &types[1..] {
        if !ty.represents(types[0]) {
            return Err(EngineError::TypeClash {
                lhs: ty.to_string(),
                rhs: types[0].to_string(),
            });
        }
    }

    let rhs = rhs.fold()?;
    let mut predicates: Vec<Node> = offsets
        .into_iter()
        .map(|(event, offset)| {
            Node::predicate(
                op,
                Node::Extractor(Extractor::Offset { event, offset }),
                Node::Constant(rhs.clone()),
            )
        })
        .collect();
    Ok(if predicates.len() == 1 {
        predicates.pop().expect("one predicate")
    } else {
        Node::Disjunction(predicates)
    })
}
