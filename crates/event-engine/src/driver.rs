//! Index-driven evaluation.
//!
//! The driver replays a normalized AST bottom-up, substituting per-predicate
//! bitstreams obtained from the bitmap indexes and combining them with
//! bitwise operations. Predicates an index cannot answer (kind-extractor
//! left-hand sides, non-constant right-hand sides) contribute the universe
//! during this pass; if any occur, the full AST is re-checked per event
//! over the resulting candidate set.

use crate::eval::evaluate_node;
use crate::expr::{Ast, Extractor, Node, Predicate};
use event_common::HashMap;
use event_core::{Event, EventId, Offset};
use event_index::{ops, Bitstream, EventIndexer, EwahBitstream};
use tracing::{debug, warn};

/// Read access to a quiesced snapshot of archived events.
pub trait EventStore {
    /// The event with the given ID, if archived.
    fn event(&self, id: EventId) -> Option<&Event>;
}

/// A simple in-memory event store keyed by event ID.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    events: HashMap<EventId, Event>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: Event) {
        self.events.insert(event.id(), event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventStore for MemoryStore {
    fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }
}

impl FromIterator<Event> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut store = Self::new();
        for event in iter {
            store.insert(event);
        }
        store
    }
}

/// The set of indexers serving one archive partition: one for event names,
/// one for timestamps, and one per indexed record offset.
pub struct IndexSet {
    name: EventIndexer,
    time: EventIndexer,
    data: HashMap<(String, Offset), EventIndexer>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self {
            name: EventIndexer::name(),
            time: EventIndexer::time(),
            data: HashMap::default(),
        }
    }

    /// Register a data index for the record field at `offset` of events
    /// named `event`.
    pub fn add_data_index(
        &mut self,
        event: impl Into<String>,
        offset: Offset,
        kind: event_core::ValueKind,
    ) -> crate::Result<()> {
        let event = event.into();
        let indexer = EventIndexer::data(event.clone(), offset.clone(), kind)?;
        self.data.insert((event, offset), indexer);
        Ok(())
    }

    /// Feed a batch of events to every indexer.
    pub fn index_batch(&mut self, events: &[Event]) {
        self.name.push_back_batch(events);
        self.time.push_back_batch(events);
        for indexer in self.data.values_mut() {
            indexer.push_back_batch(events);
        }
    }

    pub fn name_indexer(&self) -> &EventIndexer {
        &self.name
    }

    pub fn time_indexer(&self) -> &EventIndexer {
        &self.time
    }

    pub fn data_indexer(&self, event: &str, offset: &Offset) -> Option<&EventIndexer> {
        self.data.get(&(event.to_string(), offset.clone()))
    }

    /// The bit length of the partition: one position per event ID seen.
    pub fn size(&self) -> u64 {
        let mut size = self.name.size().max(self.time.size());
        for indexer in self.data.values() {
            size = size.max(indexer.size());
        }
        size
    }

    /// Dispatch one predicate to the indexer its left-hand side selects.
    /// Returns `None` for predicates that must fall back to per-event
    /// evaluation.
    fn lookup(&self, predicate: &Predicate) -> Option<EwahBitstream> {
        let constant = predicate.constant()?;
        match predicate.extractor()? {
            Extractor::Name => Some(self.name.lookup(predicate.op, constant)),
            Extractor::Timestamp => Some(self.time.lookup(predicate.op, constant)),
            Extractor::Offset { event, offset } => {
                match self.data.get(&(event.clone(), offset.clone())) {
                    Some(indexer) => Some(indexer.lookup(predicate.op, constant)),
                    None => {
                        warn!("no data index for {event}@{offset}; predicate matches nothing");
                        Some(EwahBitstream::default())
                    }
                }
            }
            // IDs have no index; kind extractors need the event itself.
            Extractor::Id | Extractor::Kind(_) => None,
        }
    }
}

impl Default for IndexSet {
    fn default() -> Self {
        Self::new()
    }
}

/// The bitstream of a subtree plus whether it is exact or an
/// over-approximation containing deferred predicates.
struct Candidates {
    hits: EwahBitstream,
    exact: bool,
}

/// Evaluate a normalized AST over the archive: index-driven where
/// possible, per-event over the candidate set where not.
pub fn evaluate_indexed(
    ast: &Ast,
    indexes: &IndexSet,
    store: &impl EventStore,
) -> EwahBitstream {
    let Some(root) = ast.root() else {
        return EwahBitstream::default();
    };
    let universe = indexes.size();
    let candidates = resolve(root, indexes, universe);
    if candidates.exact {
        return candidates.hits;
    }

    // Deferred predicates remain: re-check each candidate event.
    debug!(
        "index evaluation deferred for parts of `{ast}`; checking {} candidates",
        candidates.hits.count()
    );
    let mut hits = EwahBitstream::default();
    for id in candidates.hits.ones() {
        let Some(event) = store.event(EventId::new(id)) else {
            continue;
        };
        if evaluate_node(root, event).is_true() {
            hits.append(id - hits.size(), false);
            hits.push_back(true);
        }
    }
    hits.append(universe - hits.size(), false);
    hits
}

fn resolve(node: &Node, indexes: &IndexSet, universe: u64) -> Candidates {
    match node {
        Node::Predicate(predicate) => match indexes.lookup(predicate) {
            Some(mut hits) => {
                hits.append(universe.saturating_sub(hits.size()), false);
                Candidates { hits, exact: true }
            }
            None => Candidates {
                hits: EwahBitstream::filled(universe, true),
                exact: false,
            },
        },
        Node::Conjunction(operands) => {
            let mut hits = EwahBitstream::filled(universe, true);
            let mut exact = true;
            for operand in operands {
                let resolved = resolve(operand, indexes, universe);
                hits = ops::and(&hits, &resolved.hits);
                exact &= resolved.exact;
                if hits.count() == 0 {
                    break;
                }
            }
            Candidates { hits, exact }
        }
        Node::Disjunction(operands) => {
            let mut hits = EwahBitstream::filled(universe, false);
            let mut exact = true;
            for operand in operands {
                let resolved = resolve(operand, indexes, universe);
                hits = ops::or(&hits, &resolved.hits);
                exact &= resolved.exact;
            }
            Candidates { hits, exact }
        }
        Node::Constant(value) => {
            // A bare constant only arises from degenerate queries; it
            // selects everything or nothing.
            let bit = value.is_true();
            Candidates {
                hits: EwahBitstream::filled(universe, bit),
                exact: true,
            }
        }
        Node::Extractor(_) => {
            warn!("bare extractor node in normalized AST; deferring to per-event evaluation");
            Candidates {
                hits: EwahBitstream::filled(universe, true),
                exact: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use crate::query::{LogicalOp, ParsedPredicate, ParsedQuery, TagField, ValueExpr};
    use event_core::{record, RelOp, Schema, TimeStamp, Value, ValueKind};

    fn archive() -> (IndexSet, MemoryStore) {
        let mut events = Vec::new();
        for i in 1..=20u64 {
            let name = if i % 4 == 0 { "dns" } else { "conn" };
            events.push(Event::new(
                EventId::new(i),
                TimeStamp::new(i as i64 * 1_000),
                name,
                record![i, i * 10],
            ));
        }
        let mut indexes = IndexSet::new();
        indexes
            .add_data_index("conn", Offset::from([1]), ValueKind::UInt)
            .unwrap();
        indexes.index_batch(&events);
        let store: MemoryStore = events.into_iter().collect();
        (indexes, store)
    }

    fn tag(field: TagField, op: RelOp, rhs: Value) -> ParsedPredicate {
        ParsedPredicate::Tag {
            field,
            op,
            rhs: ValueExpr::Const(rhs),
        }
    }

    #[test]
    fn test_pure_index_evaluation() {
        let (indexes, store) = archive();
        let query = ParsedQuery::new(tag(TagField::Name, RelOp::Equal, Value::from("dns")));
        let ast = normalize(&query, &Schema::new()).unwrap();

        let hits = evaluate_indexed(&ast, &indexes, &store);
        assert_eq!(hits.ones().collect::<Vec<_>>(), vec![4, 8, 12, 16, 20]);
    }

    #[test]
    fn test_conjunction_combines_streams() {
        let (indexes, store) = archive();
        // conn events no later than 10s.
        let query = ParsedQuery::new(tag(TagField::Name, RelOp::Equal, Value::from("conn")))
            .tail(
                LogicalOp::And,
                tag(
                    TagField::Time,
                    RelOp::LessEqual,
                    Value::Stamp(TimeStamp::new(10_000)),
                ),
            );
        let ast = normalize(&query, &Schema::new()).unwrap();

        let hits = evaluate_indexed(&ast, &indexes, &store);
        assert_eq!(
            hits.ones().collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 6, 7, 9, 10]
        );
    }

    #[test]
    fn test_offset_predicate_uses_data_index() {
        let (indexes, store) = archive();
        let query = ParsedQuery::new(ParsedPredicate::Offset {
            event: "conn".into(),
            offset: [1].into(),
            op: RelOp::Greater,
            rhs: ValueExpr::Const(Value::UInt(150)),
        });
        let ast = normalize(&query, &Schema::new()).unwrap();

        let hits = evaluate_indexed(&ast, &indexes, &store);
        // conn events with payload > 150: ids 17, 18, 19 (16 and 20 are dns).
        assert_eq!(hits.ones().collect::<Vec<_>>(), vec![17, 18, 19]);
    }

    #[test]
    fn test_kind_predicate_falls_back_to_events() {
        let (indexes, store) = archive();
        let query = ParsedQuery::new(ParsedPredicate::Kind {
            kind: ValueKind::UInt,
            op: RelOp::Equal,
            rhs: ValueExpr::Const(Value::UInt(70)),
        });
        let ast = normalize(&query, &Schema::new()).unwrap();

        // Only event 7 carries the uint 70 (as i * 10).
        let hits = evaluate_indexed(&ast, &indexes, &store);
        assert_eq!(hits.ones().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_mixed_deferred_and_indexed() {
        let (indexes, store) = archive();
        // Indexed name predicate narrows candidates; the kind predicate
        // re-checks them per event.
        let query = ParsedQuery::new(tag(TagField::Name, RelOp::Equal, Value::from("dns")))
            .tail(
                LogicalOp::And,
                ParsedPredicate::Kind {
                    kind: ValueKind::UInt,
                    op: RelOp::Greater,
                    rhs: ValueExpr::Const(Value::UInt(100)),
                },
            );
        let ast = normalize(&query, &Schema::new()).unwrap();

        // dns events whose payload exceeds 100: ids 12, 16, 20.
        let hits = evaluate_indexed(&ast, &indexes, &store);
        assert_eq!(hits.ones().collect::<Vec<_>>(), vec![12, 16, 20]);
    }

    #[test]
    fn test_id_predicate_is_deferred() {
        let (indexes, store) = archive();
        let query = ParsedQuery::new(tag(TagField::Id, RelOp::LessEqual, Value::UInt(3)));
        let ast = normalize(&query, &Schema::new()).unwrap();

        let hits = evaluate_indexed(&ast, &indexes, &store);
        assert_eq!(hits.ones().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_offset_matches_nothing() {
        let (indexes, store) = archive();
        let query = ParsedQuery::new(ParsedPredicate::Offset {
            event: "conn".into(),
            offset: [9].into(),
            op: RelOp::Equal,
            rhs: ValueExpr::Const(Value::UInt(1)),
        });
        let ast = normalize(&query, &Schema::new()).unwrap();

        let hits = evaluate_indexed(&ast, &indexes, &store);
        assert_eq!(hits.count(), 0);
    }

    #[test]
    fn test_empty_ast_matches_nothing() {
        let (indexes, store) = archive();
        let hits = evaluate_indexed(&Ast::empty(), &indexes, &store);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_lookup_agrees_with_per_event_evaluation() {
        // Property: OR-ing per-event evaluation over all events equals the
        // index-driven result.
        let (indexes, store) = archive();
        let queries = vec![
            ParsedQuery::new(tag(TagField::Name, RelOp::Equal, Value::from("conn"))),
            ParsedQuery::new(tag(TagField::Name, RelOp::NotEqual, Value::from("conn"))),
            ParsedQuery::new(ParsedPredicate::Offset {
                event: "conn".into(),
                offset: [1].into(),
                op: RelOp::LessEqual,
                rhs: ValueExpr::Const(Value::UInt(100)),
            }),
            ParsedQuery::new(tag(
                TagField::Time,
                RelOp::Greater,
                Value::Stamp(TimeStamp::new(15_000)),
            ))
            .tail(
                LogicalOp::Or,
                tag(TagField::Name, RelOp::Equal, Value::from("dns")),
            ),
        ];

        for query in queries {
            let ast = normalize(&query, &Schema::new()).unwrap();
            let indexed = evaluate_indexed(&ast, &indexes, &store);

            let mut scanned = Vec::new();
            for id in 1..=20u64 {
                let event = store.event(EventId::new(id)).unwrap();
                if crate::evaluate(&ast, event).is_true() {
                    scanned.push(id);
                }
            }
            assert_eq!(indexed.ones().collect::<Vec<_>>(), scanned, "query {ast}");
        }
    }
}
