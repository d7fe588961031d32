//! Indexer workers: single-writer owners of one bitmap index each.
//!
//! An [`EventIndexer`] pairs a [`ValueIndex`] with the aspect of an event
//! it indexes (the event name, the timestamp, or a record field at a fixed
//! offset). All mutation happens through its owner; queries observe a
//! consistent snapshot because the interface is synchronous.
//!
//! [`IndexerWorker`] wraps an indexer in a thread with a request channel
//! for deployments that parallelize across indexes.

use crate::{EwahBitstream, Result, ValueIndex};
use event_core::{Event, Offset, RelOp, Value, ValueKind};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// Which aspect of an event an indexer extracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAspect {
    /// The event name.
    Name,
    /// The event timestamp.
    Timestamp,
    /// The record field at `offset`, for events named `event`.
    Data { event: String, offset: Offset },
}

impl std::fmt::Display for IndexAspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexAspect::Name => write!(f, "&name"),
            IndexAspect::Timestamp => write!(f, "&time"),
            IndexAspect::Data { event, offset } => write!(f, "{event}@{offset}"),
        }
    }
}

/// Indexes one aspect of events with a single bitmap index.
#[derive(Debug, Clone)]
pub struct EventIndexer {
    aspect: IndexAspect,
    index: ValueIndex,
    last_flush: u64,
}

impl EventIndexer {
    fn with_index(aspect: IndexAspect, index: ValueIndex) -> Self {
        let last_flush = index.size();
        Self {
            aspect,
            index,
            last_flush,
        }
    }

    /// An indexer over event names.
    pub fn name() -> Self {
        let index =
            ValueIndex::for_kind(ValueKind::String).expect("string indexes always exist");
        Self::with_index(IndexAspect::Name, index)
    }

    /// An indexer over event timestamps.
    pub fn time() -> Self {
        let index =
            ValueIndex::for_kind(ValueKind::TimeStamp).expect("time indexes always exist");
        Self::with_index(IndexAspect::Timestamp, index)
    }

    /// An indexer over the record field at `offset` of events named
    /// `event`, holding values of the given kind.
    pub fn data(event: impl Into<String>, offset: Offset, kind: ValueKind) -> Result<Self> {
        let index = ValueIndex::for_kind(kind)?;
        Ok(Self::with_index(
            IndexAspect::Data {
                event: event.into(),
                offset,
            },
            index,
        ))
    }

    pub fn aspect(&self) -> &IndexAspect {
        &self.aspect
    }

    pub fn index(&self) -> &ValueIndex {
        &self.index
    }

    pub fn size(&self) -> u64 {
        self.index.size()
    }

    /// Pull the indexed aspect out of an event.
    fn extract(&self, event: &Event) -> Option<Value> {
        match &self.aspect {
            IndexAspect::Name => Some(Value::Str(event.name().to_string())),
            IndexAspect::Timestamp => Some(Value::Stamp(event.timestamp())),
            IndexAspect::Data {
                event: name,
                offset,
            } => {
                if event.name() == name {
                    event.at(offset).cloned()
                } else {
                    None
                }
            }
        }
    }

    /// Index a batch of events. Returns how many events contributed a
    /// value; events without the indexed aspect are skipped.
    pub fn push_back_batch(&mut self, events: &[Event]) -> usize {
        let mut indexed = 0;
        for event in events {
            let Some(value) = self.extract(event) else {
                continue;
            };
            match self.index.push_back(&value, event.id()) {
                Ok(()) => indexed += 1,
                Err(err) => {
                    warn!("failed to index event {} under {}: {}", event.id(), self.aspect, err);
                }
            }
        }
        indexed
    }

    /// Look up the event-ID bitstream for `op value`. Failures degrade to
    /// an empty bitstream and are logged, never propagated.
    pub fn lookup(&self, op: RelOp, value: &Value) -> EwahBitstream {
        match self.index.lookup(op, value) {
            Ok(stream) => stream,
            Err(err) => {
                error!("lookup {} {} on {} failed: {}", op, value, self.aspect, err);
                EwahBitstream::default()
            }
        }
    }

    /// Flush the index to a byte sink when bits were appended since the
    /// last flush. The image is `(flushed_size, index)`.
    pub fn flush(&mut self, sink: &mut impl Write) -> Result<bool> {
        if self.index.size() == self.last_flush {
            return Ok(false);
        }
        let previous = self.last_flush;
        self.last_flush = self.index.size();
        crate::wire::put_u64(sink, self.last_flush)?;
        self.index.write_to(sink)?;
        self.index.checkpoint();
        debug!(
            "flushed {} ({}/{} new/total bits)",
            self.aspect,
            self.last_flush.saturating_sub(previous),
            self.last_flush
        );
        Ok(true)
    }

    /// Restore index state from a byte source written by
    /// [`EventIndexer::flush`]. The in-memory state is replaced.
    pub fn load(&mut self, source: &mut impl Read) -> Result<()> {
        let last_flush = crate::wire::get_u64(source)?;
        let index = ValueIndex::read_from(source)?;
        if index.kind() != self.index.kind() {
            return Err(crate::IndexError::CorruptImage);
        }
        self.last_flush = last_flush;
        self.index = index;
        debug!("loaded {} ({} bits)", self.aspect, self.index.size());
        Ok(())
    }

    /// Flush to a file, creating it on first use.
    pub fn flush_to_path(&mut self, path: &Path) -> Result<bool> {
        if self.index.size() == self.last_flush {
            return Ok(false);
        }
        let mut file = std::fs::File::create(path)?;
        self.flush(&mut file)
    }

    /// Load from a file previously written by
    /// [`EventIndexer::flush_to_path`].
    pub fn load_from_path(&mut self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::open(path)?;
        self.load(&mut file)
    }
}

/// Requests processed by an [`IndexerWorker`].
pub enum IndexerRequest {
    /// Index a batch of events.
    Batch(Vec<Event>),
    /// Evaluate a predicate and reply with the resulting bitstream.
    Lookup {
        op: RelOp,
        value: Value,
        reply: Sender<EwahBitstream>,
    },
    /// Flush to the worker's file, replying whether anything was written.
    Flush { reply: Sender<Result<bool>> },
    /// Stop the worker.
    Shutdown,
}

/// A thread owning one indexer, fed through a request channel.
///
/// Parallelism in the archive is across indexes, never within one: each
/// index has exactly one such owner, so lookups observe no partial appends.
pub struct IndexerWorker {
    tx: Sender<IndexerRequest>,
    handle: JoinHandle<EventIndexer>,
}

impl IndexerWorker {
    /// Spawn a worker around an indexer. When `path` is given, flush
    /// requests persist there and existing state is loaded from it first.
    pub fn spawn(mut indexer: EventIndexer, path: Option<PathBuf>) -> Self {
        let (tx, rx) = channel();
        let handle = std::thread::spawn(move || {
            if let Some(path) = path.as_deref() {
                if path.exists() {
                    if let Err(err) = indexer.load_from_path(path) {
                        error!("failed to load index state from {}: {}", path.display(), err);
                    }
                }
            }
            run_worker(indexer, rx, path)
        });
        Self { tx, handle }
    }

    /// Enqueue a batch of events.
    pub fn batch(&self, events: Vec<Event>) {
        let _ = self.tx.send(IndexerRequest::Batch(events));
    }

    /// Evaluate a predicate against the index, waiting for the reply.
    pub fn lookup(&self, op: RelOp, value: Value) -> EwahBitstream {
        let (reply, rx) = channel();
        if self.tx.send(IndexerRequest::Lookup { op, value, reply }).is_err() {
            return EwahBitstream::default();
        }
        rx.recv().unwrap_or_default()
    }

    /// Request a flush, waiting for the result.
    pub fn flush(&self) -> Result<bool> {
        let (reply, rx) = channel();
        if self.tx.send(IndexerRequest::Flush { reply }).is_err() {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        rx.recv().unwrap_or(Ok(false))
    }

    /// Stop the worker and take back the indexer.
    pub fn shutdown(self) -> EventIndexer {
        let _ = self.tx.send(IndexerRequest::Shutdown);
        self.handle.join().expect("indexer worker panicked")
    }
}

fn run_worker(
    mut indexer: EventIndexer,
    rx: Receiver<IndexerRequest>,
    path: Option<PathBuf>,
) -> EventIndexer {
    loop {
        let request = match rx.recv() {
            Ok(request) => request,
            Err(_) => break,
        };
        match request {
            IndexerRequest::Batch(events) => {
                indexer.push_back_batch(&events);
            }
            IndexerRequest::Lookup { op, value, reply } => {
                let _ = reply.send(indexer.lookup(op, &value));
            }
            IndexerRequest::Flush { reply } => {
                let result = match path.as_deref() {
                    Some(path) => indexer.flush_to_path(path),
                    None => Ok(false),
                };
                let _ = reply.send(result);
            }
            IndexerRequest::Shutdown => break,
        }
    }
    indexer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::Bitstream;
    use event_core::{record, EventId, TimeStamp};

    fn sample_events() -> Vec<Event> {
        vec![
            Event::new(
                EventId::new(1),
                TimeStamp::new(1_000),
                "conn",
                record!["syn", 80u64],
            ),
            Event::new(
                EventId::new(2),
                TimeStamp::new(2_000),
                "dns",
                record!["query", 53u64],
            ),
            Event::new(
                EventId::new(3),
                TimeStamp::new(3_000),
                "conn",
                record!["fin", 443u64],
            ),
        ]
    }

    #[test]
    fn test_name_indexer() {
        let mut indexer = EventIndexer::name();
        assert_eq!(indexer.push_back_batch(&sample_events()), 3);
        assert_eq!(indexer.size(), 4);

        let conns = indexer.lookup(RelOp::Equal, &Value::from("conn"));
        assert_eq!(conns.ones().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_time_indexer() {
        let mut indexer = EventIndexer::time();
        indexer.push_back_batch(&sample_events());

        let early = indexer.lookup(
            RelOp::LessEqual,
            &Value::Stamp(TimeStamp::new(2_000)),
        );
        assert_eq!(early.ones().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_data_indexer_skips_other_events() {
        let mut indexer =
            EventIndexer::data("conn", [1].into(), ValueKind::UInt).unwrap();
        assert_eq!(indexer.push_back_batch(&sample_events()), 2);

        let http = indexer.lookup(RelOp::Equal, &Value::UInt(80));
        assert_eq!(http.ones().collect::<Vec<_>>(), vec![1]);
        // The dns event was never indexed.
        assert!(!http.get(2));
    }

    #[test]
    fn test_lookup_degrades_to_empty() {
        let mut indexer = EventIndexer::name();
        indexer.push_back_batch(&sample_events());

        // Wrong value kind: empty stream, no panic.
        let result = indexer.lookup(RelOp::Equal, &Value::UInt(1));
        assert!(result.is_empty());

        // Unsupported operator likewise.
        let result = indexer.lookup(RelOp::Less, &Value::from("conn"));
        assert!(result.is_empty());
    }

    #[test]
    fn test_flush_and_load() {
        let mut indexer = EventIndexer::name();
        indexer.push_back_batch(&sample_events());

        let mut image = Vec::new();
        assert!(indexer.flush(&mut image).unwrap());
        // Nothing new: flush is a no-op.
        let mut empty = Vec::new();
        assert!(!indexer.flush(&mut empty).unwrap());
        assert!(empty.is_empty());

        let mut restored = EventIndexer::name();
        restored.load(&mut image.as_slice()).unwrap();
        assert_eq!(restored.size(), indexer.size());
        let conns = restored.lookup(RelOp::Equal, &Value::from("conn"));
        assert_eq!(conns.ones().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_worker_round_trip() {
        let worker = IndexerWorker::spawn(EventIndexer::name(), None);
        worker.batch(sample_events());

        let conns = worker.lookup(RelOp::Equal, Value::from("conn"));
        assert_eq!(conns.ones().collect::<Vec<_>>(), vec![1, 3]);

        let indexer = worker.shutdown();
        assert_eq!(indexer.size(), 4);
    }
}
