//! Events and their identifiers.

use crate::{Offset, TimeStamp, Value};
use serde::{Deserialize, Serialize};

/// Uniquely identifies an event in the archive.
///
/// Position `i` in any per-event bitstream refers to the event with ID `i`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// The invalid event ID.
    pub const INVALID: EventId = EventId(0);

    /// The smallest possible event ID.
    pub const MIN: EventId = EventId(1);

    /// The largest possible event ID.
    pub const MAX: EventId = EventId(u64::MAX - 1);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self >= Self::MIN && self <= Self::MAX
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single archived event: an ID, a timestamp, a name, and a value tree
/// (typically a record).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: EventId,
    timestamp: TimeStamp,
    name: String,
    data: Value,
}

impl Event {
    pub fn new(
        id: EventId,
        timestamp: TimeStamp,
        name: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id,
            timestamp,
            name: name.into(),
            data,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn timestamp(&self) -> TimeStamp {
        self.timestamp
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The value at the given offset path, if the event data is a record
    /// and the path resolves.
    pub fn at(&self, offset: &Offset) -> Option<&Value> {
        self.data.as_record()?.at(offset)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {} {}", self.name, self.id, self.timestamp, self.data)
    }
}
