//! Value model, events, and schema for the event archive.
//!
//! This crate provides:
//! - A tagged variant over the domain's value types
//! - Network scalars (addresses, subnets, ports) and regex patterns
//! - Events and their identifiers
//! - Typed record schemas with name-path resolution

pub use event_common::{TimeSpan, TimeStamp};

pub mod error;
pub use error::{CoreError, Result};

pub mod address;
pub use address::Address;

pub mod subnet;
pub use subnet::Subnet;

pub mod port;
pub use port::{Port, Proto};

pub mod pattern;
pub use pattern::Pattern;

pub mod offset;
pub use offset::Offset;

pub mod value;
pub use value::{Record, Value, ValueKind};

pub mod ops;
pub use ops::RelOp;

pub mod event;
pub use event::{Event, EventId};

pub mod schema;
pub use schema::{EventDecl, Field, Schema, Type};
