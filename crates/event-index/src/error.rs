use event_core::{RelOp, ValueKind};
use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The operator is not supported by this index type
    #[error("unsupported operator {op} for {kind} index")]
    UnsupportedOperator { kind: ValueKind, op: RelOp },

    /// No index encoding exists for this value kind
    #[error("no index for values of kind {0}")]
    UnsupportedKind(ValueKind),

    /// The value's discriminant does not match the index
    #[error("value kind mismatch: index holds {expected}, got {actual}")]
    ValueKindMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Event IDs must be appended in increasing order
    #[error("event id {id} precedes index size {size}")]
    IdRegression { id: u64, size: u64 },

    /// A serialized bitstream carried an unknown encoding tag
    #[error("unknown bitstream encoding tag {0}")]
    UnknownEncoding(u8),

    /// A serialized index image failed structural validation
    #[error("corrupt index image")]
    CorruptImage,

    /// Underlying I/O error during flush or load
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

static_assertions::const_assert!(std::mem::size_of::<IndexError>() <= 32);

pub type Result<T> = std::result::Result<T, IndexError>;
