use thiserror::Error;

/// Errors produced while normalizing or evaluating queries.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The parsed query had no usable predicate
    #[error("empty query")]
    EmptyQuery,

    /// A schema name path resolved to nothing
    #[error("no schema offsets for name path {0}")]
    SchemaResolution(String),

    /// Offsets of a schema predicate resolved to incompatible types
    #[error("type clash: {lhs} <> {rhs}")]
    TypeClash { lhs: String, rhs: String },

    /// A value expression could not be constant-folded
    #[error("cannot fold value expression: {0}")]
    Fold(String),

    /// A pattern failed to compile during rewriting
    #[error(transparent)]
    Core(#[from] event_core::CoreError),

    /// Underlying index error
    #[error("index error: {0}")]
    Index(#[from] event_index::IndexError),

    /// I/O error while persisting or loading indexes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

static_assertions::const_assert!(std::mem::size_of::<EngineError>() <= 64);

impl EngineError {
    /// The process exit code a host driving the core should use for this
    /// error: 1 for configuration problems, 2 for I/O failures during
    /// persistence, 3 for queries rejected by normalization.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::EmptyQuery
            | EngineError::SchemaResolution(_)
            | EngineError::TypeClash { .. }
            | EngineError::Fold(_)
            | EngineError::Core(_) => 3,
            EngineError::Io(_) => 2,
            EngineError::Index(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
