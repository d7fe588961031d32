//! Compressed bitstreams and typed bitmap indexes for the event archive.
//!
//! This crate provides:
//! - A packed bitvector over machine words
//! - Bitstreams in two encodings (uncompressed and EWAH-compressed) behind a
//!   common trait, with block-wise bitwise operations
//! - Typed bitmap indexes mapping values to event-ID bitstreams
//! - Single-writer indexer workers with checkpointed persistence

pub mod error;
pub use error::{IndexError, Result};

pub mod bitvector;
pub use bitvector::Bitvector;

pub mod bitstream;
pub use bitstream::{BitSequence, Bitstream, Encoding, SequenceKind};

pub mod null;
pub use null::NullBitstream;

pub mod ewah;
pub use ewah::EwahBitstream;

pub mod ops;

pub mod bitmap_index;
pub use bitmap_index::ValueIndex;

pub mod indexer;
pub use indexer::{EventIndexer, IndexAspect, IndexerWorker};

pub(crate) mod wire;
