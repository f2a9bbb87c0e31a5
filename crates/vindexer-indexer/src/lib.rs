//! The vote indexing pipeline: wire decoding and the poll loop driving it.

pub mod decoder;
pub mod scheduler;

pub use decoder::{DecodeError, Decoded, MessageDecoder, VoteMessage};
pub use scheduler::{CycleReport, IndexerState, IndexerStatus, VoteIndexer};
