//! Channel fact memory: an append-only JSONL log of facts recorded after
//! metadata refreshes, with per-channel recall.

pub mod store;

pub use store::{JsonlChannelMemory, StoredFact};
