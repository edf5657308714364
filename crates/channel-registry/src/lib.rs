//! Channel registry: canonical records for YouTube channels, identifier
//! resolution, manual-field protection and TTL-gated metadata refresh.
//!
//! The store is an explicit object: open it once with
//! [`ChannelRegistry::open`], wrap it in an `Arc`, and hand it to the
//! [`ChannelRefreshService`] and [`ChannelRegistryManager`].

pub mod changes;
pub mod error;
pub mod identity;
pub mod manager;
pub mod memory;
pub mod normalize;
pub mod refresh;
pub mod source;
pub mod store;
pub mod types;

pub use {
    changes::{ChannelChanges, EDITABLE_FIELDS},
    error::{Error, Result},
    manager::ChannelRegistryManager,
    memory::{BestEffortMemory, ChannelFact, ChannelMemory},
    normalize::{dedupe_aliases, normalize_handle},
    refresh::ChannelRefreshService,
    source::{ChannelLookup, ChannelPayload, MetadataSource},
    store::ChannelRegistry,
    types::{ChannelMetadata, ChannelRecord, ChannelSummary},
};
