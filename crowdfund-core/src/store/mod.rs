//! Storage layer
//!
//! # Columns
//!
//! - `meta` - Next campaign id, fee policy, administrator
//! - `campaigns` - Campaign records (key: campaign_id)
//! - `stats` - Per-campaign counters (key: campaign_id)
//! - `contributions` - Pledges (key: campaign_id || contributor)
//! - `milestones` - Milestones (key: campaign_id || index)
//! - `updates` - Progress updates (key: campaign_id || index)
//! - `events` - Append-only journal (key: seq)
//!
//! Typed stores only read through [`KvStore`] and stage writes into a
//! [`WriteSet`]. The engine commits one `WriteSet` per operation, so every
//! operation lands atomically or not at all.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

mod campaigns;
mod contributions;
mod events;
mod memory;
mod milestones;
mod rocks;

pub use campaigns::CampaignStore;
pub use contributions::ContributionStore;
pub use events::EventJournal;
pub use memory::MemoryStore;
pub use milestones::{MilestoneStore, UpdateStore};
pub use rocks::RocksStore;

/// Logical key space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Singletons
    Meta,
    /// Campaign records
    Campaigns,
    /// Campaign statistics
    Stats,
    /// Contribution records
    Contributions,
    /// Milestone records
    Milestones,
    /// Update records
    Updates,
    /// Event journal
    Events,
}

impl Column {
    /// Every column, in creation order
    pub const ALL: [Column; 7] = [
        Column::Meta,
        Column::Campaigns,
        Column::Stats,
        Column::Contributions,
        Column::Milestones,
        Column::Updates,
        Column::Events,
    ];

    /// Column family name
    pub fn name(self) -> &'static str {
        match self {
            Column::Meta => "meta",
            Column::Campaigns => "campaigns",
            Column::Stats => "stats",
            Column::Contributions => "contributions",
            Column::Milestones => "milestones",
            Column::Updates => "updates",
            Column::Events => "events",
        }
    }
}

/// Staged mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite
    Put {
        /// Column
        column: Column,
        /// Key
        key: Vec<u8>,
        /// Encoded value
        value: Vec<u8>,
    },
    /// Remove
    Delete {
        /// Column
        column: Column,
        /// Key
        key: Vec<u8>,
    },
}

/// Ordered set of mutations committed atomically
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    /// Create empty write set
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an encoded record
    pub fn put<T: Serialize>(&mut self, column: Column, key: Vec<u8>, value: &T) -> Result<()> {
        let value = bincode::serialize(value)?;
        self.ops.push(WriteOp::Put { column, key, value });
        Ok(())
    }

    /// Stage a removal
    pub fn delete(&mut self, column: Column, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { column, key });
    }

    /// Staged operations
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of staged operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume into operations
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Ordered key-value store with atomic batch writes
pub trait KvStore: Send + Sync {
    /// Read one value
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Greatest key in the column
    fn last_key(&self, column: Column) -> Result<Option<Vec<u8>>>;

    /// Apply every operation or none
    fn write(&self, batch: WriteSet) -> Result<()>;
}

/// Read and decode one record
pub(crate) fn get_decoded<T: DeserializeOwned>(
    kv: &dyn KvStore,
    column: Column,
    key: &[u8],
) -> Result<Option<T>> {
    match kv.get(column, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

/// Big-endian id key (keeps numeric order under byte order)
pub(crate) fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// campaign_id || index
pub(crate) fn indexed_key(campaign_id: u64, index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&campaign_id.to_be_bytes());
    key.extend_from_slice(&index.to_be_bytes());
    key
}
