//! Crowdfund Core
//!
//! Campaign ledger: owners raise funds toward a goal before a block-height
//! deadline; contributors pledge into escrow; successful campaigns pay out
//! to their owner net of a platform fee, failed ones refund contributors.
//!
//! # Architecture
//!
//! - **Engine**: [`CampaignEngine`] validates, moves value through a [`Ledger`], then commits
//! - **Atomic commits**: every operation lands as one storage write, journal event included
//! - **Single Writer**: [`actor`] executes blocks of transactions in order
//! - **Pluggable storage**: in-memory or RocksDB behind [`store::KvStore`]
//!
//! # Invariants
//!
//! - `raised` only grows, and equals the sum of every accepted contribution
//! - A campaign is claimed at most once, only after its deadline and only at or above goal
//! - A contributor is refunded at most once, only from a failed campaign
//! - No store mutation survives a failed transfer

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fee;
pub mod ledger;
pub mod metrics;
pub mod store;
pub mod types;

// Re-exports
pub use actor::{spawn_engine_actor, EngineHandle};
pub use clock::{Clock, ManualClock};
pub use config::Config;
pub use engine::CampaignEngine;
pub use error::{Error, ErrorCode, Result, TransferError};
pub use fee::FeePolicy;
pub use ledger::{InMemoryLedger, Ledger, Transfer};
pub use types::{
    AccountId, Amount, BlockHeight, Call, CallOutput, Campaign, CampaignId, CampaignStats,
    CampaignStatus, CampaignUpdate, Contribution, EngineEvent, EventKind, Milestone, Transaction,
};
