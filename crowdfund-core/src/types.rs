//! Core types for the crowdfunding ledger
//!
//! All records are designed for:
//! - Deterministic serialization (bincode)
//! - Exact integer arithmetic (amounts are `u128` base units)
//! - Block-height time, never wall-clock, for deadline decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Amount in the smallest indivisible unit
pub type Amount = u128;

/// Abstract block height
pub type BlockHeight = u64;

/// Sequential campaign identifier
pub type CampaignId = u64;

/// Account identifier (principal, wallet address, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes used in composite storage keys
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Fundraising campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Sequential id, never reused
    pub id: CampaignId,

    /// Creator, the only account allowed to claim and manage the campaign
    pub owner: AccountId,

    /// Funding goal (> 0)
    pub goal: Amount,

    /// Total contributed; only grows
    pub raised: Amount,

    /// Absolute deadline height
    pub deadline: BlockHeight,

    /// Set once, when the owner claims
    pub claimed: bool,

    /// Height at creation
    pub created_at: BlockHeight,
}

impl Campaign {
    /// Goal reached, regardless of deadline or claim status
    pub fn is_successful(&self) -> bool {
        self.raised >= self.goal
    }

    /// Deadline reached at `height`
    pub fn is_expired(&self, height: BlockHeight) -> bool {
        height >= self.deadline
    }

    /// Integer percentage of the goal raised (floor)
    pub fn progress_percent(&self) -> u128 {
        if self.goal == 0 {
            return 0;
        }
        if let Some(scaled) = self.raised.checked_mul(100) {
            return scaled / self.goal;
        }
        (self.raised / self.goal)
            .saturating_mul(100)
            .saturating_add(percent_of_remainder(self.raised % self.goal, self.goal))
    }

    /// Lifecycle phase at `height`
    pub fn status(&self, height: BlockHeight) -> CampaignStatus {
        if self.claimed {
            CampaignStatus::Claimed
        } else if !self.is_expired(height) {
            CampaignStatus::Open
        } else if self.is_successful() {
            CampaignStatus::SuccessfulUnclaimed
        } else {
            CampaignStatus::Failed
        }
    }
}

/// floor(rem × 100 / goal) for `rem < goal`, without overflowing
///
/// With goal = 100q + r, k × goal <= 100 × rem holds exactly when
/// k × q + ceil(k × r / 100) <= rem.
fn percent_of_remainder(rem: u128, goal: u128) -> u128 {
    let (q, r) = (goal / 100, goal % 100);
    (1..100u128)
        .take_while(|k| k * q + (k * r).div_ceil(100) <= rem)
        .last()
        .unwrap_or(0)
}

/// Campaign lifecycle phase (derived, never stored)
///
/// ```text
/// Open ──► SuccessfulUnclaimed ──► Claimed
///   └────► Failed (refunds, one contributor at a time)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Accepting contributions
    Open,
    /// Deadline passed with the goal met; funds await the owner
    SuccessfulUnclaimed,
    /// Funds released to the owner (terminal)
    Claimed,
    /// Deadline passed below goal; contributors may refund
    Failed,
}

/// Cumulative pledge of one contributor to one campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Campaign pledged to
    pub campaign_id: CampaignId,

    /// Contributor account
    pub contributor: AccountId,

    /// Cumulative amount (> 0)
    pub amount: Amount,
}

/// Owner-defined campaign milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Owning campaign
    pub campaign_id: CampaignId,

    /// Sequential per campaign, from 0
    pub index: u64,

    /// Short title
    pub title: String,

    /// Free-form description
    pub description: String,

    /// Amount this milestone targets
    pub target_amount: Amount,

    /// Absolute deadline height
    pub deadline: BlockHeight,

    /// Marked by the owner
    pub completed: bool,
}

/// Progress update posted by the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignUpdate {
    /// Owning campaign
    pub campaign_id: CampaignId,

    /// Sequential per campaign, from 0
    pub index: u64,

    /// Headline
    pub title: String,

    /// Body text
    pub body: String,

    /// Height at which it was posted
    pub posted_at: BlockHeight,
}

/// Per-campaign counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    /// Updates posted
    pub updates_count: u64,

    /// Milestones added
    pub milestones_count: u64,

    /// Distinct contributors ever
    pub contributor_count: u64,

    /// Refunds paid out
    pub refund_count: u64,

    /// Total amount refunded
    pub refunded: Amount,
}

/// Journal entry appended by every successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Position in the journal (sequential)
    pub seq: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Height the operation executed at
    pub height: BlockHeight,

    /// Wall-clock time of recording (informational only)
    pub recorded_at: DateTime<Utc>,

    /// What happened
    pub kind: EventKind,
}

/// Journal event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Campaign created
    CampaignCreated {
        /// New id
        campaign_id: CampaignId,
        /// Creator
        owner: AccountId,
        /// Goal
        goal: Amount,
        /// Absolute deadline
        deadline: BlockHeight,
    },
    /// Contribution accepted
    Contributed {
        /// Campaign
        campaign_id: CampaignId,
        /// Contributor
        contributor: AccountId,
        /// Amount of this call
        amount: Amount,
    },
    /// Funds released to the owner
    FundsClaimed {
        /// Campaign
        campaign_id: CampaignId,
        /// Amount paid to the owner
        net: Amount,
        /// Amount paid to the platform
        fee: Amount,
    },
    /// Contribution returned
    Refunded {
        /// Campaign
        campaign_id: CampaignId,
        /// Contributor
        contributor: AccountId,
        /// Amount returned
        amount: Amount,
    },
    /// Milestone added
    MilestoneAdded {
        /// Campaign
        campaign_id: CampaignId,
        /// Milestone index
        index: u64,
    },
    /// Milestone marked complete
    MilestoneCompleted {
        /// Campaign
        campaign_id: CampaignId,
        /// Milestone index
        index: u64,
    },
    /// Update posted
    UpdatePosted {
        /// Campaign
        campaign_id: CampaignId,
        /// Update index
        index: u64,
    },
    /// Platform fee rate changed
    PlatformFeeUpdated {
        /// New rate
        bps: u32,
    },
    /// Minimum contribution changed
    MinimumContributionUpdated {
        /// New minimum
        amount: Amount,
    },
}

/// A mutating call submitted on behalf of `sender`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Calling account
    pub sender: AccountId,

    /// Operation
    pub call: Call,
}

impl Transaction {
    /// Create new transaction
    pub fn new(sender: impl Into<AccountId>, call: Call) -> Self {
        Self {
            sender: sender.into(),
            call,
        }
    }
}

/// Mutating engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Create a campaign with `goal` and a deadline `deadline_offset` blocks ahead
    CreateCampaign {
        /// Funding goal
        goal: Amount,
        /// Blocks from now
        deadline_offset: u64,
    },
    /// Pledge `amount`
    Contribute {
        /// Campaign
        campaign_id: CampaignId,
        /// Amount
        amount: Amount,
    },
    /// Release funds to the owner
    ClaimFunds {
        /// Campaign
        campaign_id: CampaignId,
    },
    /// Return the caller's pledge
    Refund {
        /// Campaign
        campaign_id: CampaignId,
    },
    /// Add a milestone
    AddMilestone {
        /// Campaign
        campaign_id: CampaignId,
        /// Title
        title: String,
        /// Description
        description: String,
        /// Target amount
        target_amount: Amount,
        /// Blocks from now
        deadline_offset: u64,
    },
    /// Mark a milestone complete
    CompleteMilestone {
        /// Campaign
        campaign_id: CampaignId,
        /// Milestone index
        index: u64,
    },
    /// Post an update
    PostUpdate {
        /// Campaign
        campaign_id: CampaignId,
        /// Title
        title: String,
        /// Body
        body: String,
    },
    /// Change the platform fee rate
    UpdatePlatformFee {
        /// Basis points
        bps: u32,
    },
    /// Change the minimum contribution
    UpdateMinimumContribution {
        /// New minimum
        amount: Amount,
    },
}

/// Successful result of a [`Call`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutput {
    /// Id allocated by `CreateCampaign`
    CampaignId(CampaignId),
    /// Success flag of every other call
    Success(bool),
}
