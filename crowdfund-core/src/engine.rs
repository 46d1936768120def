//! Campaign engine
//!
//! Orchestrates every mutating operation and read-only query of the
//! crowdfunding ledger.
//!
//! # Transaction boundary
//!
//! Each mutation follows the same shape:
//!
//! 1. Sample the clock once
//! 2. Validate (authorization, phase, amounts) without touching the ledger
//! 3. Move value through the [`Ledger`] (all legs or none)
//! 4. Commit every record change plus one journal event in a single [`WriteSet`]
//!
//! If step 4 fails after value moved, the transfers are reversed before the
//! storage error is returned, leaving both the ledger and the stores as they
//! were.
//!
//! Campaign-scoped mutations serialize on a per-campaign mutex, so two
//! contributions never lose an increment and two claims can never both
//! observe `claimed == false`.

use crate::clock::Clock;
use crate::config::{AccountsConfig, Config, StorageBackend};
use crate::error::{Error, Result};
use crate::fee::{validate_fee_bps, FeePolicy};
use crate::ledger::{Ledger, Transfer};
use crate::metrics::Metrics;
use crate::store::{
    CampaignStore, ContributionStore, EventJournal, KvStore, MemoryStore, MilestoneStore,
    RocksStore, UpdateStore, WriteSet,
};
use crate::types::{
    AccountId, Amount, BlockHeight, Call, CallOutput, Campaign, CampaignId, CampaignStats,
    CampaignStatus, CampaignUpdate, Contribution, EngineEvent, EventKind, Milestone, Transaction,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// Crowdfunding state machine
pub struct CampaignEngine {
    campaigns: CampaignStore,
    contributions: ContributionStore,
    milestones: MilestoneStore,
    updates: UpdateStore,
    journal: EventJournal,

    clock: Arc<dyn Clock>,
    ledger: Arc<dyn Ledger>,

    administrator: AccountId,
    platform: AccountId,
    escrow: AccountId,

    policy: RwLock<FeePolicy>,

    /// Serializes campaign id allocation
    id_lock: Mutex<()>,

    /// One mutex per campaign touched so far
    campaign_locks: DashMap<CampaignId, Arc<Mutex<()>>>,

    metrics: Metrics,
}

impl std::fmt::Debug for CampaignEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignEngine")
            .field("administrator", &self.administrator)
            .field("platform", &self.platform)
            .field("escrow", &self.escrow)
            .field("policy", &*self.policy.read())
            .finish_non_exhaustive()
    }
}

impl CampaignEngine {
    /// Open the engine on the backend selected by `config`
    pub fn open(config: &Config, clock: Arc<dyn Clock>, ledger: Arc<dyn Ledger>) -> Result<Self> {
        config.validate()?;

        let kv: Arc<dyn KvStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::RocksDb => {
                Arc::new(RocksStore::open(&config.data_dir, &config.storage.rocksdb)?)
            }
        };

        tracing::info!(
            service = %config.service_name,
            backend = ?config.storage.backend,
            data_dir = %config.data_dir.display(),
            "Opening campaign engine"
        );

        Self::new(kv, clock, ledger, &config.accounts, config.fees.to_policy()?)
    }

    /// Create engine over an existing store
    ///
    /// On first start `accounts.administrator` and `initial_policy` are
    /// persisted. On later starts the persisted values win.
    pub fn new(
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn Ledger>,
        accounts: &AccountsConfig,
        initial_policy: FeePolicy,
    ) -> Result<Self> {
        let campaigns = CampaignStore::new(kv.clone());
        let journal = EventJournal::open(kv.clone())?;

        let mut batch = WriteSet::new();

        let administrator = match campaigns.administrator()? {
            Some(persisted) => {
                if persisted != accounts.administrator {
                    tracing::warn!(
                        persisted = %persisted,
                        configured = %accounts.administrator,
                        "Ignoring configured administrator, using persisted one"
                    );
                }
                persisted
            }
            None => {
                campaigns.stage_administrator(&mut batch, &accounts.administrator)?;
                accounts.administrator.clone()
            }
        };

        validate_fee_bps(initial_policy.platform_fee_bps)?;
        let policy = match campaigns.fee_policy()? {
            Some(persisted) => {
                validate_fee_bps(persisted.platform_fee_bps)?;
                if persisted != initial_policy {
                    tracing::warn!(
                        persisted_bps = persisted.platform_fee_bps,
                        configured_bps = initial_policy.platform_fee_bps,
                        "Ignoring configured fee policy, using persisted one"
                    );
                }
                persisted
            }
            None => {
                campaigns.stage_fee_policy(&mut batch, &initial_policy)?;
                initial_policy
            }
        };

        if !batch.is_empty() {
            kv.write(batch)?;
        }

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            contributions: ContributionStore::new(kv.clone()),
            milestones: MilestoneStore::new(kv.clone()),
            updates: UpdateStore::new(kv),
            campaigns,
            journal,
            clock,
            ledger,
            administrator,
            platform: accounts.platform.clone(),
            escrow: accounts.escrow.clone(),
            policy: RwLock::new(policy),
            id_lock: Mutex::new(()),
            campaign_locks: DashMap::new(),
            metrics,
        })
    }

    // ===== Mutations =====

    /// Create a campaign ending `deadline_offset` blocks from now
    pub fn create_campaign(
        &self,
        caller: &AccountId,
        goal: Amount,
        deadline_offset: u64,
    ) -> Result<CampaignId> {
        self.observe("create_campaign", caller, || {
            let height = self.clock.current_height();

            if goal == 0 {
                return Err(Error::InvalidAmount("Goal must be positive".to_string()));
            }
            if deadline_offset == 0 {
                return Err(Error::DeadlinePassed {
                    deadline: height,
                    height,
                });
            }
            let deadline = height
                .checked_add(deadline_offset)
                .ok_or_else(|| Error::InvalidAmount("Deadline offset overflows".to_string()))?;

            let _guard = self.id_lock.lock();
            let id = self.campaigns.next_id()?;
            let next = id
                .checked_add(1)
                .ok_or_else(|| Error::Storage("Campaign id space exhausted".to_string()))?;

            let campaign = Campaign {
                id,
                owner: caller.clone(),
                goal,
                raised: 0,
                deadline,
                claimed: false,
                created_at: height,
            };

            let mut batch = WriteSet::new();
            self.campaigns.stage_campaign(&mut batch, &campaign)?;
            self.campaigns
                .stage_stats(&mut batch, id, &CampaignStats::default())?;
            self.campaigns.stage_next_id(&mut batch, next)?;
            self.commit(
                batch,
                height,
                EventKind::CampaignCreated {
                    campaign_id: id,
                    owner: caller.clone(),
                    goal,
                    deadline,
                },
                &[],
            )?;

            self.metrics.campaigns_created.inc();
            tracing::info!(
                campaign_id = id,
                caller = %caller,
                goal = %goal,
                deadline,
                height,
                "Campaign created"
            );

            Ok(id)
        })
    }

    /// Pledge `amount` from `caller`, moving it into escrow
    pub fn contribute(&self, caller: &AccountId, campaign_id: CampaignId, amount: Amount) -> Result<bool> {
        self.observe("contribute", caller, || {
            let height = self.clock.current_height();
            let lock = self.campaign_lock(campaign_id)?;
            let _guard = lock.lock();

            let mut campaign = self.load_campaign(campaign_id)?;
            if campaign.is_expired(height) {
                return Err(Error::DeadlinePassed {
                    deadline: campaign.deadline,
                    height,
                });
            }

            let policy = *self.policy.read();
            policy.check_contribution(amount)?;

            let existing = self.contributions.get(campaign_id, caller)?;
            let pledged = existing
                .as_ref()
                .map_or(0, |c| c.amount)
                .checked_add(amount)
                .ok_or_else(|| Error::InvalidAmount("Contribution overflows".to_string()))?;
            campaign.raised = campaign
                .raised
                .checked_add(amount)
                .ok_or_else(|| Error::InvalidAmount("Campaign total overflows".to_string()))?;

            let sent = self.settle(vec![Transfer::new(
                caller.clone(),
                self.escrow.clone(),
                amount,
            )])?;

            let mut batch = WriteSet::new();
            self.campaigns.stage_campaign(&mut batch, &campaign)?;
            self.contributions.stage_put(
                &mut batch,
                &Contribution {
                    campaign_id,
                    contributor: caller.clone(),
                    amount: pledged,
                },
            )?;
            if existing.is_none() {
                let mut stats = self.load_stats(campaign_id)?;
                stats.contributor_count += 1;
                self.campaigns.stage_stats(&mut batch, campaign_id, &stats)?;
            }
            self.commit(
                batch,
                height,
                EventKind::Contributed {
                    campaign_id,
                    contributor: caller.clone(),
                    amount,
                },
                &sent,
            )?;

            self.metrics.contributions.inc();
            tracing::info!(
                campaign_id,
                caller = %caller,
                amount = %amount,
                raised = %campaign.raised,
                height,
                "Contribution accepted"
            );

            Ok(true)
        })
    }

    /// Release a successful campaign's funds to its owner, net of the platform fee
    pub fn claim_funds(&self, caller: &AccountId, campaign_id: CampaignId) -> Result<bool> {
        self.observe("claim_funds", caller, || {
            let height = self.clock.current_height();
            let lock = self.campaign_lock(campaign_id)?;
            let _guard = lock.lock();

            let mut campaign = self.load_campaign(campaign_id)?;
            if campaign.owner != *caller {
                return Err(Error::OwnerOnly(format!(
                    "{} does not own campaign {}",
                    caller, campaign_id
                )));
            }
            if !campaign.is_expired(height) {
                return Err(Error::DeadlineNotPassed {
                    deadline: campaign.deadline,
                    height,
                });
            }
            if !campaign.is_successful() {
                return Err(Error::GoalNotReached {
                    raised: campaign.raised,
                    goal: campaign.goal,
                });
            }
            if campaign.claimed {
                return Err(Error::AlreadyClaimed(campaign_id));
            }

            let (net, fee) = self.policy.read().split(campaign.raised)?;
            let sent = self.settle(vec![
                Transfer::new(self.escrow.clone(), campaign.owner.clone(), net),
                Transfer::new(self.escrow.clone(), self.platform.clone(), fee),
            ])?;

            campaign.claimed = true;

            let mut batch = WriteSet::new();
            self.campaigns.stage_campaign(&mut batch, &campaign)?;
            self.commit(
                batch,
                height,
                EventKind::FundsClaimed {
                    campaign_id,
                    net,
                    fee,
                },
                &sent,
            )?;

            self.metrics.claims.inc();
            tracing::info!(
                campaign_id,
                caller = %caller,
                net = %net,
                fee = %fee,
                height,
                "Funds claimed"
            );

            Ok(true)
        })
    }

    /// Return the caller's pledge from a failed campaign and retire the record
    pub fn refund(&self, caller: &AccountId, campaign_id: CampaignId) -> Result<bool> {
        self.observe("refund", caller, || {
            let height = self.clock.current_height();
            let lock = self.campaign_lock(campaign_id)?;
            let _guard = lock.lock();

            let campaign = self.load_campaign(campaign_id)?;
            let contribution = self.contributions.get(campaign_id, caller)?.ok_or_else(|| {
                Error::NotFound(format!(
                    "No contribution from {} to campaign {}",
                    caller, campaign_id
                ))
            })?;
            if !campaign.is_expired(height) {
                return Err(Error::DeadlineNotPassed {
                    deadline: campaign.deadline,
                    height,
                });
            }
            if campaign.is_successful() {
                return Err(Error::CampaignSuccessful(campaign_id));
            }
            if campaign.claimed {
                return Err(Error::AlreadyClaimed(campaign_id));
            }

            let sent = self.settle(vec![Transfer::new(
                self.escrow.clone(),
                caller.clone(),
                contribution.amount,
            )])?;

            let mut stats = self.load_stats(campaign_id)?;
            stats.refund_count += 1;
            stats.refunded = stats.refunded.saturating_add(contribution.amount);

            let mut batch = WriteSet::new();
            self.contributions
                .stage_delete(&mut batch, campaign_id, caller);
            self.campaigns.stage_stats(&mut batch, campaign_id, &stats)?;
            self.commit(
                batch,
                height,
                EventKind::Refunded {
                    campaign_id,
                    contributor: caller.clone(),
                    amount: contribution.amount,
                },
                &sent,
            )?;

            self.metrics.refunds.inc();
            tracing::info!(
                campaign_id,
                caller = %caller,
                amount = %contribution.amount,
                height,
                "Contribution refunded"
            );

            Ok(true)
        })
    }

    /// Append a milestone to an owned campaign
    pub fn add_campaign_milestone(
        &self,
        caller: &AccountId,
        campaign_id: CampaignId,
        title: String,
        description: String,
        target_amount: Amount,
        deadline_offset: u64,
    ) -> Result<bool> {
        self.observe("add_campaign_milestone", caller, || {
            let height = self.clock.current_height();
            let lock = self.campaign_lock(campaign_id)?;
            let _guard = lock.lock();

            let campaign = self.load_campaign(campaign_id)?;
            Self::ensure_owner(&campaign, caller)?;

            if target_amount == 0 {
                return Err(Error::InvalidAmount(
                    "Milestone target must be positive".to_string(),
                ));
            }
            let deadline = height
                .checked_add(deadline_offset)
                .ok_or_else(|| Error::InvalidAmount("Deadline offset overflows".to_string()))?;

            let mut stats = self.load_stats(campaign_id)?;
            let index = stats.milestones_count;
            stats.milestones_count += 1;

            let mut batch = WriteSet::new();
            self.milestones.stage_put(
                &mut batch,
                &Milestone {
                    campaign_id,
                    index,
                    title,
                    description,
                    target_amount,
                    deadline,
                    completed: false,
                },
            )?;
            self.campaigns.stage_stats(&mut batch, campaign_id, &stats)?;
            self.commit(
                batch,
                height,
                EventKind::MilestoneAdded { campaign_id, index },
                &[],
            )?;

            tracing::info!(campaign_id, index, caller = %caller, height, "Milestone added");
            Ok(true)
        })
    }

    /// Mark a milestone complete; completing twice is a no-op
    pub fn complete_campaign_milestone(
        &self,
        caller: &AccountId,
        campaign_id: CampaignId,
        index: u64,
    ) -> Result<bool> {
        self.observe("complete_campaign_milestone", caller, || {
            let height = self.clock.current_height();
            let lock = self.campaign_lock(campaign_id)?;
            let _guard = lock.lock();

            let campaign = self.load_campaign(campaign_id)?;
            Self::ensure_owner(&campaign, caller)?;

            let mut milestone = self.milestones.get(campaign_id, index)?.ok_or_else(|| {
                Error::NotFound(format!("Milestone {} of campaign {}", index, campaign_id))
            })?;
            if milestone.completed {
                return Ok(true);
            }
            milestone.completed = true;

            let mut batch = WriteSet::new();
            self.milestones.stage_put(&mut batch, &milestone)?;
            self.commit(
                batch,
                height,
                EventKind::MilestoneCompleted { campaign_id, index },
                &[],
            )?;

            tracing::info!(campaign_id, index, caller = %caller, height, "Milestone completed");
            Ok(true)
        })
    }

    /// Post a progress update to an owned campaign
    pub fn post_campaign_update(
        &self,
        caller: &AccountId,
        campaign_id: CampaignId,
        title: String,
        body: String,
    ) -> Result<bool> {
        self.observe("post_campaign_update", caller, || {
            let height = self.clock.current_height();
            let lock = self.campaign_lock(campaign_id)?;
            let _guard = lock.lock();

            let campaign = self.load_campaign(campaign_id)?;
            Self::ensure_owner(&campaign, caller)?;

            let mut stats = self.load_stats(campaign_id)?;
            let index = stats.updates_count;
            stats.updates_count += 1;

            let mut batch = WriteSet::new();
            self.updates.stage_append(
                &mut batch,
                &CampaignUpdate {
                    campaign_id,
                    index,
                    title,
                    body,
                    posted_at: height,
                },
            )?;
            self.campaigns.stage_stats(&mut batch, campaign_id, &stats)?;
            self.commit(
                batch,
                height,
                EventKind::UpdatePosted { campaign_id, index },
                &[],
            )?;

            tracing::info!(campaign_id, index, caller = %caller, height, "Update posted");
            Ok(true)
        })
    }

    /// Change the platform fee rate (administrator only)
    pub fn update_platform_fee(&self, caller: &AccountId, bps: u32) -> Result<bool> {
        self.observe("update_platform_fee", caller, || {
            self.ensure_administrator(caller)?;
            validate_fee_bps(bps)?;

            self.update_policy(
                |policy| policy.platform_fee_bps = bps,
                EventKind::PlatformFeeUpdated { bps },
            )?;

            tracing::info!(caller = %caller, bps, "Platform fee updated");
            Ok(true)
        })
    }

    /// Change the minimum contribution (administrator only)
    pub fn update_minimum_contribution(&self, caller: &AccountId, amount: Amount) -> Result<bool> {
        self.observe("update_minimum_contribution", caller, || {
            self.ensure_administrator(caller)?;

            self.update_policy(
                |policy| policy.minimum_contribution = amount,
                EventKind::MinimumContributionUpdated { amount },
            )?;

            tracing::info!(caller = %caller, amount = %amount, "Minimum contribution updated");
            Ok(true)
        })
    }

    /// Dispatch a transaction to the matching operation
    pub fn execute(&self, tx: &Transaction) -> Result<CallOutput> {
        let sender = &tx.sender;
        match &tx.call {
            Call::CreateCampaign {
                goal,
                deadline_offset,
            } => self
                .create_campaign(sender, *goal, *deadline_offset)
                .map(CallOutput::CampaignId),
            Call::Contribute {
                campaign_id,
                amount,
            } => self
                .contribute(sender, *campaign_id, *amount)
                .map(CallOutput::Success),
            Call::ClaimFunds { campaign_id } => self
                .claim_funds(sender, *campaign_id)
                .map(CallOutput::Success),
            Call::Refund { campaign_id } => {
                self.refund(sender, *campaign_id).map(CallOutput::Success)
            }
            Call::AddMilestone {
                campaign_id,
                title,
                description,
                target_amount,
                deadline_offset,
            } => self
                .add_campaign_milestone(
                    sender,
                    *campaign_id,
                    title.clone(),
                    description.clone(),
                    *target_amount,
                    *deadline_offset,
                )
                .map(CallOutput::Success),
            Call::CompleteMilestone { campaign_id, index } => self
                .complete_campaign_milestone(sender, *campaign_id, *index)
                .map(CallOutput::Success),
            Call::PostUpdate {
                campaign_id,
                title,
                body,
            } => self
                .post_campaign_update(sender, *campaign_id, title.clone(), body.clone())
                .map(CallOutput::Success),
            Call::UpdatePlatformFee { bps } => self
                .update_platform_fee(sender, *bps)
                .map(CallOutput::Success),
            Call::UpdateMinimumContribution { amount } => self
                .update_minimum_contribution(sender, *amount)
                .map(CallOutput::Success),
        }
    }

    // ===== Queries =====

    /// Campaign record
    pub fn get_campaign_details(&self, campaign_id: CampaignId) -> Result<Option<Campaign>> {
        self.campaigns.get(campaign_id)
    }

    /// Cumulative pledge of `contributor`; `None` once refunded
    pub fn get_contribution(
        &self,
        campaign_id: CampaignId,
        contributor: &AccountId,
    ) -> Result<Option<Contribution>> {
        self.contributions.get(campaign_id, contributor)
    }

    /// Every live pledge to a campaign
    pub fn get_contributions(&self, campaign_id: CampaignId) -> Result<Vec<Contribution>> {
        self.contributions.list(campaign_id)
    }

    /// Milestone record
    pub fn get_milestone_details(&self, campaign_id: CampaignId, index: u64) -> Result<Option<Milestone>> {
        self.milestones.get(campaign_id, index)
    }

    /// Every milestone of a campaign
    pub fn get_milestones(&self, campaign_id: CampaignId) -> Result<Vec<Milestone>> {
        self.milestones.list(campaign_id)
    }

    /// Update record
    pub fn get_campaign_update(&self, campaign_id: CampaignId, index: u64) -> Result<Option<CampaignUpdate>> {
        self.updates.get(campaign_id, index)
    }

    /// Every update of a campaign, oldest first
    pub fn get_campaign_updates(&self, campaign_id: CampaignId) -> Result<Vec<CampaignUpdate>> {
        self.updates.list(campaign_id)
    }

    /// Campaign counters
    pub fn get_campaign_statistics(&self, campaign_id: CampaignId) -> Result<Option<CampaignStats>> {
        self.campaigns.get_stats(campaign_id)
    }

    /// floor(raised × 100 / goal)
    pub fn get_campaign_progress(&self, campaign_id: CampaignId) -> Result<u128> {
        Ok(self.load_campaign(campaign_id)?.progress_percent())
    }

    /// Goal reached; `false` for unknown campaigns
    pub fn is_campaign_successful(&self, campaign_id: CampaignId) -> Result<bool> {
        Ok(self
            .campaigns
            .get(campaign_id)?
            .is_some_and(|c| c.is_successful()))
    }

    /// Campaigns ever created
    pub fn get_total_campaigns(&self) -> Result<u64> {
        self.campaigns.next_id()
    }

    /// Fee the current policy takes from `amount`
    pub fn calculate_platform_fee(&self, amount: Amount) -> Amount {
        self.policy.read().calculate_fee(amount)
    }

    /// Lifecycle phase at the current height
    pub fn get_campaign_status(&self, campaign_id: CampaignId) -> Result<CampaignStatus> {
        let height = self.clock.current_height();
        Ok(self.load_campaign(campaign_id)?.status(height))
    }

    /// Blocks until the deadline, 0 once reached
    pub fn get_blocks_remaining(&self, campaign_id: CampaignId) -> Result<BlockHeight> {
        let height = self.clock.current_height();
        Ok(self.load_campaign(campaign_id)?.deadline.saturating_sub(height))
    }

    /// Current fee policy
    pub fn get_fee_policy(&self) -> FeePolicy {
        *self.policy.read()
    }

    /// Administrator established at first start
    pub fn administrator(&self) -> &AccountId {
        &self.administrator
    }

    /// Account holding pledged funds
    pub fn escrow_account(&self) -> &AccountId {
        &self.escrow
    }

    /// Account receiving platform fees
    pub fn platform_account(&self) -> &AccountId {
        &self.platform
    }

    /// Journal entries with `seq >= from`, at most `limit`
    pub fn events_since(&self, from: u64, limit: usize) -> Result<Vec<EngineEvent>> {
        self.journal.since(from, limit)
    }

    /// Current block height
    pub fn current_height(&self) -> BlockHeight {
        self.clock.current_height()
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // ===== Internals =====

    fn observe<T>(
        &self,
        operation: &'static str,
        caller: &AccountId,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = op();
        self.metrics
            .record_duration(operation, start.elapsed().as_secs_f64());

        if let Err(err) = &result {
            self.metrics.record_rejection(err.code());
            if err.is_rejection() {
                tracing::warn!(operation, caller = %caller, code = %err.code(), error = %err, "Operation rejected");
            } else {
                tracing::error!(operation, caller = %caller, error = %err, "Operation failed");
            }
        }

        result
    }

    /// Lock for `campaign_id`; unknown campaigns are rejected before a
    /// table entry is created
    fn campaign_lock(&self, campaign_id: CampaignId) -> Result<Arc<Mutex<()>>> {
        if let Some(lock) = self.campaign_locks.get(&campaign_id) {
            return Ok(lock.value().clone());
        }
        self.load_campaign(campaign_id)?;
        Ok(self
            .campaign_locks
            .entry(campaign_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone())
    }

    fn load_campaign(&self, campaign_id: CampaignId) -> Result<Campaign> {
        self.campaigns
            .get(campaign_id)?
            .ok_or_else(|| Error::NotFound(format!("Campaign {}", campaign_id)))
    }

    fn load_stats(&self, campaign_id: CampaignId) -> Result<CampaignStats> {
        Ok(self.campaigns.get_stats(campaign_id)?.unwrap_or_default())
    }

    fn ensure_owner(campaign: &Campaign, caller: &AccountId) -> Result<()> {
        if campaign.owner != *caller {
            return Err(Error::OwnerOnly(format!(
                "{} does not own campaign {}",
                caller, campaign.id
            )));
        }
        Ok(())
    }

    fn ensure_administrator(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.administrator {
            return Err(Error::OwnerOnly(format!("{} is not the administrator", caller)));
        }
        Ok(())
    }

    /// Apply `change` to a copy of the policy, persist it, then publish it
    fn update_policy(&self, change: impl FnOnce(&mut FeePolicy), kind: EventKind) -> Result<()> {
        let mut current = self.policy.write();
        let height = self.clock.current_height();

        let mut policy = *current;
        change(&mut policy);

        let mut batch = WriteSet::new();
        self.campaigns.stage_fee_policy(&mut batch, &policy)?;
        self.commit(batch, height, kind, &[])?;

        *current = policy;
        Ok(())
    }

    /// Send every non-zero transfer as one atomic batch; returns what was sent
    fn settle(&self, transfers: Vec<Transfer>) -> Result<Vec<Transfer>> {
        let transfers: Vec<Transfer> = transfers.into_iter().filter(|t| t.amount > 0).collect();
        if !transfers.is_empty() {
            self.ledger.transfer_all(&transfers)?;
        }
        Ok(transfers)
    }

    /// Commit `batch` with its journal event; on failure undo `sent` so no
    /// value moves without a record
    fn commit(
        &self,
        batch: WriteSet,
        height: BlockHeight,
        kind: EventKind,
        sent: &[Transfer],
    ) -> Result<()> {
        let ops = batch.len();
        let err = match self.journal.commit(batch, height, kind) {
            Ok(event) => {
                tracing::debug!(ops, seq = event.seq, "Committed write set");
                return Ok(());
            }
            Err(err) => err,
        };

        if !sent.is_empty() {
            let reversal: Vec<Transfer> = sent.iter().rev().map(Transfer::reversed).collect();
            match self.ledger.transfer_all(&reversal) {
                Ok(()) => tracing::error!(
                    error = %err,
                    transfers = reversal.len(),
                    "Commit failed after transfer, transfers reversed"
                ),
                Err(reverse_err) => tracing::error!(
                    error = %err,
                    reverse_error = %reverse_err,
                    "Commit failed after transfer and reversal failed"
                ),
            }
        }

        Err(err)
    }
}
