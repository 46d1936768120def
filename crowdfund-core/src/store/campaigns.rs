//! Campaign records, statistics and process-wide singletons

use super::{get_decoded, id_key, Column, KvStore, WriteSet};
use crate::error::Result;
use crate::fee::FeePolicy;
use crate::types::{AccountId, Campaign, CampaignId, CampaignStats};
use std::sync::Arc;

const META_NEXT_CAMPAIGN_ID: &[u8] = b"next_campaign_id";
const META_FEE_POLICY: &[u8] = b"fee_policy";
const META_ADMINISTRATOR: &[u8] = b"administrator";

/// Campaign store (append-only; campaigns are never deleted)
#[derive(Clone)]
pub struct CampaignStore {
    kv: Arc<dyn KvStore>,
}

impl std::fmt::Debug for CampaignStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignStore").finish_non_exhaustive()
    }
}

impl CampaignStore {
    /// Create store over `kv`
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Get campaign by ID
    pub fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        get_decoded(self.kv.as_ref(), Column::Campaigns, &id_key(id))
    }

    /// Get campaign statistics by ID
    pub fn get_stats(&self, id: CampaignId) -> Result<Option<CampaignStats>> {
        get_decoded(self.kv.as_ref(), Column::Stats, &id_key(id))
    }

    /// Id the next campaign will receive; equals the number ever created
    pub fn next_id(&self) -> Result<CampaignId> {
        Ok(get_decoded(self.kv.as_ref(), Column::Meta, META_NEXT_CAMPAIGN_ID)?.unwrap_or(0))
    }

    /// Persisted fee policy
    pub fn fee_policy(&self) -> Result<Option<FeePolicy>> {
        get_decoded(self.kv.as_ref(), Column::Meta, META_FEE_POLICY)
    }

    /// Persisted administrator
    pub fn administrator(&self) -> Result<Option<AccountId>> {
        get_decoded(self.kv.as_ref(), Column::Meta, META_ADMINISTRATOR)
    }

    /// Stage campaign record
    pub fn stage_campaign(&self, batch: &mut WriteSet, campaign: &Campaign) -> Result<()> {
        batch.put(Column::Campaigns, id_key(campaign.id), campaign)
    }

    /// Stage statistics record
    pub fn stage_stats(&self, batch: &mut WriteSet, id: CampaignId, stats: &CampaignStats) -> Result<()> {
        batch.put(Column::Stats, id_key(id), stats)
    }

    /// Stage the id counter
    pub fn stage_next_id(&self, batch: &mut WriteSet, next: CampaignId) -> Result<()> {
        batch.put(Column::Meta, META_NEXT_CAMPAIGN_ID.to_vec(), &next)
    }

    /// Stage fee policy
    pub fn stage_fee_policy(&self, batch: &mut WriteSet, policy: &FeePolicy) -> Result<()> {
        batch.put(Column::Meta, META_FEE_POLICY.to_vec(), policy)
    }

    /// Stage administrator
    pub fn stage_administrator(&self, batch: &mut WriteSet, admin: &AccountId) -> Result<()> {
        batch.put(Column::Meta, META_ADMINISTRATOR.to_vec(), admin)
    }
}
