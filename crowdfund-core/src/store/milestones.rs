//! Milestones and progress updates, indexed per campaign from 0

use super::{get_decoded, id_key, indexed_key, Column, KvStore, WriteSet};
use crate::error::{Error, Result};
use crate::types::{CampaignId, CampaignUpdate, Milestone};
use std::sync::Arc;

/// Milestone store
#[derive(Clone)]
pub struct MilestoneStore {
    kv: Arc<dyn KvStore>,
}

impl std::fmt::Debug for MilestoneStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MilestoneStore").finish_non_exhaustive()
    }
}

impl MilestoneStore {
    /// Create store over `kv`
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Get milestone by campaign and index
    pub fn get(&self, campaign_id: CampaignId, index: u64) -> Result<Option<Milestone>> {
        get_decoded(self.kv.as_ref(), Column::Milestones, &indexed_key(campaign_id, index))
    }

    /// All milestones of a campaign, by index
    pub fn list(&self, campaign_id: CampaignId) -> Result<Vec<Milestone>> {
        self.kv
            .scan_prefix(Column::Milestones, &id_key(campaign_id))?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(Error::from))
            .collect()
    }

    /// Stage insert or overwrite
    pub fn stage_put(&self, batch: &mut WriteSet, milestone: &Milestone) -> Result<()> {
        batch.put(
            Column::Milestones,
            indexed_key(milestone.campaign_id, milestone.index),
            milestone,
        )
    }
}

/// Update store (append-only)
#[derive(Clone)]
pub struct UpdateStore {
    kv: Arc<dyn KvStore>,
}

impl std::fmt::Debug for UpdateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateStore").finish_non_exhaustive()
    }
}

impl UpdateStore {
    /// Create store over `kv`
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Get update by campaign and index
    pub fn get(&self, campaign_id: CampaignId, index: u64) -> Result<Option<CampaignUpdate>> {
        get_decoded(self.kv.as_ref(), Column::Updates, &indexed_key(campaign_id, index))
    }

    /// All updates of a campaign, oldest first
    pub fn list(&self, campaign_id: CampaignId) -> Result<Vec<CampaignUpdate>> {
        self.kv
            .scan_prefix(Column::Updates, &id_key(campaign_id))?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(Error::from))
            .collect()
    }

    /// Stage append
    pub fn stage_append(&self, batch: &mut WriteSet, update: &CampaignUpdate) -> Result<()> {
        batch.put(
            Column::Updates,
            indexed_key(update.campaign_id, update.index),
            update,
        )
    }
}
