//! Contribution records keyed by (campaign_id, contributor)

use super::{get_decoded, id_key, Column, KvStore, WriteSet};
use crate::error::{Error, Result};
use crate::types::{AccountId, CampaignId, Contribution};
use std::sync::Arc;

/// Contribution store; the only store supporting true removal
#[derive(Clone)]
pub struct ContributionStore {
    kv: Arc<dyn KvStore>,
}

impl std::fmt::Debug for ContributionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionStore").finish_non_exhaustive()
    }
}

impl ContributionStore {
    /// Create store over `kv`
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Get one contributor's pledge
    pub fn get(&self, campaign_id: CampaignId, contributor: &AccountId) -> Result<Option<Contribution>> {
        get_decoded(
            self.kv.as_ref(),
            Column::Contributions,
            &Self::key(campaign_id, contributor),
        )
    }

    /// All live pledges to a campaign
    pub fn list(&self, campaign_id: CampaignId) -> Result<Vec<Contribution>> {
        self.kv
            .scan_prefix(Column::Contributions, &id_key(campaign_id))?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(Error::from))
            .collect()
    }

    /// Stage insert or overwrite
    pub fn stage_put(&self, batch: &mut WriteSet, contribution: &Contribution) -> Result<()> {
        batch.put(
            Column::Contributions,
            Self::key(contribution.campaign_id, &contribution.contributor),
            contribution,
        )
    }

    /// Stage removal
    pub fn stage_delete(&self, batch: &mut WriteSet, campaign_id: CampaignId, contributor: &AccountId) {
        batch.delete(Column::Contributions, Self::key(campaign_id, contributor));
    }

    // campaign_id || contributor. The fixed-width id keeps one campaign's
    // pledges contiguous for prefix scans.
    fn key(campaign_id: CampaignId, contributor: &AccountId) -> Vec<u8> {
        let mut key = id_key(campaign_id);
        key.extend_from_slice(contributor.as_bytes());
        key
    }
}
