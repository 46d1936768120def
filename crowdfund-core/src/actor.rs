//! Actor-based single writer for the campaign engine
//!
//! Mutations sent through an [`EngineHandle`] are funnelled through one
//! Tokio task, so a block of transactions executes in order with no other
//! actor-routed write interleaved:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               EngineHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              EngineActor (Single Task)                │
//! │  ExecuteBlock: Vec<Transaction> → Vec<Result<..>>     │
//! │                       │                               │
//! │                       ▼                               │
//! │             CampaignEngine::execute()                 │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Queries do not need the actor; call them on the shared
//! [`CampaignEngine`] directly. Mutations called on the engine directly
//! bypass the mailbox and may land between two transactions of a block.
//! Advancing the clock between blocks is the caller's job.

use crate::engine::CampaignEngine;
use crate::types::{AccountId, Amount, Call, CallOutput, CampaignId, Transaction};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the engine actor
#[derive(Debug)]
pub enum EngineMessage {
    /// Execute one transaction
    Execute {
        /// Transaction
        tx: Transaction,
        /// Reply
        response: oneshot::Sender<Result<CallOutput>>,
    },

    /// Execute transactions in order as one block
    ExecuteBlock {
        /// Transactions
        txs: Vec<Transaction>,
        /// One receipt per transaction
        response: oneshot::Sender<Vec<Result<CallOutput>>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the write path
pub struct EngineActor {
    engine: Arc<CampaignEngine>,
    mailbox: mpsc::Receiver<EngineMessage>,
}

impl std::fmt::Debug for EngineActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineActor").finish_non_exhaustive()
    }
}

impl EngineActor {
    /// Create new actor
    pub fn new(engine: Arc<CampaignEngine>, mailbox: mpsc::Receiver<EngineMessage>) -> Self {
        Self { engine, mailbox }
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                EngineMessage::Execute { tx, response } => {
                    let _ = response.send(self.engine.execute(&tx));
                }

                EngineMessage::ExecuteBlock { txs, response } => {
                    let height = self.engine.current_height();
                    tracing::debug!(height, transactions = txs.len(), "Executing block");

                    let receipts = txs.iter().map(|tx| self.engine.execute(tx)).collect();
                    let _ = response.send(receipts);
                }

                EngineMessage::Shutdown => break,
            }
        }

        tracing::debug!("Engine actor stopped");
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<EngineMessage>) -> Self {
        Self { sender }
    }

    /// Execute one transaction
    pub async fn execute(&self, tx: Transaction) -> Result<CallOutput> {
        let (response, rx) = oneshot::channel();
        self.send(EngineMessage::Execute { tx, response }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Execute `txs` in order; one receipt per transaction
    ///
    /// No other write sent through this actor runs between them. Writes made
    /// directly on the [`CampaignEngine`] are not ordered against the block.
    pub async fn submit_block(&self, txs: Vec<Transaction>) -> Result<Vec<Result<CallOutput>>> {
        let (response, rx) = oneshot::channel();
        self.send(EngineMessage::ExecuteBlock { txs, response })
            .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Create a campaign
    pub async fn create_campaign(
        &self,
        caller: impl Into<AccountId>,
        goal: Amount,
        deadline_offset: u64,
    ) -> Result<CampaignId> {
        let call = Call::CreateCampaign {
            goal,
            deadline_offset,
        };
        match self.execute(Transaction::new(caller, call)).await? {
            CallOutput::CampaignId(id) => Ok(id),
            other => Err(Error::Concurrency(format!("Unexpected output {:?}", other))),
        }
    }

    /// Contribute to a campaign
    pub async fn contribute(
        &self,
        caller: impl Into<AccountId>,
        campaign_id: CampaignId,
        amount: Amount,
    ) -> Result<bool> {
        self.flag(caller, Call::Contribute { campaign_id, amount })
            .await
    }

    /// Claim a campaign's funds
    pub async fn claim_funds(&self, caller: impl Into<AccountId>, campaign_id: CampaignId) -> Result<bool> {
        self.flag(caller, Call::ClaimFunds { campaign_id }).await
    }

    /// Refund the caller's pledge
    pub async fn refund(&self, caller: impl Into<AccountId>, campaign_id: CampaignId) -> Result<bool> {
        self.flag(caller, Call::Refund { campaign_id }).await
    }

    /// Add a milestone
    pub async fn add_campaign_milestone(
        &self,
        caller: impl Into<AccountId>,
        campaign_id: CampaignId,
        title: impl Into<String>,
        description: impl Into<String>,
        target_amount: Amount,
        deadline_offset: u64,
    ) -> Result<bool> {
        self.flag(
            caller,
            Call::AddMilestone {
                campaign_id,
                title: title.into(),
                description: description.into(),
                target_amount,
                deadline_offset,
            },
        )
        .await
    }

    /// Complete a milestone
    pub async fn complete_campaign_milestone(
        &self,
        caller: impl Into<AccountId>,
        campaign_id: CampaignId,
        index: u64,
    ) -> Result<bool> {
        self.flag(caller, Call::CompleteMilestone { campaign_id, index })
            .await
    }

    /// Post an update
    pub async fn post_campaign_update(
        &self,
        caller: impl Into<AccountId>,
        campaign_id: CampaignId,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<bool> {
        self.flag(
            caller,
            Call::PostUpdate {
                campaign_id,
                title: title.into(),
                body: body.into(),
            },
        )
        .await
    }

    /// Change the platform fee
    pub async fn update_platform_fee(&self, caller: impl Into<AccountId>, bps: u32) -> Result<bool> {
        self.flag(caller, Call::UpdatePlatformFee { bps }).await
    }

    /// Change the minimum contribution
    pub async fn update_minimum_contribution(
        &self,
        caller: impl Into<AccountId>,
        amount: Amount,
    ) -> Result<bool> {
        self.flag(caller, Call::UpdateMinimumContribution { amount })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.send(EngineMessage::Shutdown).await
    }

    async fn flag(&self, caller: impl Into<AccountId>, call: Call) -> Result<bool> {
        match self.execute(Transaction::new(caller, call)).await? {
            CallOutput::Success(ok) => Ok(ok),
            other => Err(Error::Concurrency(format!("Unexpected output {:?}", other))),
        }
    }

    async fn send(&self, msg: EngineMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }
}

/// Spawn the engine actor with a bounded mailbox
pub fn spawn_engine_actor(engine: Arc<CampaignEngine>, mailbox_capacity: usize) -> EngineHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = EngineActor::new(engine, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    EngineHandle::new(tx)
}
