//! Campaign lifecycle tests
//!
//! Drives the engine the way a chain would: transactions are submitted in
//! blocks through the actor and the clock advances one height per block.

use crowdfund_core::{
    config::StorageBackend, spawn_engine_actor, AccountId, Amount, BlockHeight, Call, CallOutput,
    CampaignEngine, CampaignStatus, Config, EngineHandle, InMemoryLedger, ManualClock, Transaction,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEPLOYER: &str = "deployer";
const WALLET_1: &str = "wallet_1";
const WALLET_2: &str = "wallet_2";
const STARTING_BALANCE: Amount = 100_000_000_000_000;

type Receipt = crowdfund_core::Result<CallOutput>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine, actor and clock wired together like a small chain
struct TestChain {
    engine: Arc<CampaignEngine>,
    handle: EngineHandle,
    clock: Arc<ManualClock>,
    ledger: Arc<InMemoryLedger>,
}

impl TestChain {
    fn new() -> anyhow::Result<Self> {
        init_tracing();

        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;

        let clock = Arc::new(ManualClock::new(1));
        let ledger = Arc::new(InMemoryLedger::new());
        for account in [DEPLOYER, WALLET_1, WALLET_2] {
            ledger.mint(&AccountId::new(account), STARTING_BALANCE);
        }

        let engine = Arc::new(CampaignEngine::open(&config, clock.clone(), ledger.clone())?);
        let handle = spawn_engine_actor(engine.clone(), config.actor.mailbox_capacity);

        Ok(Self {
            engine,
            handle,
            clock,
            ledger,
        })
    }

    /// Execute `txs` at the current height, then advance one block
    async fn mine_block(&self, txs: Vec<Transaction>) -> anyhow::Result<Vec<Receipt>> {
        let receipts = self.handle.submit_block(txs).await?;
        self.clock.advance(1);
        Ok(receipts)
    }

    fn mine_empty_block(&self) {
        self.clock.advance(1);
    }

    fn mine_empty_block_until(&self, height: BlockHeight) {
        self.clock.advance_to(height);
    }
}

fn create(sender: &str, goal: Amount, deadline_offset: u64) -> Transaction {
    Transaction::new(
        sender,
        Call::CreateCampaign {
            goal,
            deadline_offset,
        },
    )
}

fn contribute(sender: &str, campaign_id: u64, amount: Amount) -> Transaction {
    Transaction::new(
        sender,
        Call::Contribute {
            campaign_id,
            amount,
        },
    )
}

fn claim(sender: &str, campaign_id: u64) -> Transaction {
    Transaction::new(sender, Call::ClaimFunds { campaign_id })
}

fn refund(sender: &str, campaign_id: u64) -> Transaction {
    Transaction::new(sender, Call::Refund { campaign_id })
}

fn err_code(receipt: &Receipt) -> Option<u32> {
    receipt.as_ref().err().map(|e| e.code().as_u32())
}

fn ok(receipt: &Receipt) -> Option<CallOutput> {
    receipt.as_ref().ok().copied()
}

#[tokio::test]
async fn test_campaign_creation() -> anyhow::Result<()> {
    let chain = TestChain::new()?;

    let block = chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 100)])
        .await?;
    assert_eq!(block.len(), 1);
    assert_eq!(ok(&block[0]), Some(CallOutput::CampaignId(0)));

    let campaign = chain.engine.get_campaign_details(0)?.expect("campaign 0");
    assert_eq!(campaign.goal, 1_000_000_000);
    assert_eq!(campaign.raised, 0);
    assert!(!campaign.claimed);
    assert_eq!(campaign.owner, AccountId::new(DEPLOYER));

    chain.handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_campaign_creation() -> anyhow::Result<()> {
    let chain = TestChain::new()?;

    let block = chain.mine_block(vec![create(DEPLOYER, 0, 100)]).await?;
    assert_eq!(err_code(&block[0]), Some(103));

    let block = chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 0)])
        .await?;
    assert_eq!(err_code(&block[0]), Some(104));

    assert_eq!(chain.engine.get_total_campaigns()?, 0);
    Ok(())
}

#[tokio::test]
async fn test_contributions() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 100)])
        .await?;

    let block = chain
        .mine_block(vec![
            contribute(WALLET_1, 0, 100_000_000),
            contribute(WALLET_1, 0, 200_000_000),
        ])
        .await?;
    assert_eq!(ok(&block[0]), Some(CallOutput::Success(true)));
    assert_eq!(ok(&block[1]), Some(CallOutput::Success(true)));

    let campaign = chain.engine.get_campaign_details(0)?.expect("campaign 0");
    assert_eq!(campaign.raised, 300_000_000);

    let pledge = chain
        .engine
        .get_contribution(0, &AccountId::new(WALLET_1))?
        .expect("pledge");
    assert_eq!(pledge.amount, 300_000_000);
    assert_eq!(
        chain.ledger.balance(&AccountId::new(WALLET_1)),
        STARTING_BALANCE - 300_000_000
    );
    Ok(())
}

#[tokio::test]
async fn test_contribution_to_expired_campaign() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 2)])
        .await?;

    chain.mine_empty_block();
    chain.mine_empty_block();
    chain.mine_empty_block();

    let block = chain
        .mine_block(vec![contribute(WALLET_1, 0, 100_000_000)])
        .await?;
    assert_eq!(err_code(&block[0]), Some(104));
    Ok(())
}

#[tokio::test]
async fn test_successful_campaign_claim() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 5)])
        .await?;
    chain
        .mine_block(vec![contribute(WALLET_1, 0, 1_000_000_000)])
        .await?;

    chain.mine_empty_block_until(10);

    let before = chain.ledger.balance(&AccountId::new(DEPLOYER));
    let block = chain.mine_block(vec![claim(DEPLOYER, 0)]).await?;
    assert_eq!(ok(&block[0]), Some(CallOutput::Success(true)));

    let campaign = chain.engine.get_campaign_details(0)?.expect("campaign 0");
    assert!(campaign.claimed);
    assert_eq!(
        chain.ledger.balance(&AccountId::new(DEPLOYER)) - before,
        997_500_000
    );
    assert_eq!(chain.ledger.balance(chain.engine.platform_account()), 2_500_000);

    let block = chain.mine_block(vec![claim(DEPLOYER, 0)]).await?;
    assert_eq!(err_code(&block[0]), Some(106));
    Ok(())
}

#[tokio::test]
async fn test_unsuccessful_campaign_claim() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 5)])
        .await?;
    chain
        .mine_block(vec![contribute(WALLET_1, 0, 500_000_000)])
        .await?;

    chain.mine_empty_block_until(10);

    let block = chain.mine_block(vec![claim(DEPLOYER, 0)]).await?;
    assert_eq!(err_code(&block[0]), Some(105));
    assert_eq!(chain.engine.get_campaign_status(0)?, CampaignStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_refunds_for_unsuccessful_campaign() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 5)])
        .await?;
    chain
        .mine_block(vec![
            contribute(WALLET_1, 0, 100_000_000),
            contribute(WALLET_2, 0, 200_000_000),
        ])
        .await?;

    chain.mine_empty_block_until(10);

    let block = chain
        .mine_block(vec![refund(WALLET_1, 0), refund(WALLET_2, 0)])
        .await?;
    assert_eq!(ok(&block[0]), Some(CallOutput::Success(true)));
    assert_eq!(ok(&block[1]), Some(CallOutput::Success(true)));

    for wallet in [WALLET_1, WALLET_2] {
        let account = AccountId::new(wallet);
        assert!(chain.engine.get_contribution(0, &account)?.is_none());
        assert_eq!(chain.ledger.balance(&account), STARTING_BALANCE);
    }

    let block = chain.mine_block(vec![refund(WALLET_1, 0)]).await?;
    assert_eq!(err_code(&block[0]), Some(102));
    Ok(())
}

#[tokio::test]
async fn test_milestone_management() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 100)])
        .await?;

    let added = chain
        .handle
        .add_campaign_milestone(DEPLOYER, 0, "MVP Launch", "Launch minimum viable product", 500_000_000, 50)
        .await?;
    assert!(added);

    let milestone = chain.engine.get_milestone_details(0, 0)?.expect("milestone 0");
    assert_eq!(milestone.title, "MVP Launch");
    assert_eq!(milestone.target_amount, 500_000_000);
    assert!(!milestone.completed);

    assert!(chain.handle.complete_campaign_milestone(DEPLOYER, 0, 0).await?);
    assert!(chain.engine.get_milestone_details(0, 0)?.expect("milestone 0").completed);
    Ok(())
}

#[tokio::test]
async fn test_campaign_updates() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 100)])
        .await?;

    let posted = chain
        .handle
        .post_campaign_update(DEPLOYER, 0, "Development Progress", "We have completed 50% of development")
        .await?;
    assert!(posted);

    let stats = chain.engine.get_campaign_statistics(0)?.expect("stats");
    assert_eq!(stats.updates_count, 1);

    let update = chain.engine.get_campaign_update(0, 0)?.expect("update 0");
    assert_eq!(update.title, "Development Progress");
    Ok(())
}

#[tokio::test]
async fn test_only_owner_manages_campaign() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 100)])
        .await?;

    let block = chain
        .mine_block(vec![Transaction::new(
            WALLET_1,
            Call::AddMilestone {
                campaign_id: 0,
                title: "Unauthorized Milestone".to_string(),
                description: "This should fail".to_string(),
                target_amount: 500_000_000,
                deadline_offset: 50,
            },
        )])
        .await?;
    assert_eq!(err_code(&block[0]), Some(100));

    let block = chain
        .mine_block(vec![Transaction::new(
            WALLET_1,
            Call::PostUpdate {
                campaign_id: 0,
                title: "Unauthorized Update".to_string(),
                body: "This should fail".to_string(),
            },
        )])
        .await?;
    assert_eq!(err_code(&block[0]), Some(100));
    Ok(())
}

#[tokio::test]
async fn test_platform_fee_management() -> anyhow::Result<()> {
    let chain = TestChain::new()?;

    assert!(chain.handle.update_platform_fee(DEPLOYER, 50).await?);
    assert_eq!(chain.engine.get_fee_policy().platform_fee_bps, 50);

    let block = chain
        .mine_block(vec![
            Transaction::new(WALLET_1, Call::UpdatePlatformFee { bps: 100 }),
            Transaction::new(DEPLOYER, Call::UpdatePlatformFee { bps: 1_500 }),
        ])
        .await?;
    assert_eq!(err_code(&block[0]), Some(100));
    assert_eq!(err_code(&block[1]), Some(103));
    assert_eq!(chain.engine.get_fee_policy().platform_fee_bps, 50);
    Ok(())
}

#[tokio::test]
async fn test_progress_and_time_queries() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    chain
        .mine_block(vec![create(DEPLOYER, 1_000_000_000, 100)])
        .await?;
    chain
        .mine_block(vec![contribute(WALLET_1, 0, 300_000_000)])
        .await?;

    assert_eq!(chain.engine.get_campaign_progress(0)?, 30);
    assert!(!chain.engine.is_campaign_successful(0)?);
    assert_eq!(chain.engine.get_total_campaigns()?, 1);

    // Created at height 1 with deadline 101, two blocks mined since
    assert_eq!(chain.engine.get_blocks_remaining(0)?, 98);
    assert_eq!(chain.engine.get_campaign_status(0)?, CampaignStatus::Open);
    Ok(())
}

#[tokio::test]
async fn test_minimum_contribution_updates() -> anyhow::Result<()> {
    let chain = TestChain::new()?;

    assert!(chain
        .handle
        .update_minimum_contribution(DEPLOYER, 5_000_000)
        .await?);

    let block = chain
        .mine_block(vec![
            Transaction::new(WALLET_1, Call::UpdateMinimumContribution { amount: 10_000_000 }),
            create(DEPLOYER, 1_000_000_000, 10),
        ])
        .await?;
    assert_eq!(err_code(&block[0]), Some(100));

    let block = chain
        .mine_block(vec![
            contribute(WALLET_1, 0, 4_999_999),
            contribute(WALLET_1, 0, 5_000_000),
        ])
        .await?;
    assert_eq!(err_code(&block[0]), Some(103));
    assert_eq!(ok(&block[1]), Some(CallOutput::Success(true)));
    Ok(())
}

#[tokio::test]
async fn test_platform_fee_calculation() -> anyhow::Result<()> {
    let chain = TestChain::new()?;
    assert_eq!(chain.engine.calculate_platform_fee(1_000_000_000), 2_500_000);
    Ok(())
}

#[test]
fn test_rocksdb_state_survives_reopen() -> anyhow::Result<()> {
    init_tracing();
    let temp_dir = tempfile::tempdir()?;

    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.storage.backend = StorageBackend::RocksDb;

    let clock = Arc::new(ManualClock::new(1));
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.mint(&AccountId::new(WALLET_1), STARTING_BALANCE);

    {
        let engine = CampaignEngine::open(&config, clock.clone(), ledger.clone())?;
        let deployer = AccountId::new(DEPLOYER);
        let id = engine.create_campaign(&deployer, 1_000, 10)?;
        engine.contribute(&AccountId::new(WALLET_1), id, 400)?;
        engine.post_campaign_update(&deployer, id, "Kickoff".to_string(), "Started".to_string())?;
        engine.update_platform_fee(&deployer, 75)?;
    }

    let engine = CampaignEngine::open(&config, clock.clone(), ledger)?;
    assert_eq!(engine.get_total_campaigns()?, 1);
    assert_eq!(engine.get_campaign_details(0)?.expect("campaign 0").raised, 400);
    assert_eq!(
        engine
            .get_contribution(0, &AccountId::new(WALLET_1))?
            .expect("pledge")
            .amount,
        400
    );
    assert_eq!(engine.get_fee_policy().platform_fee_bps, 75);
    assert_eq!(engine.get_campaign_updates(0)?.len(), 1);

    let events = engine.events_since(0, 100)?;
    assert_eq!(events.len(), 4);
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));

    let id = engine.create_campaign(&AccountId::new(DEPLOYER), 50, 5)?;
    assert_eq!(id, 1);
    assert_eq!(engine.events_since(4, 10)?.len(), 1);
    Ok(())
}

#[test]
fn test_concurrent_contributions_are_serialized() -> anyhow::Result<()> {
    init_tracing();
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;

    let ledger = Arc::new(InMemoryLedger::new());
    let wallets: Vec<AccountId> = (0..8).map(|i| AccountId::new(format!("wallet_{}", i))).collect();
    for wallet in &wallets {
        ledger.mint(wallet, 1_000);
    }

    let engine = CampaignEngine::open(&config, Arc::new(ManualClock::new(1)), ledger.clone())?;
    let id = engine.create_campaign(&AccountId::new(DEPLOYER), 10_000, 10)?;

    std::thread::scope(|scope| {
        for wallet in &wallets {
            let engine = &engine;
            scope.spawn(move || {
                for _ in 0..50 {
                    engine.contribute(wallet, id, 1).expect("contribution");
                }
            });
        }
    });

    assert_eq!(engine.get_campaign_details(id)?.expect("campaign").raised, 400);
    assert_eq!(ledger.balance(engine.escrow_account()), 400);
    assert_eq!(engine.get_campaign_statistics(id)?.expect("stats").contributor_count, 8);
    Ok(())
}

#[test]
fn test_concurrent_claims_pay_once() -> anyhow::Result<()> {
    init_tracing();
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;

    let clock = Arc::new(ManualClock::new(1));
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.mint(&AccountId::new(WALLET_1), 10_000);

    let engine = CampaignEngine::open(&config, clock.clone(), ledger.clone())?;
    let owner = AccountId::new(DEPLOYER);
    let id = engine.create_campaign(&owner, 10_000, 3)?;
    engine.contribute(&AccountId::new(WALLET_1), id, 10_000)?;
    clock.advance(3);

    let successes = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| engine.claim_funds(&owner, id).is_ok()))
            .collect();
        workers
            .into_iter()
            .map(|w| w.join())
            .filter(|paid| matches!(paid, Ok(true)))
            .count()
    });

    assert_eq!(successes, 1);
    assert_eq!(ledger.balance(&owner), 9_975);
    assert_eq!(ledger.balance(engine.platform_account()), 25);
    Ok(())
}
