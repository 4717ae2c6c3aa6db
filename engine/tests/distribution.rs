mod common;

use common::*;
use grove_common::{
    error::{EngineError, ErrorKind},
    types::{DistributionState, IdempotencyKey, TransferStatus},
};
use grove_engine::{
    config::{DustPolicy, EngineConfig},
    core::external::HoldingSource,
};

#[tokio::test]
async fn test_distribution_end_to_end() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 333), ("bob", 333), ("carol", 334), (FARMER, 9_000)])
        .await;
    h.deposit("H1", 1_000_000_000).await?;

    let result = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await?;
    let distribution = &result.distribution;
    assert_eq!(distribution.state, DistributionState::Distributed);
    assert_eq!(distribution.farmer_share, 300_000_000);
    assert_eq!(distribution.investor_share, 700_000_000);
    assert_eq!(
        distribution.farmer_share + distribution.distributed_amount + distribution.dust,
        distribution.total_amount
    );

    let shares: Vec<_> = result
        .shares
        .iter()
        .map(|share| (share.holder.as_str(), share.amount))
        .collect();
    assert_eq!(
        shares,
        vec![("alice", 233_100_000), ("bob", 233_100_000), ("carol", 233_800_000)]
    );

    // Holders and the farmer are paid from the reserve
    assert_eq!(
        h.holdings.get_payment_balance(&account("alice"), PAYMENT).await?,
        233_100_000
    );
    assert_eq!(
        h.holdings.get_payment_balance(&account(FARMER), PAYMENT).await?,
        300_000_000
    );
    assert!(h.engine.has_claimed(distribution.id, &account("carol")).await?);
    assert!(h.engine.get_pending_distributions().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_second_distribution_is_rejected() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 10), ("bob", 20)]).await;
    h.deposit("H1", 999).await?;

    h.engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await?;
    let after_first = h.engine.get_distribution_summary(&harvest("H1")).await?;
    let executed = h.sink.executed_count();

    let err = h
        .engine
        .distribute_revenue(&account(ADMIN), &grove(), &harvest("H1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyDistributed(harvest("H1")));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(!err.is_retryable());

    assert_eq!(h.engine.get_distribution_summary(&harvest("H1")).await?, after_first);
    assert_eq!(h.sink.executed_count(), executed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distributions_have_one_winner() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 1), ("bob", 2), ("carol", 3)]).await;
    h.deposit("H1", 600).await?;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        match task.await.map_err(|e| EngineError::Storage(e.to_string()))? {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, EngineError::AlreadyDistributed(harvest("H1"))),
        }
    }
    assert_eq!(successes, 1);

    let history = h.engine.get_holder_distribution_history(&account("carol")).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, 210);
    // Three holder payouts and one farmer payout, each executed once
    assert_eq!(h.sink.executed_count(), 4);
    Ok(())
}

#[tokio::test]
async fn test_no_token_holders_leaves_ledger_untouched() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[(FARMER, 1_000)]).await;
    h.deposit("H1", 500).await?;

    let err = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoTokenHolders);
    assert_eq!(err.kind(), ErrorKind::Insufficiency);

    let distribution = h.engine.get_distribution(&harvest("H1")).await?;
    assert_eq!(distribution.state, DistributionState::Deposited);
    assert_eq!(h.engine.get_pending_distributions().await?.len(), 1);
    assert_eq!(h.engine.get_farmer_balance(&grove()).await?.total_credited, 0);
    assert_eq!(h.sink.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_zero_deposit_records_nothing() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.report_harvest("H1", 100, 10).await?;

    let err = h
        .engine
        .deposit_harvest_revenue(&account(FARMER), &grove(), &harvest("H1"), 0)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ZeroAmount);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        h.engine.get_distribution(&harvest("H1")).await.unwrap_err(),
        EngineError::NotYetDeposited(harvest("H1"))
    );
    Ok(())
}

#[tokio::test]
async fn test_distribute_requires_deposit_and_matching_grove() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 10)]).await;
    h.report_harvest("H1", 10, 10).await?;

    let err = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotYetDeposited(harvest("H1")));

    let err = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H2"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::HarvestNotFound(harvest("H2")));

    let err = h
        .engine
        .distribute_revenue(&account("alice"), &grove(), &harvest("H1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    Ok(())
}

#[tokio::test]
async fn test_admin_can_deposit_and_distribute() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 10)]).await;
    h.report_harvest("H1", 10, 10).await?;

    h.engine
        .deposit_harvest_revenue(&account(ADMIN), &grove(), &harvest("H1"), 100)
        .await?;
    let result = h
        .engine
        .distribute_revenue(&account(ADMIN), &grove(), &harvest("H1"))
        .await?;
    assert_eq!(result.distribution.deposited_by, account(ADMIN));
    // The farmer share still goes to the grove owner
    assert_eq!(
        result.farmer_withdrawal.map(|w| (w.farmer, w.amount)),
        Some((account(FARMER), 30))
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_payouts_are_reconciled_with_original_amounts() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 1), ("bob", 1)]).await;
    h.deposit("H1", 1_000).await?;

    let bob_key = IdempotencyKey::payout(1, &account("bob"));
    h.sink.fail_key(bob_key.clone());
    let result = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await?;
    assert_eq!(result.failed_payouts, 1);
    assert!(!h.engine.has_claimed(1, &account("bob")).await?);
    assert_eq!(
        h.engine.list_transfers(Some(TransferStatus::Failed)).await?.len(),
        1
    );

    // Holdings change after the commit; the retry pays the committed share
    h.set_holders(&[("bob", 1_000)]).await;
    h.sink.heal(&bob_key);
    let report = h.engine.reconcile().await?;
    assert_eq!(report.retried, 1);
    assert_eq!(report.settled, 1);
    assert_eq!(report.failed, 0);

    assert!(h.engine.has_claimed(1, &account("bob")).await?);
    assert_eq!(h.sink.executed(&bob_key).map(|r| r.amount), Some(350));
    assert_eq!(
        h.holdings.get_payment_balance(&account("bob"), PAYMENT).await?,
        350
    );

    let summary = h.engine.get_distribution_summary(&harvest("H1")).await?;
    assert_eq!(summary.claimed_count, 2);
    assert_eq!(summary.unclaimed_amount, 0);
    Ok(())
}

#[tokio::test]
async fn test_pending_payouts_settle_through_callback() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 1)]).await;
    h.deposit("H1", 100).await?;
    h.sink.set_auto_settle(false);

    let result = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await?;
    let earnings = h.engine.get_holder_earnings(&account("alice")).await?;
    assert_eq!(earnings.total_unclaimed, 70);
    assert_eq!(earnings.total_claimed, 0);

    let key = IdempotencyKey::payout(result.distribution.id, &account("alice"));
    h.engine.handle_transfer_outcome(&key, true, None).await?;
    let earnings = h.engine.get_holder_earnings(&account("alice")).await?;
    assert_eq!(earnings.total_claimed, 70);
    assert_eq!(earnings.total_unclaimed, 0);

    // A late failure report does not reopen a settled payout
    let entry = h
        .engine
        .handle_transfer_outcome(&key, false, Some("timeout".to_string()))
        .await?;
    assert_eq!(entry.status, TransferStatus::Settled);
    assert!(h.engine.has_claimed(result.distribution.id, &account("alice")).await?);
    Ok(())
}

#[tokio::test]
async fn test_dust_policies() -> Result<(), EngineError> {
    // 70 over three equal holders: 23 each, 1 of dust
    let retain = Harness::with_defaults().await?;
    retain.set_holders(&[("a", 5), ("b", 5), ("c", 5)]).await;
    retain.deposit("H1", 100).await?;
    retain.deposit("H2", 100).await?;
    for id in ["H1", "H2"] {
        retain
            .engine
            .distribute_revenue(&account(FARMER), &grove(), &harvest(id))
            .await?;
    }
    assert_eq!(retain.engine.get_retained_dust(&grove()).await?, 2);
    assert_eq!(
        retain.engine.get_farmer_balance(&grove()).await?.total_credited,
        60
    );

    let to_farmer = Harness::new(EngineConfig {
        dust_policy: DustPolicy::ToFarmer,
        ..default_config()
    })
    .await?;
    to_farmer.set_holders(&[("a", 5), ("b", 5), ("c", 5)]).await;
    to_farmer.deposit("H1", 100).await?;
    let result = to_farmer
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await?;
    assert_eq!(result.distribution.dust, 1);
    assert_eq!(result.farmer_withdrawal.map(|w| w.amount), Some(31));
    assert_eq!(to_farmer.engine.get_retained_dust(&grove()).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_farmer_withdrawals_without_auto_payout() -> Result<(), EngineError> {
    let h = Harness::new(EngineConfig {
        auto_payout_farmer_share: false,
        ..default_config()
    })
    .await?;
    h.set_holders(&[("alice", 1)]).await;
    h.deposit("H1", 1_000).await?;
    h.deposit("H2", 500).await?;
    for id in ["H1", "H2"] {
        let result = h
            .engine
            .distribute_revenue(&account(FARMER), &grove(), &harvest(id))
            .await?;
        assert!(result.farmer_withdrawal.is_none());
    }
    assert_eq!(h.engine.get_farmer_balance(&grove()).await?.available, 450);

    let err = h
        .engine
        .withdraw_farmer_share(&account(ADMIN), &grove(), 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    h.engine
        .withdraw_farmer_share(&account(FARMER), &grove(), 400)
        .await?;
    let err = h
        .engine
        .withdraw_farmer_share(&account(FARMER), &grove(), 51)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientFarmerBalance {
            required: 51,
            available: 50
        }
    );

    let history = h.engine.get_withdrawal_history(&account(FARMER)).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(
        h.holdings.get_payment_balance(&account(FARMER), PAYMENT).await?,
        400
    );
    Ok(())
}

#[tokio::test]
async fn test_pause_blocks_mutations_only() -> Result<(), EngineError> {
    let h = Harness::with_defaults().await?;
    h.set_holders(&[("alice", 1)]).await;
    h.deposit("H1", 100).await?;

    let err = h.engine.pause(&account(FARMER)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    h.engine.pause(&account(ADMIN))?;
    assert!(h.engine.is_paused());

    let err = h
        .engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Paused);
    assert_eq!(h.engine.get_pending_distributions().await?.len(), 1);

    h.engine.unpause(&account(ADMIN))?;
    h.engine
        .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
        .await?;
    Ok(())
}

mod conservation {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_distribution_conserves_deposit(
            balances in prop::collection::vec(1u64..10_000, 1..12),
            amount in 1u64..1_000_000_000,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let holders = balances.len() as u64;
            let result = runtime.block_on(async {
                let h = Harness::with_defaults().await?;
                for (i, balance) in balances.iter().enumerate() {
                    h.holdings
                        .set_balance(&grove(), &account(&format!("h{}", i)), *balance)
                        .await;
                }
                h.deposit("H1", amount).await?;
                h.engine
                    .distribute_revenue(&account(FARMER), &grove(), &harvest("H1"))
                    .await
            })
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let distribution = result.distribution;
            prop_assert_eq!(
                distribution.farmer_share + distribution.distributed_amount + distribution.dust,
                amount
            );
            prop_assert_eq!(
                result.shares.iter().map(|share| share.amount).sum::<u64>(),
                distribution.distributed_amount
            );
            prop_assert!(distribution.dust < holders);
        }
    }
}
