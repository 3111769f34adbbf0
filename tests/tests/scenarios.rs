mod utils;
use utils::*;

use marbles::{bootstrap_owners, LoadGenerator, OwnerPool};
use marbles_core::{BatchConfig, BatchStatus, Marble};
use mock_ledger::status;
use anyhow::Context;
use std::collections::HashMap;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn all_transfers_succeed() {
    init();
    let (ledger, marbles) = local_marbles();

    let result = LoadGenerator::new("bA", BatchConfig::new(2, 3), marbles)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::Success);
    assert_eq!(result.total_successes, 6);
    assert_eq!(result.total_failures, 0);
    assert!(result.min_transfer_seconds <= result.average_transfer_seconds);
    assert!(result.average_transfer_seconds <= result.max_transfer_seconds);
    assert_eq!(ledger.calls("set_owner"), 6);
    assert_eq!(ledger.marble_count(), 2);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn exhausted_create_sets_status() {
    init();
    let (ledger, marbles) = local_marbles();
    // The first marble gets created, every later attempt is refused.
    ledger.fail_after("init_marble", 1, status::CONFLICT);

    let result = LoadGenerator::new("bB", BatchConfig::new(2, 3), marbles)
        .create_attempts(5)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::MarbleCreateFailed);
    assert_eq!(result.total_successes, 3);
    assert_eq!(result.total_failures, 0);
    assert_eq!(ledger.calls("init_marble"), 1 + 5);
    assert_eq!(ledger.marble_count(), 1);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn mid_loop_failure_is_counted() {
    init();
    let (ledger, marbles) = local_marbles();
    ledger.fail_calls("set_owner", [2], status::CONFLICT);

    let result = LoadGenerator::new("bC", BatchConfig::new(1, 4), marbles)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::Success);
    assert_eq!(result.total_successes, 3);
    assert_eq!(result.total_failures, 1);

    let attempts = ledger.transfer_attempts();
    assert_eq!(attempts[1].status, status::CONFLICT);
    // The refused transfer left the marble with its previous owner.
    assert_eq!(attempts[2].auth_company, attempts[1].auth_company);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn transfers_add_up_to_plan() {
    init();
    let (ledger, marbles) = local_marbles();

    for (concurrency, iterations) in [(1, 1), (3, 5), (8, 4)] {
        let done = ledger.calls("set_owner");
        ledger.clear_faults();
        ledger.fail_calls("set_owner", [done + 1, done + 5], status::FORBIDDEN);

        let request = BatchConfig::new(concurrency, iterations).extra_data_length(6);
        let id = format!("b{concurrency}x{iterations}");
        let result = LoadGenerator::new(&id, request, marbles.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(
            result.total_successes + result.total_failures,
            concurrency * iterations,
            "{id}"
        );
    }
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn owner_bootstrap_failure_aborts_run() {
    init();
    let (ledger, marbles) = local_marbles();
    ledger.fail_calls("init_owner", [2], status::FORBIDDEN);

    let result = LoadGenerator::new("bO", BatchConfig::new(4, 10), marbles.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::OwnerCreateFailed);
    assert_eq!(ledger.calls("init_marble"), 0);

    let stored = marbles.fetch_batch_result("bO").await.unwrap().unwrap();
    assert_eq!(stored, result);
    assert_eq!(stored.total_successes, 0);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn repeated_runs_reuse_owners() {
    init();
    let (ledger, marbles) = local_marbles();

    for id in ["b1", "b2", "b3"] {
        LoadGenerator::new(id, BatchConfig::new(1, 1), marbles.clone())
            .run()
            .await
            .unwrap();
    }

    assert_eq!(ledger.calls("init_owner"), bootstrap_owners().len());
    let pool = OwnerPool::establish(&marbles, bootstrap_owners())
        .await
        .unwrap();
    assert_eq!(pool.len(), 5);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn clear_failure_does_not_abort() {
    init();
    let (ledger, marbles) = local_marbles();
    ledger.fail_always("clear_marbles", status::FORBIDDEN);

    let request = BatchConfig::new(2, 2).clear_marbles(true);
    let result = LoadGenerator::new("bK", request, marbles)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, BatchStatus::Success);
    assert_eq!(result.total_successes, 4);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn stored_result_round_trips() -> anyhow::Result<()> {
    init();
    let (ledger, marbles) = local_marbles();

    assert_eq!(marbles.fetch_batch_result("bR").await?, None);

    let request = BatchConfig::new(3, 2).extra_data_length(16);
    let result = LoadGenerator::new("bR", request, marbles.clone())
        .run()
        .await?;

    let fetched = marbles.fetch_batch_result("bR").await?;
    assert_eq!(fetched, Some(result));

    let raw = ledger.value("bRBRR").context("batch result not stored")?;
    let json: serde_json::Value = serde_json::from_slice(&raw)?;
    assert_eq!(json["request"]["extraDataLength"], 16);
    assert_eq!(json["status"], "success");
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn worker_marbles_follow_palette() {
    init();
    let (ledger, marbles) = local_marbles();

    let request = BatchConfig::new(6, 1).extra_data_length(12);
    LoadGenerator::new("bP", request, marbles.clone())
        .run()
        .await
        .unwrap();

    let mut owners_by_marble = HashMap::new();
    for attempt in ledger.transfer_attempts() {
        let marble: Marble = marbles
            .get_marble(&attempt.marble_id)
            .await
            .unwrap()
            .unwrap();
        assert!(marbles_core::MARBLE_COLORS.contains(&marble.color.as_str()));
        assert!((1..=10).contains(&marble.size));
        assert_eq!(marble.additional_data.map(|d| d.len()), Some(12));
        owners_by_marble.insert(marble.id, marble.owner.id);
    }
    assert_eq!(owners_by_marble.len(), 6);
}
