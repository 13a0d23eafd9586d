//! Ingestion Scenarios
//!
//! Full runs against the in-memory importer, checked through the call log:
//! - Batching across batch boundaries
//! - EngineExists recovery (once) and the fatal second conflict
//! - Failed and cancelled writes still release the writer

use crate::common::*;
use std::time::Duration;

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn three_puts_in_batches_of_two() {
    let mut t = TestClient::new(MemoryImporter::new(), 2);
    let summary = t
        .client
        .run(puts(3), &CancellationToken::new())
        .await
        .unwrap();

    let engine = engine_id();
    let batches = t.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].mutations, puts(2));
    assert_eq!(batches[1].mutations, vec![Mutation::put("k3", "v3")]);
    assert!(batches[0].commit_ts <= batches[1].commit_ts);

    assert_eq!(
        t.importer.calls(),
        vec![
            Call::OpenEngine(engine),
            Call::WriteEngine(engine, batches[0].clone()),
            Call::WriteEngine(engine, batches[1].clone()),
            Call::CloseWriter(engine),
        ]
    );
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.mutations, 3);
    assert_eq!(summary.last_commit_ts, Some(batches[1].commit_ts));
    assert_eq!(t.client.state(), SessionState::Open);
}

#[tokio::test]
async fn mixed_puts_and_deletes_keep_order() {
    let mut t = TestClient::new(MemoryImporter::new(), 3);
    let input = vec![
        Mutation::put("a", "1"),
        Mutation::delete("b"),
        Mutation::put("c", "3"),
        Mutation::delete("a"),
    ];
    t.client
        .run(input.clone(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(t.written(), input);
    assert_eq!(t.batches().len(), 2);
}

#[tokio::test]
async fn progress_counters_follow_acknowledged_batches() {
    let mut t = TestClient::new(MemoryImporter::new(), 4);
    let progress = t.client.progress();
    t.client
        .run(puts(10), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(progress.batches(), 3);
    assert_eq!(progress.mutations(), 10);
    assert_eq!(progress.failed_batches(), 0);
    assert_eq!(progress.last_commit_ts(), t.batches()[2].commit_ts);
}

// ============================================================================
// Conflict Recovery
// ============================================================================

#[tokio::test]
async fn leftover_engine_is_cleaned_up_then_ingested() {
    let engine = engine_id();
    let mut t = TestClient::new(MemoryImporter::new().with_existing_engine(engine), 2);
    t.client
        .run(puts(2), &CancellationToken::new())
        .await
        .unwrap();

    let calls = t.importer.calls();
    assert_eq!(
        &calls[..3],
        &[
            Call::OpenEngine(engine),
            Call::CleanupEngine(engine),
            Call::OpenEngine(engine),
        ]
    );
    assert_eq!(t.written(), puts(2));
    assert_eq!(t.importer.close_writer_calls(), 1);
}

#[tokio::test]
async fn second_conflict_aborts_before_any_write() {
    let mut t = TestClient::new(MemoryImporter::new().with_forced_conflicts(2), 2);
    let err = t
        .client
        .run(puts(2), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_engine_exists());
    assert_eq!(t.client.state(), SessionState::ConflictDetected);
    assert_eq!(t.count_writes(), 0);
    assert_eq!(t.importer.close_writer_calls(), 0);
    assert_eq!(
        t.importer
            .count(|c| matches!(c, Call::CleanupEngine(_))),
        1
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failed_second_batch_is_not_retried() {
    let mut t = TestClient::new(MemoryImporter::new().with_failing_write(1), 2);
    let err = t
        .client
        .run(puts(6), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemoteWrite { .. }));
    assert_eq!(t.count_writes(), 2);
    assert_eq!(t.written(), puts(2));
    assert_eq!(t.importer.close_writer_calls(), 1);
    assert_eq!(t.client.progress().failed_batches(), 1);
}

#[tokio::test]
async fn unreachable_importer_is_connection_error() {
    let mut t = TestClient::new(MemoryImporter::new(), 2);
    t.importer.set_unreachable(true);
    let err = t
        .client
        .run(puts(1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(t.client.state(), SessionState::Closed);
}

#[tokio::test]
async fn cancelled_run_releases_writer() {
    let mut t = TestClient::new(
        MemoryImporter::new().with_write_delay(Duration::from_millis(100)),
        1,
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let err = t.client.run(puts(20), &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(t.count_writes() < 20);
    assert_eq!(t.importer.close_writer_calls(), 1);
}

#[tokio::test]
async fn second_run_on_same_session_appends() {
    let mut t = TestClient::new(MemoryImporter::new(), 2);
    let cancel = CancellationToken::new();
    t.client.run(puts(2), &cancel).await.unwrap();
    t.client
        .run(vec![Mutation::put("k9", "v9")], &cancel)
        .await
        .unwrap();

    let batches = t.batches();
    assert_eq!(batches.len(), 2);
    assert!(batches[0].commit_ts < batches[1].commit_ts);
    assert_eq!(t.importer.close_writer_calls(), 2);
    assert_eq!(t.importer.count(|c| matches!(c, Call::OpenEngine(_))), 1);
}
