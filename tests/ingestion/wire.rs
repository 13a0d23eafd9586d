//! Wire Protocol Runs
//!
//! The same ingestion runs as the scenarios, through `ConnectionManager` and
//! the TCP protocol against the stub server.

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;

fn manager() -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        Duration::from_secs(1),
        Duration::from_secs(2),
    ))
}

async fn connect(manager: &Arc<ConnectionManager>, addr: &str, batch_size: usize) -> ImportClient {
    ImportClient::connect(
        manager.clone(),
        addr,
        session_id(),
        ClientOptions::for_testing().with_batch_size(batch_size),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn batches_survive_the_wire_unchanged() {
    let importer = Arc::new(MemoryImporter::new());
    let (addr, _server) = spawn_server(importer.clone()).await.unwrap();
    let manager = manager();
    let mut client = connect(&manager, &addr.to_string(), 3).await;

    let input: Vec<Mutation> = puts(7)
        .into_iter()
        .chain(std::iter::once(Mutation::delete("k1")))
        .collect();
    let summary = client
        .run(input.clone(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(importer.mutations(engine_id()), input);
    let batches = importer.batches(engine_id());
    assert!(batches.windows(2).all(|w| w[0].commit_ts < w[1].commit_ts));
    assert_eq!(importer.close_writer_calls(), 1);

    client.close().unwrap();
    assert!(manager.is_empty());
}

#[tokio::test]
async fn conflict_recovery_over_the_wire() {
    let importer = Arc::new(MemoryImporter::new().with_existing_engine(engine_id()));
    let (addr, _server) = spawn_server(importer.clone()).await.unwrap();
    let manager = manager();
    let mut client = connect(&manager, &addr.to_string(), 2).await;

    client
        .run(puts(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        importer.count(|c| matches!(c, Call::CleanupEngine(_))),
        1
    );
    assert_eq!(importer.mutations(engine_id()), puts(3));
}

#[tokio::test]
async fn clients_share_one_connection_per_address() {
    let importer = Arc::new(MemoryImporter::new());
    let (addr, _server) = spawn_server(importer.clone()).await.unwrap();
    let manager = manager();
    let addr = addr.to_string();

    let first = connect(&manager, &addr, 2).await;
    let second = connect(&manager, &addr, 2).await;
    assert_eq!(manager.len(), 1);
    assert_eq!(first.engine_id(), second.engine_id());
}

#[tokio::test]
async fn rejected_write_over_the_wire_closes_writer() {
    let importer = Arc::new(MemoryImporter::new().with_failing_write(0));
    let (addr, _server) = spawn_server(importer.clone()).await.unwrap();
    let manager = manager();
    let mut client = connect(&manager, &addr.to_string(), 2).await;

    let err = client
        .run(puts(4), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::RemoteWrite {
            reason: "batch 0 rejected".to_string()
        }
    );
    assert_eq!(importer.count(|c| matches!(c, Call::WriteEngine(..))), 1);
    assert_eq!(importer.close_writer_calls(), 1);
}
