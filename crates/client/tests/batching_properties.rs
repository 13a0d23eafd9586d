//! Property tests for batched ingestion.
//!
//! For any valid input and any batch size, the mutations the engine receives
//! across all batches equal the input: same order, nothing duplicated, nothing
//! lost, and every batch but the last is exactly full.

use std::sync::Arc;

use lightning_client::testing::MemoryImporter;
use lightning_client::{ClientOptions, ImportClient, ImportService, Mutation, SessionId};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    (
        any::<bool>(),
        prop::collection::vec(any::<u8>(), 1..16),
        prop::collection::vec(any::<u8>(), 0..16),
    )
        .prop_map(|(is_put, key, value)| {
            if is_put {
                Mutation::put(key, value)
            } else {
                Mutation::delete(key)
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_loss_no_duplication(
        input in prop::collection::vec(mutation_strategy(), 0..100),
        batch_size in 1usize..12,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let importer = Arc::new(MemoryImporter::new());
        let service: Arc<dyn ImportService> = importer.clone();
        let session_id = SessionId::generate();
        let mut client = ImportClient::new(
            service,
            session_id,
            ClientOptions::for_testing().with_batch_size(batch_size),
        );

        let summary = runtime
            .block_on(client.run(input.clone(), &CancellationToken::new()))
            .unwrap();

        let batches = importer.batches(session_id.engine_id());
        let expected_batches = (input.len() + batch_size - 1) / batch_size;
        prop_assert_eq!(batches.len(), expected_batches);
        prop_assert_eq!(summary.batches as usize, expected_batches);
        prop_assert_eq!(summary.mutations as usize, input.len());

        if let Some((_, full)) = batches.split_last() {
            prop_assert!(full.iter().all(|b| b.len() == batch_size));
        }
        prop_assert!(batches.windows(2).all(|w| w[0].commit_ts < w[1].commit_ts));
        prop_assert_eq!(importer.mutations(session_id.engine_id()), input);
        prop_assert_eq!(importer.close_writer_calls(), 1);
    }
}
