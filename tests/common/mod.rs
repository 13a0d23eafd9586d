//! Shared test utilities for the integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;

pub use lightning_client::testing::{spawn_server, Call, MemoryImporter};
pub use lightning::{
    CancellationToken, ClientOptions, ConnectionManager, EngineId, Error, ImportClient,
    ImportService, Mutation, SessionId, SessionState, WriteBatch,
};

/// Session id used by the documented scenarios
pub const SESSION: &str = "123e4567-e89b-12d3-a456-426614174000";

pub fn session_id() -> SessionId {
    SessionId::parse(SESSION).expect("valid session id")
}

pub fn engine_id() -> EngineId {
    session_id().engine_id()
}

/// `Put(k1, v1) .. Put(kn, vn)`
pub fn puts(n: usize) -> Vec<Mutation> {
    (1..=n)
        .map(|i| Mutation::put(format!("k{}", i), format!("v{}", i)))
        .collect()
}

// ============================================================================
// TestClient - client wired to an in-memory importer
// ============================================================================

/// Import client over a [`MemoryImporter`], with the importer kept for assertions
pub struct TestClient {
    pub client: ImportClient,
    pub importer: Arc<MemoryImporter>,
}

impl TestClient {
    pub fn new(importer: MemoryImporter, batch_size: usize) -> Self {
        let importer = Arc::new(importer);
        let service: Arc<dyn ImportService> = importer.clone();
        let client = ImportClient::new(
            service,
            session_id(),
            ClientOptions::for_testing().with_batch_size(batch_size),
        );
        TestClient { client, importer }
    }

    pub fn batches(&self) -> Vec<WriteBatch> {
        self.importer.batches(engine_id())
    }

    pub fn written(&self) -> Vec<Mutation> {
        self.importer.mutations(engine_id())
    }

    pub fn count_writes(&self) -> usize {
        self.importer.count(|c| matches!(c, Call::WriteEngine(..)))
    }
}
