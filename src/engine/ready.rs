//! ReadinessGate: one-time asynchronous engine initialization
//!
//! All adapter instances holding the same gate share a single module load.
//! The first caller triggers the fetch + initialize; concurrent callers
//! await the same in-flight operation. Both success and failure are cached
//! for the life of the gate — the module must never be initialized twice
//! (re-initialization would invalidate every already-constructed session),
//! and a failed load stays failed.

use super::module::{EngineModule, GateError, ModuleLoader};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Process-wide readiness gate for the engine module.
///
/// Shared between adapter instances via `Arc`. State machine:
/// Uninitialized → Initializing (single in-flight load all callers await)
/// → Ready | Failed, with both terminal states held by the cell.
pub struct ReadinessGate {
    loader: Box<dyn ModuleLoader>,
    module: OnceCell<Result<Arc<dyn EngineModule>, GateError>>,
}

impl ReadinessGate {
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            module: OnceCell::new(),
        }
    }

    /// Await engine readiness, loading the module if this is the first call.
    ///
    /// Idempotent and concurrency-safe: the underlying load runs at most
    /// once, and every caller observes the same outcome.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn EngineModule>, GateError> {
        self.module
            .get_or_init(|| async {
                debug!("fetching engine payload");
                let payload = self.loader.fetch_payload().await?;
                debug!(bytes = payload.len(), "initializing engine module");
                self.loader.initialize(payload).await
            })
            .await
            .clone()
    }

    /// True once the module loaded successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.module.get(), Some(Ok(_)))
    }
}
