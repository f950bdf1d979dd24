//! EngineModule and ModuleLoader traits — how the engine is reached
//!
//! The engine ships as an opaque binary payload. A `ModuleLoader` fetches
//! the payload and initializes the module; the resulting `EngineModule` is
//! the process-wide session factory. Loading happens at most once, through
//! the readiness gate.

use super::session::{EngineError, EngineSession, OutputFormat};
use crate::host::HostError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors from loading or initializing the engine module.
///
/// Cloneable so the gate can hand the same terminal failure to every
/// waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("engine payload fetch failed: {0}")]
    Fetch(String),

    #[error("engine module initialization failed: {0}")]
    Initialize(String),
}

/// Callback the session uses to pull locale data while parsing a style.
///
/// The adapter supplies the implementation; the engine only sees the
/// resolved locale text.
pub trait LocaleFetcher: Send + Sync {
    fn fetch_locale(&self, lang: &str) -> Result<String, HostError>;
}

/// Everything the engine needs to construct one session.
pub struct SessionInit {
    /// Style source text, as the host supplied it.
    pub style: String,
    /// Output format for every render this session produces.
    pub format: OutputFormat,
    /// Locale callback, invoked synchronously during style processing.
    pub locales: Box<dyn LocaleFetcher>,
}

/// The initialized engine module: a session factory.
///
/// Construction is fallible — the engine may reject malformed style source
/// or configuration.
pub trait EngineModule: Send + Sync + std::fmt::Debug {
    fn new_session(&self, init: SessionInit) -> Result<Box<dyn EngineSession>, EngineError>;
}

/// Fetches the engine's binary payload and initializes the module from it.
///
/// Timeout policy for the fetch belongs to the implementation; the adapter
/// awaits to completion or failure.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Fetch the opaque binary payload.
    async fn fetch_payload(&self) -> Result<Vec<u8>, GateError>;

    /// Initialize the module from the fetched payload.
    async fn initialize(&self, payload: Vec<u8>) -> Result<Arc<dyn EngineModule>, GateError>;
}
