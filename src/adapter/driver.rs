//! CitationProcessor: session lifecycle and construction
//!
//! Owns at most one live engine session. The session is constructed
//! lazily behind a guard — every data-touching operation repairs a
//! missing handle instead of failing on it — and is torn down and rebuilt
//! on format changes and full rebuilds. Teardown always precedes
//! replacement construction.

use super::config::StyleConfig;
use super::ids::IdScheme;
use crate::engine::{
    EngineError, EngineSession, GateError, LocaleFetcher, OutputFormat, ReadinessGate, SessionInit,
};
use crate::host::{CitationHost, HostError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by processor operations.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The engine module failed to load or initialize. Terminal: every
    /// instance sharing the gate fails identically from here on.
    #[error("formatting engine unavailable: {0}")]
    Readiness(#[from] GateError),

    /// The engine rejected the style source or configuration at session
    /// construction. Retryable after correcting the configuration.
    #[error("session construction failed: {0}")]
    SessionConstruction(#[source] EngineError),

    /// An individual session call was rejected. The session is left in
    /// whatever partial state the engine produced; recovery is
    /// `rebuild_processor_state`.
    #[error("engine operation failed: {0}")]
    Engine(#[from] EngineError),

    /// A host collaborator failed to resolve an item or locale.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The session reported a cluster key with no host mapping.
    #[error("unknown cluster: {0}")]
    UnknownCluster(String),
}

/// Locale callback injected into the session. When the override flag is
/// set, every requested language tag is short-circuited to the configured
/// locale before delegating to the host.
struct LocaleProxy {
    host: Arc<dyn CitationHost>,
    forced: Option<String>,
}

impl LocaleFetcher for LocaleProxy {
    fn fetch_locale(&self, lang: &str) -> Result<String, HostError> {
        let lang = self.forced.as_deref().unwrap_or(lang);
        self.host.retrieve_locale(lang)
    }
}

/// The adapter between a document host and the formatting engine.
///
/// Mutating operations take `&mut self`; one instance must not be driven
/// concurrently, and the borrow rules enforce that. The readiness gate is
/// the only component designed for concurrent callers.
pub struct CitationProcessor {
    gate: Arc<ReadinessGate>,
    host: Arc<dyn CitationHost>,
    config: StyleConfig,
    pub(crate) ids: IdScheme,
    session: Option<Box<dyn EngineSession>>,
}

impl CitationProcessor {
    pub fn new(gate: Arc<ReadinessGate>, host: Arc<dyn CitationHost>, config: StyleConfig) -> Self {
        Self {
            gate,
            host,
            config,
            ids: IdScheme::passthrough(),
            session: None,
        }
    }

    /// Select the identifier scheme (for the numeric session protocol).
    pub fn with_id_scheme(mut self, ids: IdScheme) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn output_format(&self) -> OutputFormat {
        self.config.format
    }

    pub(crate) fn host(&self) -> Arc<dyn CitationHost> {
        Arc::clone(&self.host)
    }

    /// Guard rule: construct the session if absent, then hand it out.
    ///
    /// Suspends only when the engine module has not been awaited yet;
    /// afterwards every operation runs synchronously against the live
    /// session.
    pub(crate) async fn ensure_session(
        &mut self,
    ) -> Result<&mut dyn EngineSession, ProcessorError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let module = self.gate.ensure_ready().await?;
                debug!("new session");
                let locales = LocaleProxy {
                    host: Arc::clone(&self.host),
                    forced: self
                        .config
                        .override_locale
                        .then(|| self.config.locale.clone()),
                };
                module
                    .new_session(SessionInit {
                        style: self.config.style.clone(),
                        format: self.config.format,
                        locales: Box::new(locales),
                    })
                    .map_err(ProcessorError::SessionConstruction)?
            }
        };
        Ok(&mut **self.session.insert(session))
    }

    /// Tear down any live session and construct a fresh one.
    ///
    /// The old session is dropped (releasing its engine resources) before
    /// the replacement is built. Nothing survives: references, clusters,
    /// order, and the identifier table are all gone; callers repopulate.
    pub async fn reset_session(&mut self) -> Result<(), ProcessorError> {
        if self.session.take().is_some() {
            debug!("free session");
        }
        self.ids.clear();
        self.ensure_session().await?;
        Ok(())
    }

    /// Switch output format, rebuilding the session if it differs.
    ///
    /// No-op when the format is unchanged — the live session and all its
    /// data stay untouched.
    pub async fn set_output_format(&mut self, format: OutputFormat) -> Result<(), ProcessorError> {
        if self.config.format == format {
            return Ok(());
        }
        debug!(%format, "output format change");
        self.config.format = format;
        self.reset_session().await
    }

    /// Set the format field directly without comparing. Used by rebuilds,
    /// which reset unconditionally.
    pub(crate) fn force_format(&mut self, format: OutputFormat) {
        self.config.format = format;
    }
}
