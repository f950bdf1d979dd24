//! Abstract surface of the wrapped formatting engine
//!
//! The engine itself is an external collaborator. This module defines the
//! traits the adapter consumes — module loading, session construction, and
//! the session call contract — plus the one-time readiness gate and a
//! behavioral mock for tests.

pub mod mock;
mod module;
mod ready;
mod session;

pub use mock::{MockEngine, MockLoader, MockSession};
pub use module::{EngineModule, GateError, LocaleFetcher, ModuleLoader, SessionInit};
pub use ready::ReadinessGate;
pub use session::{
    BibliographyEntry, BibliographyMeta, BibliographyUpdate, Cite, ClusterKey, ClusterRecord,
    EngineError, EngineSession, FormatMeta, OrderEntry, OutputFormat, UncitedSelection,
    UpdateSummary,
};
