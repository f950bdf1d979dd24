//! Citebridge: citation-engine adapter
//!
//! Keeps a document host's citation clusters in sync with an external
//! citation-formatting engine across an asynchronous, fallible boundary.
//! The host and the engine are independently-versioned state machines;
//! this crate owns the translation between them — identifier mapping,
//! session lifecycle, cluster/order submission, and result-shape
//! normalization — while delegating all formatting to the engine.
//!
//! # Core Concepts
//!
//! - **Processor**: one adapter instance owning one live engine session
//! - **Session**: the engine-side handle holding references, clusters, and
//!   document order for one style configuration
//! - **Readiness gate**: process-wide one-time engine module load shared by
//!   every processor
//!
//! # Example
//!
//! ```
//! use citebridge::{
//!     Citation, CitationProcessor, MockEngine, MockHost, MockLoader, ReadinessGate, Reference,
//!     StyleConfig,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = Arc::new(MockEngine::new());
//! let gate = Arc::new(ReadinessGate::new(Box::new(MockLoader::for_engine(engine))));
//! let host = Arc::new(
//!     MockHost::new()
//!         .with_locale("en-US", "<locale/>")
//!         .with_item(Reference::new(1)),
//! );
//!
//! let mut processor =
//!     CitationProcessor::new(gate, host, StyleConfig::new("<style/>", "en-US"));
//! let mut citation = Citation::new().with_id("c1").with_item(1);
//! let cluster = processor.insert_cluster(&mut citation).await.unwrap();
//! assert_eq!(cluster.cites.len(), 1);
//! # }
//! ```

mod adapter;
pub mod engine;
pub mod host;

pub use adapter::{
    BatchedUpdates, Citation, CitationItem, CitationProcessor, CitationProperties,
    ClusterPlacement, HostBibliographyMeta, IdScheme, NoteIndex, ProcessorError, StyleConfig,
};
pub use engine::{
    BibliographyEntry, BibliographyMeta, BibliographyUpdate, Cite, ClusterKey, ClusterRecord,
    EngineError, EngineModule, EngineSession, FormatMeta, GateError, LocaleFetcher, MockEngine,
    MockLoader, MockSession, ModuleLoader, OrderEntry, OutputFormat, ReadinessGate, SessionInit,
    UncitedSelection, UpdateSummary,
};
pub use host::{CitationHost, HostError, ItemId, MockHost, Reference};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
