//! Mock engine for testing — returns deterministic renders
//!
//! `MockLoader` stands in for the payload fetch, `MockEngine` for the
//! initialized module, and `MockSession` for the live handle. The session
//! is behavioral: it stores references, clusters, order, and the uncited
//! set, renders position-dependent output, and diffs renders between
//! `batched_updates` calls — enough to exercise every adapter contract
//! without the real engine.

use super::module::{EngineModule, GateError, ModuleLoader, SessionInit};
use super::session::{
    BibliographyEntry, BibliographyMeta, BibliographyUpdate, Cite, ClusterKey, ClusterRecord,
    EngineError, EngineSession, FormatMeta, OrderEntry, OutputFormat, UncitedSelection,
    UpdateSummary,
};
use crate::host::Reference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Language tag the mock session resolves while "parsing" a style, the way
/// a real engine pulls its default terms.
const STYLE_LOCALE: &str = "en-US";

/// Mock payload loader. Either hands out a fixed payload and a shared
/// `MockEngine`, or fails every load with a preconfigured error.
pub struct MockLoader {
    engine: Option<Arc<MockEngine>>,
    failure: Option<GateError>,
    fetches: Arc<AtomicUsize>,
}

impl MockLoader {
    /// A loader that initializes the given engine.
    pub fn for_engine(engine: Arc<MockEngine>) -> Self {
        Self {
            engine: Some(engine),
            failure: None,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A loader whose every load fails with `error`.
    pub fn failing(error: GateError) -> Self {
        Self {
            engine: None,
            failure: Some(error),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of fetch attempts, shared with the caller.
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl ModuleLoader for MockLoader {
    async fn fetch_payload(&self) -> Result<Vec<u8>, GateError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(vec![0u8; 8]),
        }
    }

    async fn initialize(&self, _payload: Vec<u8>) -> Result<Arc<dyn EngineModule>, GateError> {
        match &self.engine {
            Some(engine) => Ok(engine.clone()),
            None => Err(self
                .failure
                .clone()
                .unwrap_or_else(|| GateError::Initialize("no engine configured".into()))),
        }
    }
}

/// Mock module: counts constructed and live sessions so tests can observe
/// lifecycle behavior (no-op format changes, teardown before rebuild).
#[derive(Default, Debug)]
pub struct MockEngine {
    sessions_created: AtomicUsize,
    live_sessions: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total sessions ever constructed.
    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    /// Sessions currently alive (constructed and not yet dropped).
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }
}

impl EngineModule for MockEngine {
    fn new_session(&self, init: SessionInit) -> Result<Box<dyn EngineSession>, EngineError> {
        if init.style.trim().is_empty() {
            return Err(EngineError::new("style source is empty"));
        }
        // A real engine resolves its default terms while parsing the style.
        let locale = init
            .locales
            .fetch_locale(STYLE_LOCALE)
            .map_err(|e| EngineError::new(format!("locale fetch failed: {}", e)))?;

        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            format: init.format,
            locale,
            references: HashMap::new(),
            clusters: HashMap::new(),
            order: Vec::new(),
            uncited: UncitedSelection::Specific(Vec::new()),
            last_rendered: HashMap::new(),
            last_bibliography: HashMap::new(),
            live: self.live_sessions.clone(),
        }))
    }
}

/// Behavioral mock session.
#[derive(Debug)]
pub struct MockSession {
    format: OutputFormat,
    #[allow(dead_code)]
    locale: String,
    references: HashMap<String, Reference>,
    clusters: HashMap<ClusterKey, Vec<Cite>>,
    order: Vec<OrderEntry>,
    uncited: UncitedSelection,
    last_rendered: HashMap<ClusterKey, String>,
    last_bibliography: HashMap<String, String>,
    live: Arc<AtomicUsize>,
}

impl MockSession {
    fn render(&self, position: usize, note: Option<u32>, cites: &[Cite], format: OutputFormat) -> String {
        let ids: Vec<&str> = cites.iter().map(|c| c.id.as_str()).collect();
        let mut body = format!("[{}] {}", position + 1, ids.join("; "));
        if let Some(note) = note {
            body = format!("{} (note {})", body, note);
        }
        match format {
            OutputFormat::Html => format!("<span>{}</span>", body),
            OutputFormat::Rtf | OutputFormat::Plain => body,
        }
    }

    /// Current render of every in-order cluster.
    fn current_renders(&self) -> Vec<(ClusterKey, String)> {
        self.order
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                self.clusters.get(&entry.id).map(|cites| {
                    let text = self.render(position, entry.note, cites, self.format);
                    (entry.id.clone(), text)
                })
            })
            .collect()
    }

    fn entry_value(&self, id: &str) -> String {
        let title = self
            .references
            .get(id)
            .and_then(|r| r.fields.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or(id);
        match self.format {
            OutputFormat::Html => format!("<div>{}</div>", title),
            OutputFormat::Rtf | OutputFormat::Plain => title.to_string(),
        }
    }

    /// Cited ids in document order, then uncited ids not already present.
    fn bibliography_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for entry in &self.order {
            if let Some(cites) = self.clusters.get(&entry.id) {
                for cite in cites {
                    if !ids.contains(&cite.id) {
                        ids.push(cite.id.clone());
                    }
                }
            }
        }
        match &self.uncited {
            UncitedSelection::All => {
                let mut extra: Vec<String> = self
                    .references
                    .keys()
                    .filter(|id| !ids.contains(id))
                    .cloned()
                    .collect();
                extra.sort();
                ids.extend(extra);
            }
            UncitedSelection::Specific(uncited) => {
                for id in uncited {
                    if !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
            }
        }
        ids
    }

    fn format_meta(&self) -> FormatMeta {
        match self.format {
            OutputFormat::Rtf => FormatMeta {
                markup_pre: "{\\rtf ".into(),
                markup_post: "}".into(),
            },
            OutputFormat::Html => FormatMeta {
                markup_pre: "<div class=\"csl-bib-body\">".into(),
                markup_post: "</div>".into(),
            },
            OutputFormat::Plain => FormatMeta::default(),
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EngineSession for MockSession {
    fn insert_reference(&mut self, reference: Reference) -> Result<(), EngineError> {
        let id = reference.id.as_engine_id();
        if id.is_empty() {
            return Err(EngineError::new("reference id is empty"));
        }
        self.references.insert(id, reference);
        Ok(())
    }

    fn insert_cluster(&mut self, cluster: ClusterRecord) -> Result<(), EngineError> {
        for cite in &cluster.cites {
            if !self.references.contains_key(&cite.id) {
                return Err(EngineError::new(format!("unknown reference: {}", cite.id)));
            }
        }
        self.clusters.insert(cluster.id, cluster.cites);
        Ok(())
    }

    fn set_cluster_order(&mut self, order: Vec<OrderEntry>) -> Result<(), EngineError> {
        for entry in &order {
            if !self.clusters.contains_key(&entry.id) {
                return Err(EngineError::new(format!("unknown cluster: {}", entry.id)));
            }
        }
        self.order = order;
        Ok(())
    }

    fn preview_cluster(
        &mut self,
        cluster: ClusterRecord,
        order: Vec<OrderEntry>,
        format: Option<OutputFormat>,
    ) -> Result<String, EngineError> {
        for cite in &cluster.cites {
            if !self.references.contains_key(&cite.id) {
                return Err(EngineError::new(format!("unknown reference: {}", cite.id)));
            }
        }
        let position = order
            .iter()
            .position(|entry| entry.id == cluster.id)
            .ok_or_else(|| EngineError::new("preview cluster missing from order"))?;
        let note = order[position].note;
        Ok(self.render(position, note, &cluster.cites, format.unwrap_or(self.format)))
    }

    fn batched_updates(&mut self) -> Result<UpdateSummary, EngineError> {
        let current = self.current_renders();
        let mut clusters = Vec::new();
        for (id, text) in &current {
            if self.last_rendered.get(id) != Some(text) {
                clusters.push((id.clone(), text.clone()));
            }
        }
        self.last_rendered = current.into_iter().collect();

        let mut current_bibliography = HashMap::new();
        for id in self.bibliography_ids() {
            let value = self.entry_value(&id);
            current_bibliography.insert(id, value);
        }
        let mut updated_entries = HashMap::new();
        for (id, value) in &current_bibliography {
            if self.last_bibliography.get(id) != Some(value) {
                updated_entries.insert(id.clone(), value.clone());
            }
        }
        let bibliography = if updated_entries.is_empty()
            && self.last_bibliography.len() == current_bibliography.len()
        {
            None
        } else {
            Some(BibliographyUpdate {
                updated_entries,
                entry_ids: Some(self.bibliography_ids()),
            })
        };
        self.last_bibliography = current_bibliography;

        Ok(UpdateSummary {
            clusters,
            bibliography,
        })
    }

    fn include_uncited(&mut self, selection: UncitedSelection) -> Result<(), EngineError> {
        self.uncited = selection;
        Ok(())
    }

    fn bibliography_meta(&mut self) -> Result<BibliographyMeta, EngineError> {
        let max_offset = self
            .bibliography_ids()
            .iter()
            .map(|id| id.len() as u32)
            .max()
            .unwrap_or(0);
        Ok(BibliographyMeta {
            max_offset,
            line_spacing: 1,
            entry_spacing: 1,
            hanging_indent: false,
            second_field_align: None,
            format_meta: Some(self.format_meta()),
        })
    }

    fn make_bibliography(&mut self) -> Result<Vec<BibliographyEntry>, EngineError> {
        Ok(self
            .bibliography_ids()
            .into_iter()
            .map(|id| {
                let value = self.entry_value(&id);
                BibliographyEntry { id, value }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::module::LocaleFetcher;
    use crate::host::HostError;

    struct FixedLocale;

    impl LocaleFetcher for FixedLocale {
        fn fetch_locale(&self, _lang: &str) -> Result<String, HostError> {
            Ok("<locale/>".into())
        }
    }

    fn session() -> Box<dyn EngineSession> {
        let engine = MockEngine::new();
        engine
            .new_session(SessionInit {
                style: "<style/>".into(),
                format: OutputFormat::Plain,
                locales: Box::new(FixedLocale),
            })
            .unwrap()
    }

    fn cite(id: &str) -> Cite {
        Cite::new(id)
    }

    #[test]
    fn empty_style_is_rejected_at_construction() {
        let engine = MockEngine::new();
        let result = engine.new_session(SessionInit {
            style: "   ".into(),
            format: OutputFormat::Rtf,
            locales: Box::new(FixedLocale),
        });
        assert!(result.is_err());
        assert_eq!(engine.sessions_created(), 0);
    }

    #[test]
    fn cluster_with_unknown_reference_is_rejected() {
        let mut session = session();
        let result = session.insert_cluster(ClusterRecord {
            id: ClusterKey::Text("c1".into()),
            cites: vec![cite("missing")],
        });
        assert!(result.is_err());
    }

    #[test]
    fn renders_depend_on_position() {
        let mut session = session();
        session.insert_reference(Reference::new("a")).unwrap();
        session.insert_reference(Reference::new("b")).unwrap();
        session
            .insert_cluster(ClusterRecord {
                id: ClusterKey::Text("c1".into()),
                cites: vec![cite("a")],
            })
            .unwrap();
        session
            .insert_cluster(ClusterRecord {
                id: ClusterKey::Text("c2".into()),
                cites: vec![cite("b")],
            })
            .unwrap();
        session
            .set_cluster_order(vec![
                OrderEntry {
                    id: ClusterKey::Text("c1".into()),
                    note: None,
                },
                OrderEntry {
                    id: ClusterKey::Text("c2".into()),
                    note: None,
                },
            ])
            .unwrap();

        let summary = session.batched_updates().unwrap();
        assert_eq!(
            summary.clusters,
            vec![
                (ClusterKey::Text("c1".into()), "[1] a".to_string()),
                (ClusterKey::Text("c2".into()), "[2] b".to_string()),
            ]
        );

        // No change: second pull is empty.
        let summary = session.batched_updates().unwrap();
        assert!(summary.clusters.is_empty());
    }

    #[test]
    fn dropped_sessions_decrement_live_count() {
        let engine = MockEngine::new();
        let session = engine
            .new_session(SessionInit {
                style: "<style/>".into(),
                format: OutputFormat::Rtf,
                locales: Box::new(FixedLocale),
            })
            .unwrap();
        assert_eq!(engine.live_sessions(), 1);
        drop(session);
        assert_eq!(engine.live_sessions(), 0);
        assert_eq!(engine.sessions_created(), 1);
    }
}
