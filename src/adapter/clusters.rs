//! Cluster & order protocol
//!
//! Builds cluster records from host citations, keeps the session's
//! document order in step with the host's, and owns the full-rebuild
//! recovery path. The session never infers order from insertion order —
//! the complete ordered sequence is resent on every change.

use super::citation::{effective_note, Citation, ClusterPlacement};
use super::driver::{CitationProcessor, ProcessorError};
use crate::engine::{
    Cite, ClusterRecord, EngineSession, OrderEntry, OutputFormat, UncitedSelection,
};
use crate::host::{CitationHost, ItemId};
use tracing::debug;

/// Length of generated cluster identifiers.
const GENERATED_ID_LENGTH: usize = 10;

/// Resolve each citation item through the host, upsert the reference into
/// the session, and emit one cite per item in input order. Duplicates are
/// submitted per occurrence; the session's upsert is idempotent.
fn build_cites(
    session: &mut dyn EngineSession,
    host: &dyn CitationHost,
    citation: &Citation,
) -> Result<Vec<Cite>, ProcessorError> {
    let mut cites = Vec::with_capacity(citation.citation_items.len());
    for item in &citation.citation_items {
        let mut reference = host.retrieve_item(&item.id)?;
        let reference_id = reference.id.as_engine_id();
        reference.id = ItemId::Text(reference_id.clone());
        debug!(id = %reference_id, "insert reference");
        session.insert_reference(reference)?;
        cites.push(Cite::new(reference_id));
    }
    Ok(cites)
}

/// Keep the citation's identifier, or generate one through the host.
fn assign_citation_id(
    host: &dyn CitationHost,
    citation: &mut Citation,
) -> Result<String, ProcessorError> {
    match &citation.citation_id {
        Some(id) => Ok(id.clone()),
        None => {
            let id = host.random_cluster_id(GENERATED_ID_LENGTH)?;
            citation.citation_id = Some(id.clone());
            Ok(id)
        }
    }
}

impl CitationProcessor {
    /// Insert (or update) one cluster from a host citation.
    ///
    /// Assigns an identifier when the citation lacks one, writing it back
    /// so the host sees it. Returns the record as submitted to the
    /// session.
    pub async fn insert_cluster(
        &mut self,
        citation: &mut Citation,
    ) -> Result<ClusterRecord, ProcessorError> {
        let host = self.host();
        let host_id = assign_citation_id(host.as_ref(), citation)?;
        let key = self.ids.session_key(&host_id);
        let session = self.ensure_session().await?;
        let cites = build_cites(session, host.as_ref(), citation)?;
        let cluster = ClusterRecord { id: key, cites };
        debug!(id = %cluster.id, cites = cluster.cites.len(), "insert cluster");
        session.insert_cluster(cluster.clone())?;
        Ok(cluster)
    }

    /// Replace the session's document order wholesale.
    ///
    /// Must be called after any change to which clusters exist, their
    /// relative position, or their note placement.
    pub async fn set_cluster_order(
        &mut self,
        placements: &[ClusterPlacement],
    ) -> Result<(), ProcessorError> {
        let mut order = Vec::with_capacity(placements.len());
        for (host_id, note) in placements {
            order.push(OrderEntry {
                id: self.ids.session_key(host_id),
                note: effective_note(note),
            });
        }
        debug!(clusters = order.len(), "set cluster order");
        let session = self.ensure_session().await?;
        session.set_cluster_order(order)?;
        Ok(())
    }

    /// Render a citation as it would appear between `pre` and `post`,
    /// without persisting cluster or order state.
    ///
    /// Reference upserts are not rolled back — the session's reference
    /// set may grow. No cleanup call is required afterwards.
    pub async fn preview_citation_cluster(
        &mut self,
        citation: &mut Citation,
        pre: &[ClusterPlacement],
        post: &[ClusterPlacement],
        format: Option<OutputFormat>,
    ) -> Result<String, ProcessorError> {
        let host = self.host();
        let host_id = assign_citation_id(host.as_ref(), citation)?;
        let preview_key = self.ids.preview_key(&host_id);

        // Synthetic order: pre ++ [this] ++ post.
        let mut order = Vec::with_capacity(pre.len() + post.len() + 1);
        for (id, note) in pre {
            order.push(OrderEntry {
                id: self.ids.session_key(id),
                note: effective_note(note),
            });
        }
        order.push(OrderEntry {
            id: preview_key.clone(),
            note: citation.note_index(),
        });
        for (id, note) in post {
            order.push(OrderEntry {
                id: self.ids.session_key(id),
                note: effective_note(note),
            });
        }

        let session = self.ensure_session().await?;
        let cites = build_cites(session, host.as_ref(), citation)?;
        let cluster = ClusterRecord {
            id: preview_key,
            cites,
        };
        debug!(id = %cluster.id, "preview cluster");
        let rendered = session.preview_cluster(cluster, order, format)?;
        Ok(rendered)
    }

    /// Full resynchronization: reset the session and repopulate it from
    /// the complete document state. The only operation allowed to discard
    /// and rebuild session state in one call; the recovery path after any
    /// detected desynchronization.
    pub async fn rebuild_processor_state(
        &mut self,
        citations: &mut [Citation],
        format: OutputFormat,
        uncited: &[ItemId],
    ) -> Result<(), ProcessorError> {
        debug!(clusters = citations.len(), %format, "rebuild processor state");
        // A rebuild always starts from a clean session, format change or
        // not.
        self.force_format(format);
        self.reset_session().await?;

        let mut placements = Vec::with_capacity(citations.len());
        for citation in citations.iter_mut() {
            self.insert_cluster(citation).await?;
            if let Some(id) = &citation.citation_id {
                placements.push((id.clone(), citation.properties.note_index.clone()));
            }
        }
        self.set_cluster_order(&placements).await?;
        self.update_uncited_items(uncited).await
    }

    /// Replace the uncited reference set — never additive.
    pub async fn update_uncited_items(
        &mut self,
        item_ids: &[ItemId],
    ) -> Result<(), ProcessorError> {
        let host = self.host();
        let session = self.ensure_session().await?;
        let mut reference_ids = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            let mut reference = host.retrieve_item(id)?;
            let reference_id = reference.id.as_engine_id();
            reference.id = ItemId::Text(reference_id.clone());
            debug!(id = %reference_id, "insert reference");
            session.insert_reference(reference)?;
            reference_ids.push(reference_id);
        }
        debug!(count = reference_ids.len(), "include uncited");
        session.include_uncited(UncitedSelection::Specific(reference_ids))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::citation::NoteIndex;
    use crate::adapter::config::StyleConfig;
    use crate::engine::{ClusterKey, MockEngine, MockLoader, ReadinessGate};
    use crate::host::{MockHost, Reference};
    use std::sync::Arc;

    fn processor_with(host: Arc<MockHost>) -> (Arc<MockEngine>, CitationProcessor) {
        let engine = Arc::new(MockEngine::new());
        let gate = Arc::new(ReadinessGate::new(Box::new(MockLoader::for_engine(
            engine.clone(),
        ))));
        let processor =
            CitationProcessor::new(gate, host, StyleConfig::new("<style/>", "en-US"));
        (engine, processor)
    }

    fn host_with_items() -> Arc<MockHost> {
        Arc::new(
            MockHost::new()
                .with_locale("en-US", "<locale/>")
                .with_item(Reference::new(1).with_field("title", serde_json::json!("First")))
                .with_item(Reference::new("book-2").with_field("title", serde_json::json!("Second"))),
        )
    }

    #[tokio::test]
    async fn insert_cluster_builds_stringified_cites() {
        let (_, mut processor) = processor_with(host_with_items());
        let mut citation = Citation::new().with_id("c1").with_item(1).with_note_index(0);

        let cluster = processor.insert_cluster(&mut citation).await.unwrap();
        assert_eq!(cluster.id, ClusterKey::Text("c1".into()));
        assert_eq!(cluster.cites, vec![Cite::new("1")]);
        assert_eq!(cluster.cites[0].locator, None);
        assert_eq!(cluster.cites[0].locators, None);

        // Note index 0 is treated as absent.
        processor
            .set_cluster_order(&[("c1".into(), Some(0.into()))])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_citation_id_is_generated_and_written_back() {
        let (_, mut processor) = processor_with(host_with_items());
        let mut citation = Citation::new().with_item(1);

        processor.insert_cluster(&mut citation).await.unwrap();
        let id = citation.citation_id.clone().unwrap();
        assert_eq!(id.len(), GENERATED_ID_LENGTH);
    }

    #[tokio::test]
    async fn duplicate_items_produce_one_cite_per_occurrence() {
        let (_, mut processor) = processor_with(host_with_items());
        let mut citation = Citation::new().with_id("c1").with_item(1).with_item(1);

        let cluster = processor.insert_cluster(&mut citation).await.unwrap();
        assert_eq!(cluster.cites, vec![Cite::new("1"), Cite::new("1")]);
    }

    #[tokio::test]
    async fn unknown_item_fails_the_whole_operation() {
        let (_, mut processor) = processor_with(host_with_items());
        let mut citation = Citation::new().with_id("c1").with_item(99);

        let err = processor.insert_cluster(&mut citation).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Host(_)));
    }

    #[tokio::test]
    async fn string_note_indices_are_coerced() {
        let (_, mut processor) = processor_with(host_with_items());
        let mut c1 = Citation::new().with_id("c1").with_item(1);
        processor.insert_cluster(&mut c1).await.unwrap();

        processor
            .set_cluster_order(&[("c1".into(), Some(NoteIndex::Text("3".into())))])
            .await
            .unwrap();
        let updates = processor.batched_updates().await.unwrap();
        assert_eq!(updates.clusters[0].1, "[1] 1 (note 3)");
    }

    #[tokio::test]
    async fn uncited_items_replace_the_previous_set() {
        let (_, mut processor) = processor_with(host_with_items());
        processor
            .update_uncited_items(&[ItemId::Number(1)])
            .await
            .unwrap();
        processor
            .update_uncited_items(&[ItemId::Text("book-2".into())])
            .await
            .unwrap();

        let (_, entries) = processor.make_bibliography().await.unwrap();
        assert_eq!(entries, vec!["Second".to_string()]);
    }
}
