//! EngineSession trait and the session-facing wire types
//!
//! A session is the live stateful handle inside the formatting engine. It
//! holds every inserted reference, cluster, and the document order for one
//! style configuration. All calls are synchronous and fallible; the engine
//! releases session resources on drop.

use crate::host::Reference;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// An error reported by the wrapped engine.
///
/// The engine is opaque; the adapter never interprets the message, it only
/// carries it to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rendered output formats the engine can produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Rtf,
    Html,
    Plain,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rtf => "rtf",
            Self::Html => "html",
            Self::Plain => "plain",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-facing cluster identifier.
///
/// The current session protocol accepts the host's string identifiers
/// directly (`Text`); an earlier protocol required dense numeric ids
/// (`Number`). Both shapes are opaque — never parsed, never assumed ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterKey {
    Text(String),
    Number(u32),
}

impl std::fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(id) => f.write_str(id),
            Self::Number(id) => write!(f, "{}", id),
        }
    }
}

/// One reference within a cluster. `locator` and `locators` are a reserved
/// extension point and are never set by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cite {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locators: Option<serde_json::Value>,
}

impl Cite {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: None,
            locators: None,
        }
    }
}

/// A cluster as submitted to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: ClusterKey,
    pub cites: Vec<Cite>,
}

/// One entry in the document-order sequence. The full ordered list is the
/// single source of truth for document order; it is resent wholesale on
/// every change. `note` is omitted for clusters not placed in a footnote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub id: ClusterKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<u32>,
}

/// Which references to include in the bibliography without being cited.
/// The adapter always submits `Specific` as a complete replacement set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UncitedSelection {
    All,
    Specific(Vec<String>),
}

/// The engine-computed minimal diff since the previous `batched_updates`
/// call: clusters whose rendered text changed, plus an optional
/// bibliography delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub clusters: Vec<(ClusterKey, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibliography: Option<BibliographyUpdate>,
}

/// Bibliography portion of an update summary, passed through to the host
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibliographyUpdate {
    #[serde(default)]
    pub updated_entries: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_ids: Option<Vec<String>>,
}

/// Bibliography layout parameters in the engine's native schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibliographyMeta {
    pub max_offset: u32,
    pub line_spacing: u32,
    pub entry_spacing: u32,
    pub hanging_indent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_field_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_meta: Option<FormatMeta>,
}

/// Markup the host should emit before and after the bibliography body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatMeta {
    pub markup_pre: String,
    pub markup_post: String,
}

/// One rendered bibliography entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibliographyEntry {
    pub id: String,
    pub value: String,
}

/// The live stateful handle inside the formatting engine.
///
/// At most one session is live per adapter instance. Reconstructing a
/// session discards all previously inserted references, clusters, and
/// order; callers are responsible for fully repopulating it.
pub trait EngineSession: Send + std::fmt::Debug {
    /// Upsert one reference. Idempotent per reference id.
    fn insert_reference(&mut self, reference: Reference) -> Result<(), EngineError>;

    /// Insert or update one cluster.
    fn insert_cluster(&mut self, cluster: ClusterRecord) -> Result<(), EngineError>;

    /// Replace the document order wholesale. The session does not infer
    /// order from insertion order.
    fn set_cluster_order(&mut self, order: Vec<OrderEntry>) -> Result<(), EngineError>;

    /// Render a hypothetical cluster at the given position without
    /// persisting cluster or order state.
    fn preview_cluster(
        &mut self,
        cluster: ClusterRecord,
        order: Vec<OrderEntry>,
        format: Option<OutputFormat>,
    ) -> Result<String, EngineError>;

    /// Return the diff of clusters whose rendered output changed since the
    /// previous call. The session tracks this internally.
    fn batched_updates(&mut self) -> Result<UpdateSummary, EngineError>;

    /// Replace the uncited reference set.
    fn include_uncited(&mut self, selection: UncitedSelection) -> Result<(), EngineError>;

    /// Fetch bibliography layout parameters.
    fn bibliography_meta(&mut self) -> Result<BibliographyMeta, EngineError>;

    /// Render the full bibliography.
    fn make_bibliography(&mut self) -> Result<Vec<BibliographyEntry>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_key_serializes_untagged() {
        let text = serde_json::to_value(ClusterKey::Text("c1".into())).unwrap();
        assert_eq!(text, serde_json::json!("c1"));

        let number = serde_json::to_value(ClusterKey::Number(3)).unwrap();
        assert_eq!(number, serde_json::json!(3));
    }

    #[test]
    fn order_entry_omits_absent_note() {
        let entry = OrderEntry {
            id: ClusterKey::Text("c1".into()),
            note: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, serde_json::json!({ "id": "c1" }));

        let noted = OrderEntry {
            id: ClusterKey::Text("c1".into()),
            note: Some(4),
        };
        let value = serde_json::to_value(&noted).unwrap();
        assert_eq!(value, serde_json::json!({ "id": "c1", "note": 4 }));
    }

    #[test]
    fn uncited_selection_wire_shape() {
        let specific = UncitedSelection::Specific(vec!["a".into(), "b".into()]);
        let value = serde_json::to_value(&specific).unwrap();
        assert_eq!(value, serde_json::json!({ "Specific": ["a", "b"] }));

        let all = serde_json::to_value(UncitedSelection::All).unwrap();
        assert_eq!(all, serde_json::json!("All"));
    }

    #[test]
    fn cite_omits_unset_locators() {
        let cite = Cite::new("ref-1");
        let value = serde_json::to_value(&cite).unwrap();
        assert_eq!(value, serde_json::json!({ "id": "ref-1" }));
    }

    #[test]
    fn bibliography_meta_uses_camel_case_wire_names() {
        let meta = BibliographyMeta {
            max_offset: 4,
            line_spacing: 1,
            entry_spacing: 2,
            hanging_indent: true,
            second_field_align: Some("flush".into()),
            format_meta: Some(FormatMeta {
                markup_pre: "<div>".into(),
                markup_post: "</div>".into(),
            }),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["maxOffset"], 4);
        assert_eq!(value["hangingIndent"], true);
        assert_eq!(value["formatMeta"]["markupPre"], "<div>");
    }
}
