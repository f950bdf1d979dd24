//! Host-shaped citation data
//!
//! The host's wire schema predates this adapter: camel-cased keys, item
//! ids that are numbers or strings, and note indices that arrive as
//! integers or decimal strings. These types absorb those quirks at the
//! deserialization boundary so the rest of the adapter works with clean
//! shapes.

use crate::host::ItemId;
use serde::{Deserialize, Serialize};

/// A footnote index as the host sends it: an integer, or a decimal string.
/// Zero and unparseable values both mean "not in a note".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteIndex {
    Number(u32),
    Text(String),
}

impl NoteIndex {
    /// Coerce to an integer; unparseable strings collapse to zero.
    pub fn resolved(&self) -> u32 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

impl From<u32> for NoteIndex {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

/// Coerced note index with zero treated as absent.
pub(crate) fn effective_note(note: &Option<NoteIndex>) -> Option<u32> {
    note.as_ref().map(NoteIndex::resolved).filter(|n| *n > 0)
}

/// One in-text citation point as the host sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Host-assigned identifier; generated on first insertion when absent.
    #[serde(rename = "citationID", default, skip_serializing_if = "Option::is_none")]
    pub citation_id: Option<String>,
    #[serde(rename = "citationItems", default)]
    pub citation_items: Vec<CitationItem>,
    #[serde(default)]
    pub properties: CitationProperties,
}

impl Citation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.citation_id = Some(id.into());
        self
    }

    pub fn with_item(mut self, id: impl Into<ItemId>) -> Self {
        self.citation_items.push(CitationItem::new(id));
        self
    }

    pub fn with_note_index(mut self, note: impl Into<NoteIndex>) -> Self {
        self.properties.note_index = Some(note.into());
        self
    }

    /// The coerced note index, zero treated as absent.
    pub fn note_index(&self) -> Option<u32> {
        effective_note(&self.properties.note_index)
    }
}

/// One item within a citation. Locator fields ride along in `extra` as a
/// reserved extension point; the adapter does not interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationItem {
    pub id: ItemId,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CitationItem {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Citation placement properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationProperties {
    #[serde(rename = "noteIndex", default, skip_serializing_if = "Option::is_none")]
    pub note_index: Option<NoteIndex>,
}

/// A citation's position in the document as the host reports it for
/// ordering: (cluster identifier, note index).
pub type ClusterPlacement = (String, Option<NoteIndex>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_index_coerces_strings() {
        assert_eq!(NoteIndex::Number(3).resolved(), 3);
        assert_eq!(NoteIndex::Text("4".into()).resolved(), 4);
        assert_eq!(NoteIndex::Text(" 5 ".into()).resolved(), 5);
        assert_eq!(NoteIndex::Text("not a number".into()).resolved(), 0);
    }

    #[test]
    fn zero_and_unparseable_notes_are_absent() {
        assert_eq!(effective_note(&None), None);
        assert_eq!(effective_note(&Some(NoteIndex::Number(0))), None);
        assert_eq!(effective_note(&Some(NoteIndex::Text("x".into()))), None);
        assert_eq!(effective_note(&Some(NoteIndex::Number(2))), Some(2));
        assert_eq!(effective_note(&Some(NoteIndex::Text("7".into()))), Some(7));
    }

    #[test]
    fn citation_deserializes_host_wire_names() {
        let citation: Citation = serde_json::from_value(serde_json::json!({
            "citationID": "c1",
            "citationItems": [{ "id": 1 }, { "id": "book-2", "locator": "12" }],
            "properties": { "noteIndex": "3" }
        }))
        .unwrap();
        assert_eq!(citation.citation_id.as_deref(), Some("c1"));
        assert_eq!(citation.citation_items.len(), 2);
        assert_eq!(citation.citation_items[0].id, ItemId::Number(1));
        assert_eq!(
            citation.citation_items[1].extra.get("locator"),
            Some(&serde_json::json!("12"))
        );
        assert_eq!(citation.note_index(), Some(3));
    }

    #[test]
    fn citation_without_id_or_properties_deserializes() {
        let citation: Citation =
            serde_json::from_value(serde_json::json!({ "citationItems": [{ "id": 9 }] })).unwrap();
        assert!(citation.citation_id.is_none());
        assert_eq!(citation.note_index(), None);
    }
}
