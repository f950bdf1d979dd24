//! Host collaborator contracts
//!
//! The document host owns the bibliographic data. The adapter reaches it
//! through `CitationHost`: reference lookup by item id, locale lookup by
//! language tag, and cluster-id generation for citations that arrive
//! without one. Failures propagate — the adapter never substitutes
//! fallback values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// Errors from host collaborator calls.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("unknown locale: {0}")]
    UnknownLocale(String),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    #[error("{0}")]
    Other(String),
}

/// A host-assigned item identifier.
///
/// Hosts use numeric keys, string keys, or both; the adapter treats them
/// as opaque and only ever coerces them to string form for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl ItemId {
    /// The stringified form submitted to the engine.
    pub fn as_engine_id(&self) -> String {
        match self {
            Self::Number(id) => id.to_string(),
            Self::Text(id) => id.clone(),
        }
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{}", id),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// One bibliographic reference as the host resolves it: an id plus the
/// field blob the engine consumes. The adapter does not interpret the
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ItemId,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Reference {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// The contract the document host implements for the adapter.
pub trait CitationHost: Send + Sync {
    /// Resolve one reference by host item id. Fails if the id is unknown.
    fn retrieve_item(&self, id: &ItemId) -> Result<Reference, HostError>;

    /// Resolve locale data for a language tag. Invoked by the engine
    /// session through the adapter's injected callback.
    fn retrieve_locale(&self, lang: &str) -> Result<String, HostError>;

    /// Generate an identifier for a cluster that arrived without one.
    /// Collision unlikelihood is the host's responsibility.
    fn random_cluster_id(&self, length: usize) -> Result<String, HostError> {
        random_alphanumeric(length)
    }
}

/// Fixed-length random alphanumeric string from the system entropy source.
pub fn random_alphanumeric(length: usize) -> Result<String, HostError> {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut bytes = vec![0u8; length];
    getrandom::getrandom(&mut bytes).map_err(|e| HostError::Entropy(e.to_string()))?;
    Ok(bytes
        .into_iter()
        .map(|b| ALPHABET[b as usize % ALPHABET.len()] as char)
        .collect())
}

/// Mock host for testing — preloaded items and locales, recorded locale
/// requests, sequential cluster ids for determinism.
pub struct MockHost {
    items: HashMap<String, Reference>,
    locales: HashMap<String, String>,
    locale_requests: Mutex<Vec<String>>,
    next_cluster_id: AtomicU64,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            locales: HashMap::new(),
            locale_requests: Mutex::new(Vec::new()),
            next_cluster_id: AtomicU64::new(1),
        }
    }

    /// Register a reference, keyed by its stringified id.
    pub fn with_item(mut self, reference: Reference) -> Self {
        self.items.insert(reference.id.as_engine_id(), reference);
        self
    }

    /// Register locale data for a language tag.
    pub fn with_locale(mut self, lang: impl Into<String>, data: impl Into<String>) -> Self {
        self.locales.insert(lang.into(), data.into());
        self
    }

    /// Every language tag the adapter asked for, in request order.
    pub fn locale_requests(&self) -> Vec<String> {
        self.locale_requests.lock().unwrap().clone()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationHost for MockHost {
    fn retrieve_item(&self, id: &ItemId) -> Result<Reference, HostError> {
        self.items
            .get(&id.as_engine_id())
            .cloned()
            .ok_or_else(|| HostError::UnknownItem(id.to_string()))
    }

    fn retrieve_locale(&self, lang: &str) -> Result<String, HostError> {
        self.locale_requests.lock().unwrap().push(lang.to_string());
        self.locales
            .get(lang)
            .cloned()
            .ok_or_else(|| HostError::UnknownLocale(lang.to_string()))
    }

    fn random_cluster_id(&self, length: usize) -> Result<String, HostError> {
        let n = self.next_cluster_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{:m>width$}", n, width = length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_deserializes_number_or_string() {
        let number: ItemId = serde_json::from_value(serde_json::json!(7)).unwrap();
        assert_eq!(number, ItemId::Number(7));
        assert_eq!(number.as_engine_id(), "7");

        let text: ItemId = serde_json::from_value(serde_json::json!("item-7")).unwrap();
        assert_eq!(text, ItemId::Text("item-7".into()));
        assert_eq!(text.as_engine_id(), "item-7");
    }

    #[test]
    fn reference_flattens_fields() {
        let reference = Reference::new(1).with_field("title", serde_json::json!("A Title"));
        let value = serde_json::to_value(&reference).unwrap();
        assert_eq!(value, serde_json::json!({ "id": 1, "title": "A Title" }));
    }

    #[test]
    fn random_alphanumeric_has_requested_length() {
        let id = random_alphanumeric(10).unwrap();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn mock_host_unknown_item_fails() {
        let host = MockHost::new();
        let err = host.retrieve_item(&ItemId::Number(9)).unwrap_err();
        assert!(matches!(err, HostError::UnknownItem(_)));
    }

    #[test]
    fn mock_host_records_locale_requests() {
        let host = MockHost::new().with_locale("en-US", "<locale/>");
        host.retrieve_locale("en-US").unwrap();
        assert!(host.retrieve_locale("de-DE").is_err());
        assert_eq!(host.locale_requests(), vec!["en-US", "de-DE"]);
    }

    #[test]
    fn mock_host_cluster_ids_are_sequential_and_fixed_length() {
        let host = MockHost::new();
        let a = host.random_cluster_id(10).unwrap();
        let b = host.random_cluster_id(10).unwrap();
        assert_eq!(a.len(), 10);
        assert_eq!(b.len(), 10);
        assert_ne!(a, b);
    }
}
