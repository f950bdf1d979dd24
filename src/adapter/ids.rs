//! Identifier space between host cluster ids and session cluster keys
//!
//! The host controls cluster identifiers (opaque strings). What the
//! session accepts depends on the protocol generation: the current one
//! takes the host's strings directly, an earlier one required dense
//! numeric ids. Both are supported; the scheme is chosen at processor
//! construction and every cluster identifier is routed through it.

use crate::engine::ClusterKey;
use std::collections::HashMap;

/// Pluggable mapping between host cluster ids and session cluster keys.
#[derive(Debug, Clone)]
pub enum IdScheme {
    /// Session accepts host strings directly; mapping is pass-through.
    Passthrough,
    /// Session requires dense numeric ids; a bidirectional table assigns
    /// them from a counter starting at 1. Key 0 is reserved for previews.
    Numeric(NumericTable),
}

/// Bidirectional host-string ↔ session-number table.
#[derive(Debug, Clone, Default)]
pub struct NumericTable {
    forward: HashMap<String, u32>,
    reverse: HashMap<u32, String>,
    next: u32,
}

impl IdScheme {
    pub fn passthrough() -> Self {
        Self::Passthrough
    }

    pub fn numeric() -> Self {
        Self::Numeric(NumericTable {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            next: 1,
        })
    }

    /// Session key for a host id, allocating on first sight under the
    /// numeric scheme. Total: never fails, never parses the host id.
    pub fn session_key(&mut self, host_id: &str) -> ClusterKey {
        match self {
            Self::Passthrough => ClusterKey::Text(host_id.to_string()),
            Self::Numeric(table) => {
                if let Some(&number) = table.forward.get(host_id) {
                    return ClusterKey::Number(number);
                }
                let number = table.next;
                table.next += 1;
                table.forward.insert(host_id.to_string(), number);
                table.reverse.insert(number, host_id.to_string());
                ClusterKey::Number(number)
            }
        }
    }

    /// Host id for a session-reported key. `None` only for a numeric key
    /// with no table entry, which the caller reports as an unknown
    /// cluster.
    pub fn host_id(&self, key: &ClusterKey) -> Option<String> {
        match (self, key) {
            (_, ClusterKey::Text(id)) => Some(id.clone()),
            (Self::Passthrough, ClusterKey::Number(number)) => Some(number.to_string()),
            (Self::Numeric(table), ClusterKey::Number(number)) => {
                table.reverse.get(number).cloned()
            }
        }
    }

    /// Key for a preview cluster. Under the numeric scheme the reserved
    /// key 0 sits below the counter floor and can never collide with a
    /// persisted cluster.
    pub fn preview_key(&self, host_id: &str) -> ClusterKey {
        match self {
            Self::Passthrough => ClusterKey::Text(host_id.to_string()),
            Self::Numeric(_) => ClusterKey::Number(0),
        }
    }

    /// Forget all mappings. Called on session reset — a reconstructed
    /// session has no clusters, so stale mappings must not survive it.
    pub fn clear(&mut self) {
        if let Self::Numeric(table) = self {
            table.forward.clear();
            table.reverse.clear();
            table.next = 1;
        }
    }
}
