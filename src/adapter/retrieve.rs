//! Update and bibliography retrieval
//!
//! Pulls the engine's incremental render diff and the full bibliography,
//! translating session cluster keys back to host identifiers and
//! re-exposing bibliography metadata under the host's legacy field names.
//! The host schema and the engine schema evolved independently; the
//! mapping between them lives in one place
//! (`HostBibliographyMeta::from_session`) so it can be tested in
//! isolation.

use super::driver::{CitationProcessor, ProcessorError};
use crate::engine::{BibliographyMeta, BibliographyUpdate, FormatMeta};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The minimal set of clusters whose rendered output changed since the
/// previous pull, with host-form identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchedUpdates {
    pub clusters: Vec<(String, String)>,
    /// Bibliography delta, passed through from the session unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibliography: Option<BibliographyUpdate>,
}

/// Bibliography layout metadata carrying both the engine's native field
/// names and the host's legacy names, plus per-entry id groupings.
///
/// The legacy names are lowercased run-together forms of the native ones,
/// `bibstart`/`bibend` are lifted out of `formatMeta`, and the alignment
/// flag doubles under a hyphenated key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostBibliographyMeta {
    // Engine-native names.
    #[serde(rename = "maxOffset")]
    pub max_offset: u32,
    #[serde(rename = "lineSpacing")]
    pub line_spacing: u32,
    #[serde(rename = "entrySpacing")]
    pub entry_spacing: u32,
    #[serde(rename = "hangingIndent")]
    pub hanging_indent: bool,
    #[serde(
        rename = "secondFieldAlign",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub second_field_align: Option<String>,
    #[serde(rename = "formatMeta", default, skip_serializing_if = "Option::is_none")]
    pub format_meta: Option<FormatMeta>,

    // Host legacy names.
    pub maxoffset: u32,
    pub linespacing: u32,
    pub entryspacing: u32,
    pub hangingindent: bool,
    #[serde(
        rename = "second-field-align",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub second_field_align_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibstart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibend: Option<String>,

    /// One id group per bibliography entry. Always single-element groups;
    /// the grouping shape survives from a host format that supported
    /// merged entries.
    pub entry_ids: Vec<Vec<String>>,
}

impl HostBibliographyMeta {
    /// The total field mapping between the two schemas. Every native
    /// field is kept and re-exposed under its host alias.
    pub fn from_session(meta: BibliographyMeta, entry_ids: Vec<Vec<String>>) -> Self {
        let BibliographyMeta {
            max_offset,
            line_spacing,
            entry_spacing,
            hanging_indent,
            second_field_align,
            format_meta,
        } = meta;
        let (bibstart, bibend) = match &format_meta {
            Some(fm) => (Some(fm.markup_pre.clone()), Some(fm.markup_post.clone())),
            None => (None, None),
        };
        Self {
            max_offset,
            line_spacing,
            entry_spacing,
            hanging_indent,
            second_field_align: second_field_align.clone(),
            format_meta,
            maxoffset: max_offset,
            linespacing: line_spacing,
            entryspacing: entry_spacing,
            hangingindent: hanging_indent,
            second_field_align_host: second_field_align,
            bibstart,
            bibend,
            entry_ids,
        }
    }
}

impl CitationProcessor {
    /// Pull the clusters whose rendered output changed since the last
    /// pull. The session tracks the diff internally; the adapter only
    /// translates identifiers.
    pub async fn batched_updates(&mut self) -> Result<BatchedUpdates, ProcessorError> {
        let session = self.ensure_session().await?;
        debug!("batched updates");
        let summary = session.batched_updates()?;

        let mut clusters = Vec::with_capacity(summary.clusters.len());
        for (key, rendered) in summary.clusters {
            let id = self
                .ids
                .host_id(&key)
                .ok_or_else(|| ProcessorError::UnknownCluster(key.to_string()))?;
            clusters.push((id, rendered));
        }
        Ok(BatchedUpdates {
            clusters,
            bibliography: summary.bibliography,
        })
    }

    /// Fetch the full bibliography: normalized layout metadata plus the
    /// rendered entries. The id groups in the metadata and the returned
    /// strings correspond by index.
    pub async fn make_bibliography(
        &mut self,
    ) -> Result<(HostBibliographyMeta, Vec<String>), ProcessorError> {
        let session = self.ensure_session().await?;
        debug!("bibliography meta");
        let meta = session.bibliography_meta()?;
        debug!("make bibliography");
        let entries = session.make_bibliography()?;

        let entry_ids = entries.iter().map(|e| vec![e.id.clone()]).collect();
        let rendered = entries.into_iter().map(|e| e.value).collect();
        Ok((HostBibliographyMeta::from_session(meta, entry_ids), rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> BibliographyMeta {
        BibliographyMeta {
            max_offset: 4,
            line_spacing: 2,
            entry_spacing: 1,
            hanging_indent: true,
            second_field_align: Some("flush".into()),
            format_meta: Some(FormatMeta {
                markup_pre: "{\\rtf ".into(),
                markup_post: "}".into(),
            }),
        }
    }

    #[test]
    fn every_host_alias_mirrors_its_native_field() {
        let meta = HostBibliographyMeta::from_session(sample_meta(), vec![vec!["a".into()]]);
        assert_eq!(meta.maxoffset, meta.max_offset);
        assert_eq!(meta.linespacing, meta.line_spacing);
        assert_eq!(meta.entryspacing, meta.entry_spacing);
        assert_eq!(meta.hangingindent, meta.hanging_indent);
        assert_eq!(meta.second_field_align_host, meta.second_field_align);
        assert_eq!(meta.bibstart.as_deref(), Some("{\\rtf "));
        assert_eq!(meta.bibend.as_deref(), Some("}"));
        assert_eq!(meta.entry_ids, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn missing_format_meta_leaves_bib_markers_unset() {
        let meta = HostBibliographyMeta::from_session(
            BibliographyMeta::default(),
            Vec::new(),
        );
        assert_eq!(meta.bibstart, None);
        assert_eq!(meta.bibend, None);
    }

    #[test]
    fn serialized_metadata_carries_both_name_sets() {
        let meta = HostBibliographyMeta::from_session(sample_meta(), Vec::new());
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["maxOffset"], value["maxoffset"]);
        assert_eq!(value["lineSpacing"], value["linespacing"]);
        assert_eq!(value["entrySpacing"], value["entryspacing"]);
        assert_eq!(value["hangingIndent"], value["hangingindent"]);
        assert_eq!(value["secondFieldAlign"], value["second-field-align"]);
        assert_eq!(value["formatMeta"]["markupPre"], value["bibstart"]);
        assert_eq!(value["formatMeta"]["markupPost"], value["bibend"]);
    }
}
