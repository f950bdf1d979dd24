//! Style configuration for one processor instance

use crate::engine::OutputFormat;

/// Configuration fixed at processor construction.
///
/// The output format is the only field that may change afterwards, via
/// `CitationProcessor::set_output_format` — the session protocol offers no
/// way to change format on a live handle, so a change forces
/// reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    /// Style source text, handed to the engine verbatim.
    pub style: String,
    /// Default locale; becomes the forced locale when `override_locale` is
    /// set.
    pub locale: String,
    /// Short-circuit every engine locale request to `locale`.
    pub override_locale: bool,
    /// Output format for rendered text.
    pub format: OutputFormat,
    /// Whether the engine should sort cites within clusters.
    pub sort_citations: bool,
    /// Host-visible style identifier; not interpreted by the adapter.
    pub style_id: Option<String>,
    /// Whether the style defines a bibliography section.
    pub has_bibliography: bool,
}

impl StyleConfig {
    pub fn new(style: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            locale: locale.into(),
            override_locale: false,
            format: OutputFormat::Rtf,
            sort_citations: true,
            style_id: None,
            has_bibliography: true,
        }
    }

    pub fn with_override_locale(mut self, override_locale: bool) -> Self {
        self.override_locale = override_locale;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sort_citations(mut self, sort_citations: bool) -> Self {
        self.sort_citations = sort_citations;
        self
    }

    pub fn with_style_id(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    pub fn with_has_bibliography(mut self, has_bibliography: bool) -> Self {
        self.has_bibliography = has_bibliography;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StyleConfig::new("<style/>", "en-US");
        assert_eq!(config.format, OutputFormat::Rtf);
        assert!(config.sort_citations);
        assert!(!config.override_locale);
        assert!(config.has_bibliography);
        assert!(config.style_id.is_none());
    }

    #[test]
    fn builders_set_fields() {
        let config = StyleConfig::new("<style/>", "de-DE")
            .with_override_locale(true)
            .with_format(OutputFormat::Html)
            .with_style_id("http://example.org/styles/test");
        assert!(config.override_locale);
        assert_eq!(config.format, OutputFormat::Html);
        assert_eq!(config.style_id.as_deref(), Some("http://example.org/styles/test"));
    }
}
