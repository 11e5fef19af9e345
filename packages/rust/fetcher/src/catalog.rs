//! Source id → URL template catalog.

use std::collections::BTreeMap;

use tracing::warn;
use url::Url;

use starbrief_shared::{AppConfig, Entity, Source};

/// Placeholder replaced by the lower-cased entity in URL templates.
const ENTITY_PLACEHOLDER: &str = "{entity}";

/// Known sources and how to build their per-entity URLs.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    templates: BTreeMap<Source, String>,
}

impl SourceCatalog {
    /// Build a catalog from `(source id, template)` pairs.
    pub fn new<I, S, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            templates: entries
                .into_iter()
                .map(|(s, t)| (Source::new(s), t.into()))
                .collect(),
        }
    }

    /// The catalog configured in `[sources]`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.sources.clone())
    }

    pub fn contains(&self, source: &Source) -> bool {
        self.templates.contains_key(source)
    }

    /// Iterate `(source, template)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&Source, &str)> {
        self.templates.iter().map(|(s, t)| (s, t.as_str()))
    }

    /// Resolve the URL for `entity` on `source`.
    ///
    /// Returns `None` for unknown sources and for templates that do not
    /// produce a valid URL.
    pub fn resolve(&self, entity: &Entity, source: &Source) -> Option<Url> {
        let template = self.templates.get(source)?;
        let raw = template.replace(ENTITY_PLACEHOLDER, &entity.slug());
        match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(%source, template, error = %e, "source template is not a valid URL");
                None
            }
        }
    }
}
