//! Message catalogs keyed by locale, chosen per request from `Accept-Language`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use {actiongraph_config::I18nConfig, actiongraph_graphql::Localizer};

/// One locale's hash → message table. Unknown hashes translate to themselves.
#[derive(Debug, Clone)]
pub struct CatalogLocalizer {
    locale: String,
    entries: BTreeMap<String, String>,
}

impl CatalogLocalizer {
    pub fn new(locale: impl Into<String>, entries: BTreeMap<String, String>) -> Self {
        Self {
            locale: locale.into(),
            entries,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
}

impl Localizer for CatalogLocalizer {
    fn translate(&self, hash: &str) -> String {
        self.entries
            .get(hash)
            .cloned()
            .unwrap_or_else(|| hash.to_string())
    }
}

/// Every configured catalog plus the fallback locale.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    default_locale: Option<String>,
    catalogs: HashMap<String, Arc<CatalogLocalizer>>,
}

impl Catalogs {
    pub fn from_config(config: &I18nConfig) -> Self {
        let catalogs = config
            .catalogs
            .iter()
            .map(|(locale, entries)| {
                let key = locale.to_ascii_lowercase();
                (key, Arc::new(CatalogLocalizer::new(locale, entries.clone())))
            })
            .collect();
        Self {
            default_locale: config.default_locale.as_deref().map(str::to_ascii_lowercase),
            catalogs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    /// Best catalog for an `Accept-Language` value, falling back to the
    /// default locale. `None` when nothing matches.
    pub fn negotiate(&self, accept_language: Option<&str>) -> Option<Arc<dyn Localizer>> {
        self.select(accept_language)
            .map(|catalog| catalog as Arc<dyn Localizer>)
    }

    fn select(&self, accept_language: Option<&str>) -> Option<Arc<CatalogLocalizer>> {
        if self.catalogs.is_empty() {
            return None;
        }
        for tag in preferred_tags(accept_language.unwrap_or_default()) {
            if let Some(catalog) = self.lookup(&tag) {
                return Some(catalog);
            }
        }
        self.default_locale
            .as_deref()
            .and_then(|locale| self.lookup(locale))
    }

    /// Exact tag first, then its primary subtag (`fr-CA` → `fr`).
    fn lookup(&self, tag: &str) -> Option<Arc<CatalogLocalizer>> {
        self.catalogs
            .get(tag)
            .or_else(|| {
                tag.split_once('-')
                    .and_then(|(primary, _)| self.catalogs.get(primary))
            })
            .cloned()
    }
}

/// Language tags ordered by descending quality, lowercased. `*` and `q=0`
/// entries are dropped.
fn preferred_tags(header: &str) -> Vec<String> {
    let mut tags: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = pieces.next()?.trim().to_ascii_lowercase();
            let quality = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            (!tag.is_empty() && tag != "*" && quality > 0.0).then_some((tag, quality))
        })
        .collect();
    // Stable sort keeps header order among equal weights.
    tags.sort_by(|a, b| b.1.total_cmp(&a.1));
    tags.into_iter().map(|(tag, _)| tag).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn catalogs() -> Catalogs {
        let mut config = I18nConfig {
            default_locale: Some("en".into()),
            ..I18nConfig::default()
        };
        config.catalogs.insert(
            "en".into(),
            BTreeMap::from([("USER_NOT_FOUND_01".into(), "User not found".into())]),
        );
        config.catalogs.insert(
            "fr".into(),
            BTreeMap::from([("USER_NOT_FOUND_01".into(), "Utilisateur introuvable".into())]),
        );
        Catalogs::from_config(&config)
    }

    #[test]
    fn quality_orders_the_tags() {
        assert_eq!(
            preferred_tags("de;q=0.2, fr-CA, en;q=0.8, *;q=0.1, it;q=0"),
            vec!["fr-ca", "en", "de"]
        );
        assert!(preferred_tags("").is_empty());
    }

    #[test]
    fn negotiation_falls_back_to_primary_subtag_then_default() {
        let catalogs = catalogs();
        assert_eq!(catalogs.select(Some("fr-CA,en;q=0.5")).unwrap().locale(), "fr");
        assert_eq!(catalogs.select(Some("de")).unwrap().locale(), "en");
        assert_eq!(catalogs.select(None).unwrap().locale(), "en");

        let localizer = catalogs.negotiate(Some("fr")).unwrap();
        assert_eq!(localizer.translate("USER_NOT_FOUND_01"), "Utilisateur introuvable");
        assert_eq!(localizer.translate("OTHER_01"), "OTHER_01");
    }

    #[test]
    fn no_catalogs_means_no_localizer() {
        assert!(Catalogs::default().negotiate(Some("en")).is_none());
    }
}
