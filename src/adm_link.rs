//! Attaches the administrative parent of a feature.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::grammar::populate_adm_names_from_adm;
use crate::models::candidate::ONLY_ADM;
use crate::models::{AdmDescriptor, AdmParent, AdmRecord, GeoFeature};
use crate::search::{CandidateSearch, SearchQuery};
use crate::store::FeatureStore;

pub struct AdmHierarchyLinker {
    search: Arc<dyn CandidateSearch>,
    store: Arc<dyn FeatureStore>,
}

impl AdmHierarchyLinker {
    pub fn new(search: Arc<dyn CandidateSearch>, store: Arc<dyn FeatureStore>) -> Self {
        Self { search, store }
    }

    /// Best administrative record named `name` in the country, if stored.
    pub async fn find_adm(&self, name: &str, country_code: Option<&str>) -> Option<AdmRecord> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let query = SearchQuery::new(name, ONLY_ADM).in_country(country_code);
        let hit = match self.search.query(&query).await {
            Ok(hits) => hits.into_iter().next()?,
            Err(e) => {
                error!("Error executing adm query for {}: {}", name, e);
                return None;
            }
        };
        match self.store.get_adm(hit.feature_id).await {
            Ok(adm) => adm,
            Err(e) => {
                warn!("Can not load adm {} for {}: {}", hit.feature_id, name, e);
                None
            }
        }
    }

    /// Walk the hierarchy most local first and attach the first adm found.
    ///
    /// `adms` must be sorted by ascending level. Returns true if a parent was set.
    pub async fn link(&self, feature: &mut GeoFeature, adms: &[AdmDescriptor]) -> bool {
        let country_code = feature.country_code.clone();
        for descriptor in adms.iter().rev() {
            let Some(name) = descriptor.name.as_deref() else {
                continue;
            };
            if let Some(adm) = self.find_adm(name, country_code.as_deref()).await {
                debug!("Linking {} to adm {} ({})", feature.name, adm.name, adm.feature_id);
                feature.adm = Some(AdmParent {
                    feature_id: adm.feature_id,
                    name: adm.name,
                });
                return true;
            }
        }
        false
    }

    /// Fallback when only an unstructured "is in" name is known: attach the
    /// adm by that name and copy its adm names.
    pub async fn link_from_is_in(&self, feature: &mut GeoFeature, is_in: &str) -> bool {
        let country_code = feature.country_code.clone();
        match self.find_adm(is_in, country_code.as_deref()).await {
            Some(adm) => {
                populate_adm_names_from_adm(feature, &adm);
                feature.adm = Some(AdmParent {
                    feature_id: adm.feature_id,
                    name: adm.name,
                });
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdmNames, FeatureKind, GeoPoint};
    use crate::search::MemoryIndex;
    use crate::store::{FeatureStore, MemoryStore};

    async fn fixture() -> AdmHierarchyLinker {
        let index = Arc::new(MemoryIndex::new());
        let store = Arc::new(MemoryStore::default());

        let mut names = AdmNames::default();
        names.set(1, Some("Illinois".into()));
        let illinois = AdmRecord {
            feature_id: 100,
            name: "Illinois".into(),
            country_code: Some("US".into()),
            level: 1,
            adm_names: names.clone(),
            location: Some(GeoPoint::new(40.0, -89.0)),
        };
        names.set(2, Some("Sangamon County".into()));
        let sangamon = AdmRecord {
            feature_id: 101,
            name: "Sangamon County".into(),
            country_code: Some("US".into()),
            level: 2,
            adm_names: names,
            location: Some(GeoPoint::new(39.76, -89.66)),
        };
        for adm in [&illinois, &sangamon] {
            store.save_adm(adm).await.unwrap();
            index.upsert_adm(adm);
        }
        // indexed but missing from the store
        index.upsert_adm(&AdmRecord {
            feature_id: 102,
            name: "Capital Township".into(),
            country_code: Some("US".into()),
            level: 3,
            adm_names: AdmNames::default(),
            location: None,
        });

        AdmHierarchyLinker::new(index, store)
    }

    fn springfield() -> GeoFeature {
        let mut f = GeoFeature::new(1, FeatureKind::Place { municipality: true }, "Springfield");
        f.country_code = Some("US".into());
        f
    }

    #[tokio::test]
    async fn test_link_most_local_first() {
        let linker = fixture().await;
        let adms = vec![
            AdmDescriptor::new(Some("Illinois".into()), 4, 1),
            AdmDescriptor::new(Some("Sangamon County".into()), 6, 2),
            AdmDescriptor::new(Some("Capital Township".into()), 7, 3),
            AdmDescriptor::new(None, 8, 4),
        ];
        let mut f = springfield();
        assert!(linker.link(&mut f, &adms).await);
        assert_eq!(f.adm.as_ref().unwrap().feature_id, 101);
    }

    #[tokio::test]
    async fn test_link_nothing_found() {
        let linker = fixture().await;
        let mut f = springfield();
        f.country_code = Some("FR".into());
        let adms = vec![AdmDescriptor::new(Some("Illinois".into()), 4, 1)];
        assert!(!linker.link(&mut f, &adms).await);
        assert!(f.adm.is_none());
    }

    #[tokio::test]
    async fn test_link_from_is_in_copies_names() {
        let linker = fixture().await;
        let mut f = springfield();
        assert!(linker.link_from_is_in(&mut f, "Sangamon County").await);
        assert_eq!(f.adm.as_ref().unwrap().name, "Sangamon County");
        assert_eq!(f.adm_names.get(1), Some("Illinois"));
        assert_eq!(f.adm_names.get(2), Some("Sangamon County"));
    }
}
