use std::sync::Mutex;

use async_trait::async_trait;
use hashbrown::HashMap;

use super::FeatureStore;
use crate::error::StoreError;
use crate::models::{AdmRecord, FieldLimits, GeoFeature, Placetype};

#[derive(Default)]
struct Tables {
    features: HashMap<(Placetype, i64), GeoFeature>,
    adms: HashMap<i64, AdmRecord>,
}

/// Map-backed store, nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    limits: FieldLimits,
}

impl MemoryStore {
    pub fn new(limits: FieldLimits) -> Self {
        Self {
            tables: Mutex::default(),
            limits,
        }
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored features of one placetype
    pub fn count(&self, placetype: Placetype) -> usize {
        self.tables()
            .features
            .keys()
            .filter(|(pt, _)| *pt == placetype)
            .count()
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn get(
        &self,
        placetype: Placetype,
        feature_id: i64,
    ) -> Result<Option<GeoFeature>, StoreError> {
        Ok(self.tables().features.get(&(placetype, feature_id)).cloned())
    }

    async fn get_adm(&self, feature_id: i64) -> Result<Option<AdmRecord>, StoreError> {
        Ok(self.tables().adms.get(&feature_id).cloned())
    }

    async fn save(&self, feature: &GeoFeature) -> Result<(), StoreError> {
        feature
            .check_constraints(&self.limits)
            .map_err(StoreError::Constraint)?;
        self.tables()
            .features
            .insert((feature.placetype(), feature.feature_id), feature.clone());
        Ok(())
    }

    async fn save_adm(&self, adm: &AdmRecord) -> Result<(), StoreError> {
        self.tables().adms.insert(adm.feature_id, adm.clone());
        Ok(())
    }

    async fn remove(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError> {
        self.tables().features.remove(&(placetype, feature_id));
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
