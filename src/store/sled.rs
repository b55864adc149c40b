//! On-disk store: one sled tree per placetype, JSON values keyed by
//! big-endian feature id.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::FeatureStore;
use crate::error::StoreError;
use crate::models::{AdmRecord, FieldLimits, GeoFeature, Placetype};

const ADM_TREE: &str = "adm";

pub struct SledStore {
    db: sled::Db,
    limits: FieldLimits,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P, limits: FieldLimits) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening feature store at {}", path.display());
        let db = sled::open(path)?;
        Ok(Self { db, limits })
    }

    /// Shared handle, the id generator lives in the same database.
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self, placetype: Placetype) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(placetype.as_str())?)
    }

    fn key(feature_id: i64) -> [u8; 8] {
        feature_id.to_be_bytes()
    }
}

#[async_trait]
impl FeatureStore for SledStore {
    async fn get(
        &self,
        placetype: Placetype,
        feature_id: i64,
    ) -> Result<Option<GeoFeature>, StoreError> {
        match self.tree(placetype)?.get(Self::key(feature_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_adm(&self, feature_id: i64) -> Result<Option<AdmRecord>, StoreError> {
        match self.db.open_tree(ADM_TREE)?.get(Self::key(feature_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, feature: &GeoFeature) -> Result<(), StoreError> {
        feature
            .check_constraints(&self.limits)
            .map_err(StoreError::Constraint)?;
        let value = serde_json::to_vec(feature)?;
        self.tree(feature.placetype())?
            .insert(Self::key(feature.feature_id), value)?;
        Ok(())
    }

    async fn save_adm(&self, adm: &AdmRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(adm)?;
        self.db
            .open_tree(ADM_TREE)?
            .insert(Self::key(adm.feature_id), value)?;
        Ok(())
    }

    async fn remove(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError> {
        self.tree(placetype)?.remove(Self::key(feature_id))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let bytes = self.db.flush_async().await?;
        debug!("Flushed {} bytes to feature store", bytes);
        Ok(())
    }
}
