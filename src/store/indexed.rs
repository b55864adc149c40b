//! Store wrapper that mirrors every write into the search index.
//!
//! Writes reach the inner store first; the mirror may buffer, so the
//! index lags the store until `flush`. The store is the record of truth:
//! a write it accepted succeeds even when mirroring it fails, the failure
//! is logged and counted instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::FeatureStore;
use crate::error::StoreError;
use crate::models::{AdmRecord, GeoFeature, Placetype};
use crate::search::MemoryIndex;

/// Write side of a search index
#[async_trait]
pub trait IndexMirror: Send + Sync {
    async fn index_feature(&self, feature: &GeoFeature) -> Result<(), StoreError>;

    async fn index_adm(&self, adm: &AdmRecord) -> Result<(), StoreError>;

    async fn delete(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError>;

    async fn flush(&self) -> Result<(), StoreError>;
}

pub struct IndexedStore {
    inner: Arc<dyn FeatureStore>,
    mirror: Arc<dyn IndexMirror>,
    mirror_errors: AtomicUsize,
}

impl IndexedStore {
    pub fn new(inner: Arc<dyn FeatureStore>, mirror: Arc<dyn IndexMirror>) -> Self {
        Self {
            inner,
            mirror,
            mirror_errors: AtomicUsize::new(0),
        }
    }

    /// Mirror calls that failed so far
    pub fn mirror_errors(&self) -> usize {
        self.mirror_errors.load(Ordering::Relaxed)
    }

    fn mirrored(&self, what: &str, result: Result<(), StoreError>) {
        if let Err(e) = result {
            self.mirror_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Index update failed for {}: {}", what, e);
        }
    }
}

#[async_trait]
impl FeatureStore for IndexedStore {
    async fn get(
        &self,
        placetype: Placetype,
        feature_id: i64,
    ) -> Result<Option<GeoFeature>, StoreError> {
        self.inner.get(placetype, feature_id).await
    }

    async fn get_adm(&self, feature_id: i64) -> Result<Option<AdmRecord>, StoreError> {
        self.inner.get_adm(feature_id).await
    }

    async fn save(&self, feature: &GeoFeature) -> Result<(), StoreError> {
        self.inner.save(feature).await?;
        let result = self.mirror.index_feature(feature).await;
        self.mirrored(
            &format!("{} {}", feature.placetype(), feature.feature_id),
            result,
        );
        Ok(())
    }

    async fn save_adm(&self, adm: &AdmRecord) -> Result<(), StoreError> {
        self.inner.save_adm(adm).await?;
        let result = self.mirror.index_adm(adm).await;
        self.mirrored(&format!("adm {}", adm.feature_id), result);
        Ok(())
    }

    async fn remove(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError> {
        self.inner.remove(placetype, feature_id).await?;
        let result = self.mirror.delete(placetype, feature_id).await;
        self.mirrored(&format!("{} {}", placetype, feature_id), result);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.inner.flush().await?;
        let result = self.mirror.flush().await;
        self.mirrored("flush", result);
        Ok(())
    }
}

/// The in-memory index sees writes immediately.
#[async_trait]
impl IndexMirror for MemoryIndex {
    async fn index_feature(&self, feature: &GeoFeature) -> Result<(), StoreError> {
        self.upsert_feature(feature);
        Ok(())
    }

    async fn index_adm(&self, adm: &AdmRecord) -> Result<(), StoreError> {
        self.upsert_adm(adm);
        Ok(())
    }

    async fn delete(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError> {
        self.remove(placetype, feature_id);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
