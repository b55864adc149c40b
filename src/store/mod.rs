//! Persistent feature storage.
//!
//! One keyed collection per placetype plus the administrative records.
//! Writers call `save` per record and `flush` periodically; readers only
//! ever look records up by id, the search index answers everything else.

pub mod indexed;
pub mod memory;
pub mod sled;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{AdmRecord, GeoFeature, Placetype};

pub use self::indexed::{IndexMirror, IndexedStore};
pub use self::memory::MemoryStore;
pub use self::sled::SledStore;

#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn get(&self, placetype: Placetype, feature_id: i64)
        -> Result<Option<GeoFeature>, StoreError>;

    async fn get_adm(&self, feature_id: i64) -> Result<Option<AdmRecord>, StoreError>;

    /// Insert or replace. Fails with `StoreError::Constraint` if the record
    /// breaks a field limit.
    async fn save(&self, feature: &GeoFeature) -> Result<(), StoreError>;

    async fn save_adm(&self, adm: &AdmRecord) -> Result<(), StoreError>;

    async fn remove(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError>;

    /// Make buffered writes durable.
    async fn flush(&self) -> Result<(), StoreError>;
}
