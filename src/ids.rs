//! Feature id generation.
//!
//! Workers reconciling different files share one generator so their ids
//! never collide.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::StoreError;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<i64, StoreError>;
}

/// Ids from sled's crash-safe monotonic counter, offset past existing gazetteer ids.
pub struct SledIdGenerator {
    db: sled::Db,
    offset: i64,
}

impl SledIdGenerator {
    pub fn new(db: sled::Db, offset: i64) -> Self {
        Self { db, offset }
    }
}

impl IdGenerator for SledIdGenerator {
    fn next_id(&self) -> Result<i64, StoreError> {
        let raw = self.db.generate_id()?;
        i64::try_from(raw)
            .ok()
            .and_then(|id| id.checked_add(self.offset))
            .ok_or_else(|| StoreError::Backend(format!("id space exhausted at {}", raw)))
    }
}

/// Process-local counter
pub struct AtomicIdGenerator {
    next: AtomicI64,
}

impl AtomicIdGenerator {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl IdGenerator for AtomicIdGenerator {
    fn next_id(&self) -> Result<i64, StoreError> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sled_ids_are_unique_and_offset() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let ids = SledIdGenerator::new(db, 10_000_000);
        let a = ids.next_id().unwrap();
        let b = ids.next_id().unwrap();
        assert!(a >= 10_000_000);
        assert!(b > a);
    }

    #[test]
    fn test_atomic_ids() {
        let ids = AtomicIdGenerator::starting_at(5);
        assert_eq!(ids.next_id().unwrap(), 5);
        assert_eq!(ids.next_id().unwrap(), 6);
    }
}
