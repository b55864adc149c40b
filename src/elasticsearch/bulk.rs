//! Bulk index/delete operations for Elasticsearch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use elasticsearch::http::request::JsonBody;
use elasticsearch::BulkParts;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::document::{doc_id, FeatureDoc};
use super::EsClient;
use crate::error::StoreError;
use crate::models::{AdmRecord, GeoFeature, Placetype};
use crate::store::IndexMirror;

/// Pending bulk operation
#[derive(Debug, Clone)]
pub enum BulkOp {
    Index(FeatureDoc),
    Delete(String),
}

/// Where bulk requests go. Returns the number of rejected operations;
/// an `Err` means the request as a whole did not go through.
#[async_trait]
pub trait BulkSink: Send + Sync {
    async fn send(&self, ops: &[BulkOp]) -> Result<usize>;
}

#[async_trait]
impl BulkSink for EsClient {
    async fn send(&self, ops: &[BulkOp]) -> Result<usize> {
        let mut body: Vec<JsonBody<serde_json::Value>> = Vec::with_capacity(ops.len() * 2);
        for op in ops {
            match op {
                BulkOp::Index(doc) => {
                    body.push(serde_json::json!({ "index": { "_id": doc.id() } }).into());
                    body.push(serde_json::to_value(doc)?.into());
                }
                BulkOp::Delete(id) => {
                    body.push(serde_json::json!({ "delete": { "_id": id } }).into());
                }
            }
        }

        let response = self
            .es()
            .bulk(BulkParts::Index(self.index()))
            .body(body)
            .send()
            .await
            .context("Bulk request failed")?;
        if !response.status_code().is_success() {
            anyhow::bail!("Bulk request rejected: {}", response.text().await?);
        }

        let response_body = response.json::<serde_json::Value>().await?;
        if !response_body["errors"].as_bool().unwrap_or(false) {
            return Ok(0);
        }
        // deleting a document the index never saw is not an error
        let errors = response_body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        item["index"]["error"].is_object()
                            || (item["delete"]["error"].is_object()
                                && item["delete"]["status"].as_u64() != Some(404))
                    })
                    .count()
            })
            .unwrap_or(0);
        Ok(errors)
    }
}

/// Buffers operations and sends them in batches. Operations of a failed
/// request stay buffered and go out with the next flush.
pub struct BulkIndexer {
    sink: Box<dyn BulkSink>,
    batch_size: usize,
    buffer: Vec<BulkOp>,
    /// Buffer length that triggers the next flush from `add`
    flush_at: usize,
    total_indexed: usize,
    total_deleted: usize,
    total_errors: usize,
}

impl BulkIndexer {
    pub fn new(sink: impl BulkSink + 'static, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink: Box::new(sink),
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            flush_at: batch_size,
            total_indexed: 0,
            total_deleted: 0,
            total_errors: 0,
        }
    }

    /// Queue an operation, flushing if the batch is full
    pub async fn add(&mut self, op: BulkOp) -> Result<()> {
        self.buffer.push(op);

        if self.buffer.len() >= self.flush_at {
            self.flush().await?;
        }

        Ok(())
    }

    /// Send everything buffered
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let ops = std::mem::take(&mut self.buffer);
        let count = ops.len();
        debug!("Flushing {} operations to Elasticsearch", count);

        let errors = match self.sink.send(&ops).await {
            Ok(errors) => errors,
            Err(e) => {
                self.buffer = ops;
                // wait for another batch before trying again
                self.flush_at = self.buffer.len() + self.batch_size;
                return Err(e);
            }
        };

        if errors > 0 {
            warn!(
                "Bulk request had {} errors out of {} operations",
                errors, count
            );
        }
        let deleted = ops.iter().filter(|op| matches!(op, BulkOp::Delete(_))).count();
        self.total_indexed += count - deleted;
        self.total_deleted += deleted;
        self.total_errors += errors;
        self.buffer = Vec::with_capacity(self.batch_size);
        self.flush_at = self.batch_size;

        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// (indexed, deleted, errors)
    pub fn stats(&self) -> (usize, usize, usize) {
        (self.total_indexed, self.total_deleted, self.total_errors)
    }
}

/// Mirrors store writes into the index through a shared bulk buffer.
pub struct EsIndexMirror {
    indexer: Mutex<BulkIndexer>,
}

impl EsIndexMirror {
    pub fn new(indexer: BulkIndexer) -> Self {
        Self {
            indexer: Mutex::new(indexer),
        }
    }

    pub async fn stats(&self) -> (usize, usize, usize) {
        self.indexer.lock().await.stats()
    }

    /// Operations not yet accepted by Elasticsearch
    pub async fn pending(&self) -> usize {
        self.indexer.lock().await.pending()
    }

    async fn push(&self, op: BulkOp) -> Result<(), StoreError> {
        self.indexer
            .lock()
            .await
            .add(op)
            .await
            .map_err(|e| StoreError::Backend(format!("{:#}", e)))
    }
}

#[async_trait]
impl IndexMirror for EsIndexMirror {
    async fn index_feature(&self, feature: &GeoFeature) -> Result<(), StoreError> {
        self.push(BulkOp::Index(FeatureDoc::from(feature))).await
    }

    async fn index_adm(&self, adm: &AdmRecord) -> Result<(), StoreError> {
        self.push(BulkOp::Index(FeatureDoc::from(adm))).await
    }

    async fn delete(&self, placetype: Placetype, feature_id: i64) -> Result<(), StoreError> {
        self.push(BulkOp::Delete(doc_id(placetype, feature_id))).await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.indexer
            .lock()
            .await
            .flush()
            .await
            .map_err(|e| StoreError::Backend(format!("{:#}", e)))
    }
}
