//! Elasticsearch client and operations.

mod bulk;
mod client;
mod document;
mod schema;
mod search;

pub use bulk::{BulkIndexer, BulkOp, BulkSink, EsIndexMirror};
pub use client::EsClient;
pub use document::{doc_id, FeatureDoc};
pub use schema::ensure_index;
pub use search::{build_query, EsCandidateSearch};
