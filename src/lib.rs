//! Larch - reconciles a crowd-sourced map extract with an authoritative
//! gazetteer into one deduplicated set of places, sub-places and points of
//! interest.
//!
//! This library holds the reconciliation engine and the store, search and
//! notification adapters used by the `reconcile` binary.

pub mod adm_link;
pub mod classify;
pub mod config;
pub mod discord;
pub mod elasticsearch;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grammar;
pub mod ids;
pub mod labels;
pub mod models;
pub mod municipality;
pub mod policy;
pub mod search;
pub mod store;

pub use engine::{Capabilities, ReconciliationEngine, RowOutcome, RunSummary};
pub use models::{CandidateMatch, FeatureKind, GeoFeature, Placetype, Source};
