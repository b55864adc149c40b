//! Candidate search: the query contract against the search index, the name
//! similarity rule and the resolver that picks the record to reconcile with.

pub mod memory;
pub mod resolver;
pub mod similarity;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::models::{CandidateMatch, GeoPoint, Placetype};

pub use memory::MemoryIndex;
pub use resolver::{CandidateResolution, CandidateResolver, MatchKind};

/// Proximity + name query
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub name: String,
    pub location: Option<GeoPoint>,
    pub placetypes: Vec<Placetype>,
    pub country_code: Option<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(name: impl Into<String>, placetypes: &[Placetype]) -> Self {
        Self {
            name: name.into(),
            location: None,
            placetypes: placetypes.to_vec(),
            country_code: None,
            limit: 1,
        }
    }

    pub fn near(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn in_country(mut self, country_code: Option<&str>) -> Self {
        self.country_code = country_code.map(str::to_uppercase);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

/// Ranked candidate lookup, best match first.
#[async_trait]
pub trait CandidateSearch: Send + Sync {
    async fn query(&self, query: &SearchQuery) -> Result<Vec<CandidateMatch>, SearchError>;
}
