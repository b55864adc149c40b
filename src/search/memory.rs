//! In-process candidate index backed by an R-tree.
//!
//! Used for dry runs without a search cluster and for tests. Candidates are
//! walked nearest-first from the query point and ranked by folded-name
//! similarity; ties keep distance order.

use std::sync::RwLock;

use async_trait::async_trait;
use hashbrown::HashMap;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use super::similarity;
use super::{CandidateSearch, SearchQuery};
use crate::error::SearchError;
use crate::models::{AdmRecord, CandidateMatch, GeoFeature, Placetype};

/// Hits scoring below this are not returned
const SCORE_FLOOR: f64 = 0.75;

type Key = (Placetype, i64);
type IndexedPoint = GeomWithData<[f64; 2], Key>;

struct Entry {
    candidate: CandidateMatch,
    country_code: Option<String>,
}

#[derive(Default)]
struct State {
    tree: RTree<IndexedPoint>,
    entries: HashMap<Key, Entry>,
}

impl State {
    fn remove(&mut self, key: Key) {
        if let Some(old) = self.entries.remove(&key) {
            if let Some(loc) = old.candidate.location {
                self.tree
                    .remove(&IndexedPoint::new([loc.lon, loc.lat], key));
            }
        }
    }

    fn insert(&mut self, candidate: CandidateMatch, country_code: Option<String>) {
        let key = (candidate.placetype, candidate.feature_id);
        self.remove(key);
        if let Some(loc) = candidate.location {
            self.tree.insert(IndexedPoint::new([loc.lon, loc.lat], key));
        }
        self.entries.insert(
            key,
            Entry {
                candidate,
                country_code,
            },
        );
    }
}

#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<State>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_feature(&self, feature: &GeoFeature) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.insert(CandidateMatch::from(feature), feature.country_code.clone());
    }

    pub fn upsert_adm(&self, adm: &AdmRecord) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.insert(CandidateMatch::from(adm), adm.country_code.clone());
    }

    pub fn remove(&self, placetype: Placetype, feature_id: i64) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.remove((placetype, feature_id));
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|s| s.entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn score(query: &SearchQuery, candidate: &CandidateMatch) -> f64 {
        let by_name = candidate
            .name
            .as_deref()
            .map_or(0.0, |n| similarity::score(&query.name, n));
        candidate
            .alternate_names
            .iter()
            .map(|an| similarity::score(&query.name, an))
            .fold(by_name, f64::max)
    }
}

#[async_trait]
impl CandidateSearch for MemoryIndex {
    async fn query(&self, query: &SearchQuery) -> Result<Vec<CandidateMatch>, SearchError> {
        let state = self
            .state
            .read()
            .map_err(|_| SearchError::Transport("memory index lock poisoned".into()))?;

        let accepts = |entry: &Entry| {
            (query.placetypes.is_empty() || query.placetypes.contains(&entry.candidate.placetype))
                && match (&query.country_code, &entry.country_code) {
                    (Some(wanted), Some(cc)) => wanted.eq_ignore_ascii_case(cc),
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        };

        // nearest first, then entries without a location
        let ordered: Vec<&Entry> = match query.location {
            Some(loc) => state
                .tree
                .nearest_neighbor_iter(&[loc.lon, loc.lat])
                .filter_map(|p| state.entries.get(&p.data))
                .chain(
                    state
                        .entries
                        .values()
                        .filter(|e| e.candidate.location.is_none()),
                )
                .collect(),
            None => {
                let mut all: Vec<&Entry> = state.entries.values().collect();
                all.sort_by_key(|e| (e.candidate.placetype.as_str(), e.candidate.feature_id));
                all
            }
        };

        let mut hits: Vec<CandidateMatch> = ordered
            .into_iter()
            .filter(|e| accepts(*e))
            .filter_map(|e| {
                let score = Self::score(query, &e.candidate);
                (score >= SCORE_FLOOR).then(|| CandidateMatch {
                    score,
                    ..e.candidate.clone()
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(query.limit);
        Ok(hits)
    }
}
