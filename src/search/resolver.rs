//! Finds the existing record an incoming row should be reconciled with.

use std::sync::Arc;

use geo::Geometry;
use tracing::{debug, error, warn};

use super::similarity::{is_same_alternate_names, is_same_name};
use super::{CandidateSearch, SearchQuery};
use crate::geometry::{is_valid_shape, shape_contains};
use crate::models::{CandidateMatch, GeoPoint, Placetype};

/// Why a candidate was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Same real-world entity, merge into it
    SameEntity,
    /// A gazetteer place that is really a sub-place: delete it and recreate
    Misclassified,
    /// Top hit is an unmerged place but an unmerged sub-place follows it.
    /// The sub-place is the merge target; the place is left alone.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResolution {
    pub candidate: CandidateMatch,
    pub kind: MatchKind,
}

impl CandidateResolution {
    fn new(candidate: CandidateMatch, kind: MatchKind) -> Self {
        Self { candidate, kind }
    }
}

pub struct CandidateResolver {
    search: Arc<dyn CandidateSearch>,
    /// Search score above which a hit is the same entity whatever its name
    min_score: f64,
    name_similarity: f64,
    limit: usize,
}

impl CandidateResolver {
    pub fn new(
        search: Arc<dyn CandidateSearch>,
        min_score: f64,
        name_similarity: f64,
        limit: usize,
    ) -> Self {
        Self {
            search,
            min_score,
            name_similarity,
            limit: limit.max(1),
        }
    }

    /// Look up the record representing the same entity as (`name`, `location`).
    ///
    /// `target` is the kind of feature being reconciled. Searching two
    /// placetypes for a sub-place applies the place/sub-place tie-breaking
    /// rules; any other search returns the first unmerged, non-municipal hit
    /// that is the same entity. Search failures yield `None`.
    pub async fn resolve(
        &self,
        location: Option<GeoPoint>,
        name: Option<&str>,
        country_code: Option<&str>,
        placetypes: &[Placetype],
        shape: Option<&Geometry<f64>>,
        target: Option<Placetype>,
    ) -> Option<CandidateResolution> {
        let location = location?;
        let name = name.map(str::trim).filter(|n| !n.is_empty())?;

        let query = SearchQuery::new(name, placetypes)
            .near(location)
            .in_country(country_code)
            .limit(self.limit);

        let results = match self.search.query(&query).await {
            Ok(results) => results,
            Err(e) => {
                error!("Error executing candidate query for {}: {}", name, e);
                return None;
            }
        };
        if results.is_empty() {
            return None;
        }

        let dual = placetypes.len() > 1 && matches!(target, Some(t) if t != Placetype::Poi);
        if dual {
            // dual search is only issued for sub-places
            self.resolve_dual(&results, target.unwrap_or(Placetype::SubPlace))
        } else {
            self.resolve_single(&results, name, shape)
        }
    }

    fn resolve_single(
        &self,
        results: &[CandidateMatch],
        name: &str,
        shape: Option<&Geometry<f64>>,
    ) -> Option<CandidateResolution> {
        for candidate in results {
            if !self.is_same(candidate, name, shape) {
                continue;
            }
            if candidate.is_merged() {
                debug!(
                    "{} {} already merged, not a target",
                    candidate.placetype, candidate.feature_id
                );
                continue;
            }
            if !candidate.municipality {
                return Some(CandidateResolution::new(
                    candidate.clone(),
                    MatchKind::SameEntity,
                ));
            }
        }
        None
    }

    fn resolve_dual(
        &self,
        results: &[CandidateMatch],
        target: Placetype,
    ) -> Option<CandidateResolution> {
        let first = results.first()?;

        if first.placetype == target {
            return (!first.is_merged())
                .then(|| CandidateResolution::new(first.clone(), MatchKind::SameEntity));
        }
        if first.placetype != Placetype::Place {
            return None;
        }

        let next_target = results
            .iter()
            .skip(1)
            .find(|c| c.placetype == target && !c.is_merged());

        match (next_target, first.is_merged()) {
            (None, false) => Some(CandidateResolution::new(
                first.clone(),
                MatchKind::Misclassified,
            )),
            (None, true) => None,
            (Some(sub), true) => Some(CandidateResolution::new(
                sub.clone(),
                MatchKind::SameEntity,
            )),
            (Some(sub), false) => {
                warn!(
                    "Ambiguous: first is place {}/{} then we got a {} {}/{}",
                    first.name.as_deref().unwrap_or(""),
                    first.feature_id,
                    target,
                    sub.name.as_deref().unwrap_or(""),
                    sub.feature_id
                );
                Some(CandidateResolution::new(sub.clone(), MatchKind::Ambiguous))
            }
        }
    }

    /// Name, score or alternate-name equivalence, bounded by the shape when one is given.
    pub fn is_same(
        &self,
        candidate: &CandidateMatch,
        name: &str,
        shape: Option<&Geometry<f64>>,
    ) -> bool {
        let same_name = candidate
            .name
            .as_deref()
            .is_some_and(|n| is_same_name(name, n, self.name_similarity));
        let equivalent = same_name
            || candidate.score > self.min_score
            || is_same_alternate_names(name, &candidate.alternate_names, self.name_similarity);
        if !equivalent {
            return false;
        }

        match shape.filter(|s| is_valid_shape(s)) {
            Some(shape) => match candidate.location {
                Some(location) => shape_contains(shape, location.to_point()),
                None => {
                    error!("No coordinates for candidate {}", candidate.feature_id);
                    false
                }
            },
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::models::candidate::{ONLY_PLACE, PLACE_AND_SUB_PLACE};
    use async_trait::async_trait;
    use geo::polygon;

    /// Returns canned results, or fails
    struct Canned(Option<Vec<CandidateMatch>>);

    #[async_trait]
    impl CandidateSearch for Canned {
        async fn query(&self, _query: &SearchQuery) -> Result<Vec<CandidateMatch>, SearchError> {
            self.0
                .clone()
                .ok_or_else(|| SearchError::Transport("connection refused".into()))
        }
    }

    fn candidate(placetype: Placetype, id: i64, name: &str) -> CandidateMatch {
        CandidateMatch {
            placetype,
            feature_id: id,
            map_extract_id: None,
            municipality: false,
            name: Some(name.to_string()),
            alternate_names: Vec::new(),
            score: 0.1,
            location: Some(GeoPoint::new(39.78, -89.65)),
        }
    }

    fn merged(mut c: CandidateMatch) -> CandidateMatch {
        c.map_extract_id = Some(1000 + c.feature_id);
        c
    }

    fn resolver(results: Option<Vec<CandidateMatch>>) -> CandidateResolver {
        CandidateResolver::new(Arc::new(Canned(results)), 0.9, 0.95, 5)
    }

    const HERE: Option<GeoPoint> = Some(GeoPoint {
        lat: 39.78,
        lon: -89.65,
    });

    async fn single(r: &CandidateResolver, name: &str) -> Option<CandidateResolution> {
        r.resolve(HERE, Some(name), Some("US"), ONLY_PLACE, None, None)
            .await
    }

    async fn dual(r: &CandidateResolver) -> Option<CandidateResolution> {
        r.resolve(
            HERE,
            Some("Enos Park"),
            Some("US"),
            PLACE_AND_SUB_PLACE,
            None,
            Some(Placetype::SubPlace),
        )
        .await
    }

    #[tokio::test]
    async fn test_fails_fast_without_location_or_name() {
        let r = resolver(Some(vec![candidate(Placetype::Place, 1, "Springfield")]));
        assert!(r
            .resolve(None, Some("Springfield"), None, ONLY_PLACE, None, None)
            .await
            .is_none());
        assert!(r
            .resolve(HERE, Some("  "), None, ONLY_PLACE, None, None)
            .await
            .is_none());
        assert!(r.resolve(HERE, None, None, ONLY_PLACE, None, None).await.is_none());
    }

    #[tokio::test]
    async fn test_search_error_is_no_candidate() {
        assert!(single(&resolver(None), "Springfield").await.is_none());
    }

    #[tokio::test]
    async fn test_single_same_name() {
        let r = resolver(Some(vec![candidate(Placetype::Place, 1, "Springfield")]));
        let res = single(&r, "springfield").await.unwrap();
        assert_eq!(res.candidate.feature_id, 1);
        assert_eq!(res.kind, MatchKind::SameEntity);
    }

    #[tokio::test]
    async fn test_single_by_score_or_alternate_name() {
        let mut munich = candidate(Placetype::Place, 1, "Munich");
        munich.score = 0.97;
        let r = resolver(Some(vec![munich]));
        assert!(single(&r, "München").await.is_some());

        let mut koeln = candidate(Placetype::Place, 2, "Köln");
        koeln.alternate_names = vec!["Cologne".into()];
        let r = resolver(Some(vec![koeln]));
        assert!(single(&r, "Cologne").await.is_some());

        let r = resolver(Some(vec![candidate(Placetype::Place, 3, "Chatham")]));
        assert!(single(&r, "Springfield").await.is_none());
    }

    #[tokio::test]
    async fn test_single_skips_merged_and_municipal() {
        let mut municipal = candidate(Placetype::Place, 2, "Springfield");
        municipal.municipality = true;
        let r = resolver(Some(vec![
            merged(candidate(Placetype::Place, 1, "Springfield")),
            municipal,
            candidate(Placetype::Place, 3, "Springfield"),
        ]));
        assert_eq!(single(&r, "Springfield").await.unwrap().candidate.feature_id, 3);

        let r = resolver(Some(vec![merged(candidate(Placetype::Place, 1, "Springfield"))]));
        assert!(single(&r, "Springfield").await.is_none());
    }

    #[tokio::test]
    async fn test_single_shape_containment() {
        let shape = Geometry::Polygon(polygon![
            (x: -90.0, y: 39.0),
            (x: -89.0, y: 39.0),
            (x: -89.0, y: 40.0),
            (x: -90.0, y: 40.0),
            (x: -90.0, y: 39.0),
        ]);
        let mut outside = candidate(Placetype::Place, 1, "Springfield");
        outside.location = Some(GeoPoint::new(37.2, -93.3));
        let inside = candidate(Placetype::Place, 2, "Springfield");

        let r = resolver(Some(vec![outside, inside]));
        let res = r
            .resolve(HERE, Some("Springfield"), None, ONLY_PLACE, Some(&shape), None)
            .await
            .unwrap();
        assert_eq!(res.candidate.feature_id, 2);
    }

    #[tokio::test]
    async fn test_dual_top_sub_place() {
        let r = resolver(Some(vec![candidate(Placetype::SubPlace, 1, "Enos Park")]));
        let res = dual(&r).await.unwrap();
        assert_eq!(res.kind, MatchKind::SameEntity);
        assert_eq!(res.candidate.feature_id, 1);

        let r = resolver(Some(vec![merged(candidate(Placetype::SubPlace, 1, "Enos Park"))]));
        assert!(dual(&r).await.is_none());
    }

    #[tokio::test]
    async fn test_dual_unmerged_place_alone_is_misclassified() {
        let r = resolver(Some(vec![candidate(Placetype::Place, 1, "Enos Park")]));
        let res = dual(&r).await.unwrap();
        assert_eq!(res.kind, MatchKind::Misclassified);
        assert_eq!(res.candidate.placetype, Placetype::Place);
    }

    #[tokio::test]
    async fn test_dual_merged_place_alone() {
        let r = resolver(Some(vec![merged(candidate(Placetype::Place, 1, "Enos Park"))]));
        assert!(dual(&r).await.is_none());
    }

    #[tokio::test]
    async fn test_dual_merged_place_then_sub_place() {
        let r = resolver(Some(vec![
            merged(candidate(Placetype::Place, 1, "Springfield")),
            merged(candidate(Placetype::SubPlace, 2, "Enos Park")),
            candidate(Placetype::SubPlace, 3, "Enos Park"),
        ]));
        let res = dual(&r).await.unwrap();
        assert_eq!(res.kind, MatchKind::SameEntity);
        assert_eq!(res.candidate.feature_id, 3);
    }

    #[tokio::test]
    async fn test_dual_ambiguous() {
        let r = resolver(Some(vec![
            candidate(Placetype::Place, 1, "Enos Park"),
            candidate(Placetype::SubPlace, 2, "Enos Park"),
        ]));
        let res = dual(&r).await.unwrap();
        assert_eq!(res.kind, MatchKind::Ambiguous);
        assert_eq!(res.candidate.feature_id, 2);
    }

    #[tokio::test]
    async fn test_poi_target_uses_single_logic() {
        let r = resolver(Some(vec![
            candidate(Placetype::Place, 1, "Elsewhere"),
            candidate(Placetype::SubPlace, 2, "Crossroads"),
        ]));
        let res = r
            .resolve(
                HERE,
                Some("Crossroads"),
                None,
                PLACE_AND_SUB_PLACE,
                None,
                Some(Placetype::Poi),
            )
            .await
            .unwrap();
        assert_eq!(res.candidate.feature_id, 2);
        assert_eq!(res.kind, MatchKind::SameEntity);
    }
}
