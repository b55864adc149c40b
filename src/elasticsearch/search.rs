//! Candidate queries against the features index.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::document::FeatureDoc;
use super::EsClient;
use crate::error::SearchError;
use crate::models::CandidateMatch;
use crate::search::{CandidateSearch, SearchQuery};

pub struct EsCandidateSearch {
    client: EsClient,
    score_scale: f64,
}

impl EsCandidateSearch {
    /// `score_scale` is the raw score mapped to 0.5, see [`normalize_score`].
    pub fn new(client: EsClient, score_scale: f64) -> Self {
        Self {
            client,
            score_scale,
        }
    }
}

/// Map an unbounded relevance score onto [0, 1): `raw / (raw + scale)`.
///
/// Boosts and the distance decay put raw scores of the candidate query in
/// the tens to hundreds, while the same-entity threshold is expressed on
/// the [0, 1] scale shared with the in-memory index.
pub fn normalize_score(raw: f64, scale: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    raw / (raw + scale.max(f64::EPSILON))
}

/// Build the request body for a candidate query
pub fn build_query(query: &SearchQuery) -> serde_json::Value {
    let should_clauses = vec![
        json!({
            "match": {
                "name": {
                    "query": &query.name,
                    "boost": 10.0
                }
            }
        }),
        json!({
            "match_phrase": {
                "name": {
                    "query": &query.name,
                    "boost": 20.0
                }
            }
        }),
        json!({
            "match": {
                "alternate_names": {
                    "query": &query.name,
                    "boost": 5.0
                }
            }
        }),
    ];

    let mut filters = Vec::new();
    if !query.placetypes.is_empty() {
        let placetypes: Vec<&str> = query.placetypes.iter().map(|p| p.as_str()).collect();
        filters.push(json!({ "terms": { "placetype": placetypes } }));
    }
    if let Some(cc) = &query.country_code {
        filters.push(json!({ "term": { "country_code": cc } }));
    }

    let bool_query = json!({
        "should": should_clauses,
        "minimum_should_match": 1,
        "filter": filters
    });

    let query_body = match query.location {
        Some(loc) => json!({
            "function_score": {
                "query": { "bool": bool_query },
                "functions": [
                    {
                        "gauss": {
                            "location": {
                                "origin": { "lat": loc.lat, "lon": loc.lon },
                                "scale": "10km",
                                "offset": "2km",
                                "decay": 0.5
                            }
                        },
                        "weight": 3.0
                    }
                ],
                "score_mode": "sum",
                "boost_mode": "multiply"
            }
        }),
        None => json!({ "bool": bool_query }),
    };

    json!({
        "query": query_body,
        "size": query.limit
    })
}

/// Parse an Elasticsearch hit into a candidate
fn parse_hit(hit: &serde_json::Value, score_scale: f64) -> Option<CandidateMatch> {
    let score = normalize_score(hit["_score"].as_f64().unwrap_or(0.0), score_scale);
    let doc: FeatureDoc = serde_json::from_value(hit["_source"].clone()).ok()?;
    Some(doc.into_candidate(score))
}

#[async_trait]
impl CandidateSearch for EsCandidateSearch {
    async fn query(&self, query: &SearchQuery) -> Result<Vec<CandidateMatch>, SearchError> {
        let body = build_query(query);
        debug!("Candidate query: {}", body);

        let response = self
            .client
            .es()
            .search(elasticsearch::SearchParts::Index(&[self.client.index()]))
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            let status = response.status_code();
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::Response(format!("{}: {}", status, text)));
        }

        let response_body = response.json::<serde_json::Value>().await?;
        let hits = response_body["hits"]["hits"]
            .as_array()
            .ok_or_else(|| SearchError::Response("missing hits".into()))?;

        Ok(hits
            .iter()
            .filter_map(|hit| parse_hit(hit, self.score_scale))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::models::candidate::{ONLY_PLACE, PLACE_AND_SUB_PLACE};
    use crate::models::{GeoPoint, Placetype};
    use crate::search::CandidateResolver;
    use std::sync::Arc;

    #[test]
    fn test_query_filters() {
        let q = SearchQuery::new("Enos Park", PLACE_AND_SUB_PLACE)
            .near(GeoPoint::new(39.8, -89.6))
            .in_country(Some("us"))
            .limit(3);
        let body = build_query(&q);
        assert_eq!(body["size"], 3);
        let bool_query = &body["query"]["function_score"]["query"]["bool"];
        assert_eq!(
            bool_query["filter"][0]["terms"]["placetype"],
            json!(["place", "sub_place"])
        );
        assert_eq!(bool_query["filter"][1]["term"]["country_code"], "US");
        assert_eq!(
            body["query"]["function_score"]["functions"][0]["gauss"]["location"]["origin"]["lat"],
            39.8
        );
    }

    #[test]
    fn test_query_without_location() {
        let q = SearchQuery::new("Illinois", &[Placetype::Adm]);
        let body = build_query(&q);
        assert!(body["query"]["bool"].is_object());
        assert_eq!(body["size"], 1);
    }

    fn hit(id: i64, name: &str, score: f64) -> serde_json::Value {
        json!({
            "_id": format!("place-{}", id),
            "_score": score,
            "_source": {
                "feature_id": id,
                "placetype": "place",
                "name": name,
                "municipality": false,
                "location": { "lat": 39.78, "lon": -89.65 },
                "updated_at": "2026-01-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn test_parse_hit() {
        let mut raw = hit(1, "Springfield", 30.0);
        raw["_source"]["municipality"] = json!(true);
        let c = parse_hit(&raw, 30.0).unwrap();
        assert_eq!(c.feature_id, 1);
        assert!(c.municipality);
        assert_eq!(c.score, 0.5);

        assert!(parse_hit(&json!({ "_score": 1.0, "_source": { "name": "x" } }), 30.0).is_none());
    }

    #[test]
    fn test_normalize_score() {
        assert_eq!(normalize_score(0.0, 30.0), 0.0);
        assert_eq!(normalize_score(f64::NAN, 30.0), 0.0);
        assert!(normalize_score(14.2, 30.0) < 0.35);
        assert!(normalize_score(500.0, 30.0) > 0.9);
        assert!(normalize_score(1e12, 30.0) < 1.0);
    }

    /// Serves parsed hits the way `EsCandidateSearch` would.
    struct Hits(Vec<serde_json::Value>);

    #[async_trait]
    impl CandidateSearch for Hits {
        async fn query(&self, _query: &SearchQuery) -> Result<Vec<CandidateMatch>, SearchError> {
            let scale = SearchConfig::default().es_score_scale;
            Ok(self.0.iter().filter_map(|h| parse_hit(h, scale)).collect())
        }
    }

    #[tokio::test]
    async fn test_typical_hit_score_is_not_a_match_by_itself() {
        let config = SearchConfig::default();
        let resolver = CandidateResolver::new(
            Arc::new(Hits(vec![hit(1, "West Springfield", 14.2)])),
            config.min_score,
            config.name_similarity,
            config.candidate_limit,
        );
        let here = Some(GeoPoint::new(39.78, -89.65));
        let res = resolver
            .resolve(here, Some("Springfield"), Some("US"), ONLY_PLACE, None, None)
            .await;
        assert!(res.is_none());

        // a very strong hit still qualifies whatever its name
        let resolver = CandidateResolver::new(
            Arc::new(Hits(vec![hit(2, "Munich", 600.0)])),
            config.min_score,
            config.name_similarity,
            config.candidate_limit,
        );
        let res = resolver
            .resolve(here, Some("München"), Some("DE"), ONLY_PLACE, None, None)
            .await
            .unwrap();
        assert_eq!(res.candidate.feature_id, 2);
    }
}
