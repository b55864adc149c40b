use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AdmRecord, CandidateMatch, GeoFeature, GeoPoint, Placetype};

/// Search-index view of a stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDoc {
    pub feature_id: i64,
    pub placetype: Placetype,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_extract_id: Option<i64>,
    #[serde(default)]
    pub municipality: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Placetypes share one index, ids are only unique within a placetype.
pub fn doc_id(placetype: Placetype, feature_id: i64) -> String {
    format!("{}-{}", placetype, feature_id)
}

impl FeatureDoc {
    pub fn id(&self) -> String {
        doc_id(self.placetype, self.feature_id)
    }

    pub fn into_candidate(self, score: f64) -> CandidateMatch {
        CandidateMatch {
            placetype: self.placetype,
            feature_id: self.feature_id,
            map_extract_id: self.map_extract_id,
            municipality: self.municipality,
            name: Some(self.name),
            alternate_names: self.alternate_names,
            score,
            location: self.location,
        }
    }
}

impl From<&GeoFeature> for FeatureDoc {
    fn from(feature: &GeoFeature) -> Self {
        let mut alternate_names: Vec<String> = Vec::new();
        for an in feature.alternate_names() {
            if !alternate_names.contains(&an.name) {
                alternate_names.push(an.name.clone());
            }
        }
        Self {
            feature_id: feature.feature_id,
            placetype: feature.placetype(),
            name: feature.name.clone(),
            alternate_names,
            country_code: feature.country_code.clone(),
            location: feature.location,
            map_extract_id: feature.map_extract_id(),
            municipality: feature.is_municipality(),
            zip_code: feature.zip_code.clone(),
            label: feature.label.clone(),
            fully_qualified_name: feature.fully_qualified_name.clone(),
            updated_at: feature.updated_at,
        }
    }
}

impl From<&AdmRecord> for FeatureDoc {
    fn from(adm: &AdmRecord) -> Self {
        Self {
            feature_id: adm.feature_id,
            placetype: Placetype::Adm,
            name: adm.name.clone(),
            alternate_names: Vec::new(),
            country_code: adm.country_code.clone(),
            location: adm.location,
            map_extract_id: None,
            municipality: false,
            zip_code: None,
            label: None,
            fully_qualified_name: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlternateName, FeatureKind, Source};

    #[test]
    fn test_from_feature() {
        let mut f = GeoFeature::new(3, FeatureKind::Place { municipality: true }, "Köln");
        f.add_alternate_name(AlternateName::new("Cologne", Some("fr".into()), Source::MapExtract, None));
        f.add_alternate_name(AlternateName::new("Cologne", Some("en".into()), Source::MapExtract, None));
        let doc = FeatureDoc::from(&f);
        assert_eq!(doc.id(), "place-3");
        assert_eq!(doc.alternate_names, vec!["Cologne".to_string()]);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["placetype"], "place");
        assert_eq!(json["municipality"], true);
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_hit_source_into_candidate() {
        let source = serde_json::json!({
            "feature_id": 12,
            "placetype": "sub_place",
            "name": "Enos Park",
            "country_code": "US",
            "location": { "lat": 39.81, "lon": -89.65 },
            "map_extract_id": 3141,
            "updated_at": "2026-01-01T00:00:00Z"
        });
        let doc: FeatureDoc = serde_json::from_value(source).unwrap();
        let c = doc.into_candidate(7.5);
        assert_eq!(c.placetype, Placetype::SubPlace);
        assert!(c.is_merged());
        assert!(!c.municipality);
        assert_eq!(c.score, 7.5);
    }
}
