//! Search-side view of existing records.

use serde::{Deserialize, Serialize};

use super::{AdmRecord, GeoFeature, GeoPoint};

/// Kind of record a search hit refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placetype {
    Place,
    SubPlace,
    Poi,
    Adm,
}

impl Placetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placetype::Place => "place",
            Placetype::SubPlace => "sub_place",
            Placetype::Poi => "poi",
            Placetype::Adm => "adm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "place" => Some(Placetype::Place),
            "sub_place" => Some(Placetype::SubPlace),
            "poi" => Some(Placetype::Poi),
            "adm" => Some(Placetype::Adm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Placetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const PLACE_AND_SUB_PLACE: &[Placetype] = &[Placetype::Place, Placetype::SubPlace];
pub const ONLY_PLACE: &[Placetype] = &[Placetype::Place];
pub const ONLY_ADM: &[Placetype] = &[Placetype::Adm];

/// An existing record returned by the search capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub placetype: Placetype,
    pub feature_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_extract_id: Option<i64>,
    #[serde(default)]
    pub municipality: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_names: Vec<String>,
    /// Relevance score as reported by the search backend
    #[serde(default)]
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl CandidateMatch {
    /// A candidate that already carries a map-extract id has been reconciled before.
    pub fn is_merged(&self) -> bool {
        self.map_extract_id.is_some()
    }
}

impl From<&GeoFeature> for CandidateMatch {
    fn from(feature: &GeoFeature) -> Self {
        Self {
            placetype: feature.placetype(),
            feature_id: feature.feature_id,
            map_extract_id: feature.map_extract_id(),
            municipality: feature.is_municipality(),
            name: Some(feature.name.clone()),
            alternate_names: feature
                .alternate_names()
                .iter()
                .map(|an| an.name.clone())
                .collect(),
            score: 0.0,
            location: feature.location,
        }
    }
}

impl From<&AdmRecord> for CandidateMatch {
    fn from(adm: &AdmRecord) -> Self {
        Self {
            placetype: Placetype::Adm,
            feature_id: adm.feature_id,
            map_extract_id: None,
            municipality: false,
            name: Some(adm.name.clone()),
            alternate_names: Vec::new(),
            score: 0.0,
            location: adm.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureKind;

    #[test]
    fn test_placetype_names_roundtrip() {
        for pt in [
            Placetype::Place,
            Placetype::SubPlace,
            Placetype::Poi,
            Placetype::Adm,
        ] {
            assert_eq!(Placetype::parse(pt.as_str()), Some(pt));
        }
        assert_eq!(Placetype::parse("city"), None);
    }

    #[test]
    fn test_from_feature() {
        let mut f = GeoFeature::new(9, FeatureKind::Place { municipality: true }, "Lyon");
        f.location = Some(GeoPoint::new(45.76, 4.83));
        let c = CandidateMatch::from(&f);
        assert_eq!(c.placetype, Placetype::Place);
        assert!(c.municipality);
        assert!(!c.is_merged());

        f.set_map_extract_id(120965);
        assert!(CandidateMatch::from(&f).is_merged());
    }
}
