//! Stored feature record: places, sub-places and points of interest.

use chrono::{DateTime, Utc};
use geo::Geometry;
use serde::{Deserialize, Serialize};

use super::candidate::Placetype;
use super::GeoPoint;

/// Number of administrative-name slots carried by a feature.
pub const ADM_LEVELS: usize = 5;

/// Default maximum length of a feature name or alternate name.
pub const NAME_MAX_LENGTH: usize = 200;

/// Default maximum length of an alternate-name language code.
pub const LANGUAGE_MAX_LENGTH: usize = 7;

/// Where the data of a record comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    /// Authoritative gazetteer feed
    Gazetteer,
    /// Crowd-sourced map extract
    MapExtract,
    /// Gazetteer record merged with map-extract data
    Both,
}

/// Semantic type of a feature, decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placetype", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Populated settlement
    Place { municipality: bool },
    /// Division within a place (neighbourhood, borough, ...)
    SubPlace,
    /// Named feature that is not a settlement
    PointOfInterest,
}

impl FeatureKind {
    pub fn placetype(&self) -> Placetype {
        match self {
            FeatureKind::Place { .. } => Placetype::Place,
            FeatureKind::SubPlace => Placetype::SubPlace,
            FeatureKind::PointOfInterest => Placetype::Poi,
        }
    }
}

/// A name of the feature in some language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateName {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl AlternateName {
    pub fn new(
        name: impl Into<String>,
        language: Option<String>,
        source: Source,
        country_code: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language,
            source,
            country_code,
        }
    }
}

/// Postal code, unique per country on a feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipCode {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl ZipCode {
    pub fn new(code: impl Into<String>, country_code: Option<String>) -> Self {
        Self {
            code: code.into(),
            country_code,
        }
    }
}

/// Administrative names, level 1 (most global) to level 5.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmNames([Option<String>; ADM_LEVELS]);

impl AdmNames {
    /// Get the name at `level` (1-based).
    pub fn get(&self, level: usize) -> Option<&str> {
        if !(1..=ADM_LEVELS).contains(&level) {
            return None;
        }
        self.0[level - 1].as_deref()
    }

    /// Set the name at `level` (1-based). Returns false if the level is out of range.
    pub fn set(&mut self, level: usize, name: Option<String>) -> bool {
        if !(1..=ADM_LEVELS).contains(&level) {
            return false;
        }
        self.0[level - 1] = name;
        true
    }

    /// Names that are set, most global first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().filter_map(|n| n.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Link to the administrative record a feature belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmParent {
    pub feature_id: i64,
    pub name: String,
}

/// Length limits enforced when a feature is persisted.
#[derive(Debug, Clone, Copy)]
pub struct FieldLimits {
    pub max_name_length: usize,
    pub max_language_length: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            max_name_length: NAME_MAX_LENGTH,
            max_language_length: LANGUAGE_MAX_LENGTH,
        }
    }
}

/// Reconciled feature record.
///
/// `map_extract_id`, the alternate names and the postal codes are only
/// reachable through methods that keep their invariants: the map-extract id
/// is written at most once, and neither list holds duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFeature {
    /// Externally generated, never changes once assigned
    pub feature_id: i64,

    pub kind: FeatureKind,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascii_name: Option<String>,

    /// Upper-case ISO country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_centre_location: Option<GeoPoint>,

    /// Polygon or line geometry from the map extract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Geometry<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<i32>,

    /// Terrain elevation model value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gtopo30: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    pub source: Source,

    #[serde(skip_serializing_if = "Option::is_none")]
    map_extract_id: Option<i64>,

    /// Map-extract admin_level of the feature itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm_level: Option<u8>,

    #[serde(default)]
    pub adm_names: AdmNames,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<AdmParent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    zip_codes: Vec<ZipCode>,

    /// Preferred postal code among `zip_codes`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alternate_names: Vec<AlternateName>,

    /// Raw place/category tag from the map extract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_labels: Vec<String>,

    pub updated_at: DateTime<Utc>,
}

impl GeoFeature {
    /// Create a feature with minimal required fields
    pub fn new(feature_id: i64, kind: FeatureKind, name: impl Into<String>) -> Self {
        Self {
            feature_id,
            kind,
            name: name.into(),
            ascii_name: None,
            country_code: None,
            location: None,
            admin_centre_location: None,
            shape: None,
            population: None,
            elevation: None,
            gtopo30: None,
            timezone: None,
            source: Source::MapExtract,
            map_extract_id: None,
            adm_level: None,
            adm_names: AdmNames::default(),
            adm: None,
            zip_codes: Vec::new(),
            zip_code: None,
            alternate_names: Vec::new(),
            amenity: None,
            label: None,
            fully_qualified_name: None,
            alternate_labels: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn placetype(&self) -> Placetype {
        self.kind.placetype()
    }

    /// Only places can be municipalities.
    pub fn is_municipality(&self) -> bool {
        matches!(self.kind, FeatureKind::Place { municipality: true })
    }

    pub fn set_municipality(&mut self, value: bool) {
        if let FeatureKind::Place { municipality } = &mut self.kind {
            *municipality = value;
        }
    }

    pub fn map_extract_id(&self) -> Option<i64> {
        self.map_extract_id
    }

    /// First writer wins: returns false and leaves the record alone if an id is already set.
    pub fn set_map_extract_id(&mut self, id: i64) -> bool {
        if self.map_extract_id.is_some() {
            return false;
        }
        self.map_extract_id = Some(id);
        true
    }

    pub fn alternate_names(&self) -> &[AlternateName] {
        &self.alternate_names
    }

    pub fn has_alternate_name(&self, name: &str, language: Option<&str>) -> bool {
        self.alternate_names
            .iter()
            .any(|an| an.name == name && an.language.as_deref() == language)
    }

    /// Add an alternate name unless the (name, language) pair is already present.
    pub fn add_alternate_name(&mut self, alternate_name: AlternateName) -> bool {
        if self.has_alternate_name(&alternate_name.name, alternate_name.language.as_deref()) {
            return false;
        }
        self.alternate_names.push(alternate_name);
        true
    }

    pub fn zip_codes(&self) -> &[ZipCode] {
        &self.zip_codes
    }

    /// Add a postal code unless it is already present for the same country.
    pub fn add_zip_code(&mut self, zip: ZipCode) -> bool {
        if self.zip_codes.contains(&zip) {
            return false;
        }
        self.zip_codes.push(zip);
        true
    }

    /// Streets and other way-like features carry a line shape.
    pub fn is_linear(&self) -> bool {
        matches!(
            self.shape,
            Some(Geometry::LineString(_)) | Some(Geometry::MultiLineString(_))
        )
    }

    /// Copy gazetteer-only attributes from a record that is being replaced.
    ///
    /// Population is reset to zero: the replaced record either had none, or
    /// described another kind of entity.
    pub fn inherit_secondary_attributes(&mut self, from: &GeoFeature) {
        self.population = Some(0);
        self.elevation = from.elevation;
        self.gtopo30 = from.gtopo30;
        self.timezone = from.timezone.clone();
        self.ascii_name = from.ascii_name.clone();
    }

    /// Check the constraints a persistent store enforces on save.
    pub fn check_constraints(&self, limits: &FieldLimits) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("feature {} has an empty name", self.feature_id));
        }
        if self.name.chars().count() > limits.max_name_length {
            return Err(format!(
                "name of feature {} exceeds {} characters",
                self.feature_id, limits.max_name_length
            ));
        }
        for an in &self.alternate_names {
            if an.name.chars().count() > limits.max_name_length {
                return Err(format!(
                    "alternate name '{}' of feature {} is too long",
                    an.name, self.feature_id
                ));
            }
            if let Some(lang) = &an.language {
                if lang.chars().count() > limits.max_language_length {
                    return Err(format!(
                        "language code '{}' of feature {} is too long",
                        lang, self.feature_id
                    ));
                }
            }
        }
        Ok(())
    }
}
