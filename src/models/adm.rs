//! Administrative hierarchy types.

use serde::{Deserialize, Serialize};

use super::feature::AdmNames;
use super::GeoPoint;

/// One entry of an "is in administrative hierarchy" column.
///
/// Lists of descriptors are kept sorted by ascending `level` (most global first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmDescriptor {
    /// Admin area name, absent when the column had an empty component
    pub name: Option<String>,
    /// Map-extract admin_level
    pub level: u8,
    /// Map-extract relation id, 0 when unknown
    pub external_id: i64,
}

impl AdmDescriptor {
    pub fn new(name: Option<String>, level: u8, external_id: i64) -> Self {
        Self {
            name,
            level,
            external_id,
        }
    }
}

/// Stored administrative area, the parent of places and sub-places.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmRecord {
    pub feature_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Level in the 1..=5 administrative slot scheme
    pub level: u8,
    /// Names of this area and its ancestors, level 1 first
    #[serde(default)]
    pub adm_names: AdmNames,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}
