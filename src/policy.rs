//! Per-country administrative level conventions.
//!
//! The map extract tags boundaries with a numeric `admin_level` whose meaning
//! varies by country: level 8 is a municipality in France but a ward in
//! parts of Asia. The policy answers, for one country, which raw levels
//! denote places, which denote sub-places, and which are worth keeping as
//! administrative names.

use hashbrown::HashMap;
use serde::Deserialize;

/// Level convention consulted by the classifier and the adm-name filler.
pub trait AdmLevelPolicy: Send + Sync {
    /// `raw_level` is the untouched column value; unparsable levels are never place levels.
    fn is_place_level(&self, country_code: Option<&str>, raw_level: &str) -> bool;

    fn is_sub_place_level(&self, country_code: Option<&str>, raw_level: &str) -> bool;

    fn should_be_imported_as_administrative(&self, country_code: Option<&str>, level: u8) -> bool;
}

/// Level lists for one country; lists left out keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LevelSet {
    pub place: Vec<u8>,
    pub sub_place: Vec<u8>,
    pub administrative: Vec<u8>,
}

impl Default for LevelSet {
    fn default() -> Self {
        Self {
            place: vec![7, 8],
            sub_place: vec![9, 10, 11],
            administrative: (3..=8).collect(),
        }
    }
}

/// Level policy driven by the `[levels]` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryLevelTable {
    #[serde(default)]
    pub default: LevelSet,
    /// Keyed by upper-case ISO country code
    #[serde(default)]
    pub countries: HashMap<String, LevelSet>,
}

impl CountryLevelTable {
    fn levels_for(&self, country_code: Option<&str>) -> &LevelSet {
        country_code
            .and_then(|cc| self.countries.get(&cc.to_uppercase()))
            .unwrap_or(&self.default)
    }
}

fn parse_level(raw_level: &str) -> Option<u8> {
    raw_level.trim().parse().ok()
}

impl AdmLevelPolicy for CountryLevelTable {
    fn is_place_level(&self, country_code: Option<&str>, raw_level: &str) -> bool {
        parse_level(raw_level).is_some_and(|l| self.levels_for(country_code).place.contains(&l))
    }

    fn is_sub_place_level(&self, country_code: Option<&str>, raw_level: &str) -> bool {
        parse_level(raw_level)
            .is_some_and(|l| self.levels_for(country_code).sub_place.contains(&l))
    }

    fn should_be_imported_as_administrative(&self, country_code: Option<&str>, level: u8) -> bool {
        self.levels_for(country_code).administrative.contains(&level)
    }
}
