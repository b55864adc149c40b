//! Municipality detection for places.

use hashbrown::HashMap;
use serde::Deserialize;

use crate::models::Source;

/// Kind of map-extract object a row was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Node,
    Way,
    Relation,
}

impl SourceKind {
    /// First letter of the geometry-source column: N, W or R.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().chars().next()?.to_ascii_uppercase() {
            'N' => Some(SourceKind::Node),
            'W' => Some(SourceKind::Way),
            'R' => Some(SourceKind::Relation),
            _ => None,
        }
    }
}

pub trait MunicipalityDetector: Send + Sync {
    fn is_municipality(
        &self,
        country_code: Option<&str>,
        tag: Option<&str>,
        source_kind: Option<SourceKind>,
        provenance: Source,
    ) -> bool;
}

/// Place-tag driven detector, configured by the `[municipality]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TagMunicipalityDetector {
    /// Tags that make a boundary or area a municipality
    pub tags: Vec<String>,
    /// Tags strong enough to make a bare node a municipality
    pub node_tags: Vec<String>,
    /// Per-country tags that never denote a municipality
    pub excluded_tags: HashMap<String, Vec<String>>,
}

impl Default for TagMunicipalityDetector {
    fn default() -> Self {
        Self {
            tags: ["city", "town", "village", "municipality"]
                .map(String::from)
                .to_vec(),
            node_tags: ["city", "town"].map(String::from).to_vec(),
            excluded_tags: HashMap::new(),
        }
    }
}

fn contains_tag(list: &[String], tag: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

impl MunicipalityDetector for TagMunicipalityDetector {
    fn is_municipality(
        &self,
        country_code: Option<&str>,
        tag: Option<&str>,
        source_kind: Option<SourceKind>,
        provenance: Source,
    ) -> bool {
        if provenance == Source::Gazetteer {
            return false;
        }
        let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
            return false;
        };
        let excluded = country_code
            .and_then(|cc| self.excluded_tags.get(&cc.to_uppercase()))
            .is_some_and(|list| contains_tag(list, tag));
        if excluded {
            return false;
        }
        match source_kind {
            Some(SourceKind::Node) | None => contains_tag(&self.node_tags, tag),
            Some(SourceKind::Way) | Some(SourceKind::Relation) => contains_tag(&self.tags, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::parse("R"), Some(SourceKind::Relation));
        assert_eq!(SourceKind::parse("n"), Some(SourceKind::Node));
        assert_eq!(SourceKind::parse(""), None);
        assert_eq!(SourceKind::parse("X"), None);
    }

    #[test]
    fn test_default_rules() {
        let d = TagMunicipalityDetector::default();
        let relation = Some(SourceKind::Relation);
        let node = Some(SourceKind::Node);
        assert!(d.is_municipality(Some("US"), Some("village"), relation, Source::MapExtract));
        assert!(!d.is_municipality(Some("US"), Some("village"), node, Source::MapExtract));
        assert!(d.is_municipality(Some("US"), Some("City"), node, Source::MapExtract));
        assert!(!d.is_municipality(Some("US"), Some("hamlet"), relation, Source::MapExtract));
        assert!(!d.is_municipality(Some("US"), None, relation, Source::MapExtract));
        assert!(!d.is_municipality(Some("US"), Some("city"), relation, Source::Gazetteer));
    }

    #[test]
    fn test_country_exclusion() {
        let d: TagMunicipalityDetector = toml::from_str(
            r#"
            [excluded_tags]
            JP = ["village"]
            "#,
        )
        .unwrap();
        let relation = Some(SourceKind::Relation);
        assert!(!d.is_municipality(Some("jp"), Some("village"), relation, Source::MapExtract));
        assert!(d.is_municipality(Some("FR"), Some("village"), relation, Source::MapExtract));
    }
}
