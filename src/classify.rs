//! Decides what kind of feature an incoming row describes.

use crate::policy::AdmLevelPolicy;

/// Tags of divisions within a settlement.
const SUB_PLACE_TAGS: &[&str] = &[
    "neighbourhood",
    "quarter",
    "isolated_dwelling",
    "suburb",
    "city_block",
    "borough",
];

/// Settlement tags, never sub-places whatever their admin level says.
const SETTLEMENT_TAGS: &[&str] = &["city", "village", "town", "hamlet"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    PointOfInterest,
    SubPlace,
    Place,
}

fn tag_in(tag: Option<&str>, set: &[&str]) -> bool {
    tag.is_some_and(|t| set.iter().any(|s| s.eq_ignore_ascii_case(t.trim())))
}

/// Classify a row from its place tag, country, raw admin level and name.
///
/// The point-of-interest rule is checked first: a "locality" on a level that
/// is not a place level in its country is not a settlement at all.
pub fn classify(
    tag: Option<&str>,
    country_code: Option<&str>,
    raw_adm_level: Option<&str>,
    name: &str,
    policy: &dyn AdmLevelPolicy,
) -> Classification {
    let raw_level = raw_adm_level.unwrap_or("");

    if tag.is_some_and(|t| t.trim().eq_ignore_ascii_case("locality"))
        && !policy.is_place_level(country_code, raw_level)
    {
        return Classification::PointOfInterest;
    }

    if is_sub_place(tag, country_code, raw_level, name, policy) {
        Classification::SubPlace
    } else {
        Classification::Place
    }
}

fn is_sub_place(
    tag: Option<&str>,
    country_code: Option<&str>,
    raw_level: &str,
    name: &str,
    policy: &dyn AdmLevelPolicy,
) -> bool {
    if name.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    if tag_in(tag, SETTLEMENT_TAGS) {
        return false;
    }
    tag_in(tag, SUB_PLACE_TAGS) || policy.is_sub_place_level(country_code, raw_level)
}
