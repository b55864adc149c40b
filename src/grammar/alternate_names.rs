//! Alternate-name blobs.
//!
//! A blob packs `key===value` segments without a fixed separator, e.g.
//!
//! ```text
//! "{""name:fr""===""Springfield"",""alt_name""===""Springfield City;SFD""}"
//! _name===Springfield,"fr_name"===Springfield (fr)
//! name:de===Köln___name:nl===Keulen
//! ```
//!
//! The tokenizer anchors on every `===`, reads the key backwards from it and
//! the value forwards up to the next key. Values then split into several names
//! on `;`, `|`, `,` and `:`.

use tracing::{debug, warn};

use super::decompound;
use crate::models::{AlternateName, FieldLimits, GeoFeature, Source};

const SEPARATOR: &str = "===";
const FIELD_BREAK: &str = "___";

/// Key fragments that mark a tag as metadata rather than a name.
const BLACKLIST: &[&str] = &[
    "source",
    "fixme",
    "prefix",
    "suffix",
    "postfix",
    "remove",
    "erroneous",
    "pronunciation",
    "systemname",
    "wikidata",
    "note",
];

/// `<xx>_name` prefixes that qualify the name instead of giving its language.
const NAME_QUALIFIERS: &[&str] = &[
    "alt", "old", "loc", "reg", "nat", "int", "sh", "ref", "not", "own", "lit",
];

const VALUE_SEPARATORS: &[char] = &[';', '|', ',', ':'];

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '"')
}

fn is_unwanted_key(key: &str) -> bool {
    let key = key.to_lowercase();
    BLACKLIST.iter().any(|b| key.contains(b))
}

/// Language code carried by a key, if any.
///
/// `name:fr` and `alt_name:fr` give "fr"; `fr_name` gives "fr" unless the
/// prefix is a qualifier like `alt` or `old`; plain `name` gives none.
pub fn language_of(key: &str) -> Option<String> {
    let key = key.trim_matches(|c: char| c == '"' || c == '_').to_lowercase();
    if let Some(idx) = key.rfind("name:") {
        let lang = &key[idx + "name:".len()..];
        return (!lang.is_empty()).then(|| lang.to_string());
    }
    let prefix = key.strip_suffix("_name")?;
    let is_code = (2..=3).contains(&prefix.len()) && prefix.chars().all(|c| c.is_ascii_lowercase());
    (is_code && !NAME_QUALIFIERS.contains(&prefix)).then(|| prefix.to_string())
}

/// Undo the CSV-style quoting a blob may arrive with.
fn unquote(blob: &str) -> String {
    let blob = blob.trim();
    let inner = if blob.len() >= 2 && blob.starts_with('"') && blob.ends_with('"') {
        &blob[1..blob.len() - 1]
    } else {
        blob
    };
    inner.replace("\"\"", "\"")
}

/// Where the key ending at `end` starts.
fn key_start(text: &str, floor: usize, end: usize) -> usize {
    let region = &text[floor..end];
    let mut start = end;
    for (idx, c) in region.char_indices().rev() {
        if !is_key_char(c) {
            break;
        }
        start = floor + idx;
    }
    // a "___" inside the run separates the previous value from the key
    match text[start..end].rfind(FIELD_BREAK) {
        Some(idx) => start + idx + FIELD_BREAK.len(),
        None => start,
    }
}

fn clean_value(raw: &str) -> &str {
    let raw = raw.trim_start_matches(['"', '{', ' ']);
    let mut value = raw;
    loop {
        let trimmed = value
            .trim_end()
            .trim_end_matches(['"', '}', ','])
            .trim_end_matches(FIELD_BREAK);
        if trimmed.len() == value.len() {
            return value;
        }
        value = trimmed;
    }
}

/// Parse a blob into `(language, raw value)` pairs, in blob order.
///
/// Segments whose key holds a blacklisted fragment are dropped. Segments
/// whose key does not name anything are malformed and skipped with a warning.
pub fn parse_alternate_names(blob: &str) -> Vec<(Option<String>, String)> {
    let text = unquote(blob);
    let anchors: Vec<usize> = text.match_indices(SEPARATOR).map(|(i, _)| i).collect();
    let mut pairs = Vec::new();

    let mut floor = 0;
    let mut keys = Vec::with_capacity(anchors.len());
    for &anchor in &anchors {
        let start = key_start(&text, floor, anchor);
        keys.push((start, anchor));
        floor = anchor + SEPARATOR.len();
    }

    for (i, &(start, anchor)) in keys.iter().enumerate() {
        let key = text[start..anchor].trim_matches(|c: char| c == '"' || c == '-' || c == ':');
        let value_start = anchor + SEPARATOR.len();
        let value_end = keys.get(i + 1).map_or(text.len(), |(next, _)| *next);
        let value = clean_value(&text[value_start..value_end.max(value_start)]);

        if key.is_empty() || !key.to_lowercase().contains("name") {
            warn!("Malformed alternate name segment {} in {}", i, blob);
            continue;
        }
        if is_unwanted_key(key) {
            debug!("{} is not an alternate name we want", key);
            continue;
        }
        if value.trim().is_empty() {
            continue;
        }
        pairs.push((language_of(key), value.to_string()));
    }
    pairs
}

/// Parse `blob` and add the names it holds to `feature`.
///
/// Returns the number of alternate names added.
pub fn populate_alternate_names(
    feature: &mut GeoFeature,
    blob: &str,
    limits: &FieldLimits,
) -> usize {
    let linear = feature.is_linear();
    let country_code = feature.country_code.clone();
    let mut added = 0;

    let mut add = |feature: &mut GeoFeature, name: String, language: Option<String>| {
        let an = AlternateName::new(name, language, Source::MapExtract, country_code.clone());
        if feature.add_alternate_name(an) {
            added += 1;
        }
    };

    for (raw_language, value) in parse_alternate_names(blob) {
        let language = raw_language
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty() && l.chars().count() <= limits.max_language_length);
        let german = language.as_deref() == Some("de");

        for name in value.split(VALUE_SEPARATORS).map(str::trim) {
            if name.is_empty() || name.chars().count() > limits.max_name_length {
                continue;
            }

            if linear && feature.name.trim().is_empty() {
                feature.name = name.to_string();
                if german {
                    if let Some(other) = decompound::other_format(name) {
                        add(feature, other, language.clone());
                    }
                }
                continue;
            }

            add(feature, name.to_string(), language.clone());
            if linear && german {
                if let Some(other) = decompound::other_format(name) {
                    add(feature, other, language.clone());
                }
            }
        }
    }

    if linear && feature.country_code.as_deref() == Some("DE") {
        if let Some(other) = decompound::other_format(&feature.name) {
            let name = feature.name.clone();
            debug!("Adding decompounded form {} of {}", other, name);
            add(feature, other, Some("de".to_string()));
        }
    }

    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureKind;
    use geo::{line_string, Geometry};

    fn pair(lang: Option<&str>, value: &str) -> (Option<String>, String) {
        (lang.map(String::from), value.to_string())
    }

    #[test]
    fn test_documented_example() {
        let pairs = parse_alternate_names(r#"_name===Springfield,"fr_name"===Springfield (fr)"#);
        assert_eq!(
            pairs,
            vec![pair(None, "Springfield"), pair(Some("fr"), "Springfield (fr)")]
        );
    }

    #[test]
    fn test_blacklisted_segments_dropped() {
        assert!(parse_alternate_names("note===ignored").is_empty());
        let pairs = parse_alternate_names(
            "name:fr===Paris___source:name===survey___NAME_PRONUNCIATION===pa-ri",
        );
        assert_eq!(pairs, vec![pair(Some("fr"), "Paris")]);
    }

    #[test]
    fn test_quoted_export() {
        let blob = r#""{""name:fr""===""Cologne"",""alt_name""===""Colonia;Kölle""}""#;
        let pairs = parse_alternate_names(blob);
        assert_eq!(
            pairs,
            vec![pair(Some("fr"), "Cologne"), pair(None, "Colonia;Kölle")]
        );
    }

    #[test]
    fn test_field_break_between_segments() {
        let pairs = parse_alternate_names("name:de===Köln___name:nl===Keulen___old_name===Colonia");
        assert_eq!(
            pairs,
            vec![
                pair(Some("de"), "Köln"),
                pair(Some("nl"), "Keulen"),
                pair(None, "Colonia")
            ]
        );
    }

    #[test]
    fn test_malformed_segment_does_not_abort() {
        let pairs = parse_alternate_names("===orphan___name:it===Colonia");
        assert_eq!(pairs, vec![pair(Some("it"), "Colonia")]);
    }

    #[test]
    fn test_language_of() {
        assert_eq!(language_of("name:zh-Hans").as_deref(), Some("zh-hans"));
        assert_eq!(language_of("alt_name:de").as_deref(), Some("de"));
        assert_eq!(language_of("\"fr_name\"").as_deref(), Some("fr"));
        assert_eq!(language_of("alt_name"), None);
        assert_eq!(language_of("official_name"), None);
        assert_eq!(language_of("_name"), None);
    }

    #[test]
    fn test_populate_splits_and_dedups() {
        let mut f = GeoFeature::new(1, FeatureKind::Place { municipality: false }, "Köln");
        f.country_code = Some("DE".into());
        let added = populate_alternate_names(
            &mut f,
            "name:FR===Cologne;Cologne|Colonia___alt_name===Kölle",
            &FieldLimits::default(),
        );
        assert_eq!(added, 3);
        assert!(f.has_alternate_name("Cologne", Some("fr")));
        assert!(f.has_alternate_name("Colonia", Some("fr")));
        assert!(f.has_alternate_name("Kölle", None));
        assert_eq!(f.alternate_names()[0].country_code.as_deref(), Some("DE"));

        // running it again adds nothing
        let again = populate_alternate_names(
            &mut f,
            "name:fr===Cologne___alt_name===Kölle",
            &FieldLimits::default(),
        );
        assert_eq!(again, 0);
    }

    #[test]
    fn test_populate_limits() {
        let limits = FieldLimits {
            max_name_length: 6,
            max_language_length: 2,
        };
        let mut f = GeoFeature::new(1, FeatureKind::SubPlace, "X");
        populate_alternate_names(&mut f, "name:fra===Short,Too long name", &limits);
        // language too long falls back to none, long name rejected
        assert_eq!(f.alternate_names().len(), 1);
        assert!(f.has_alternate_name("Short", None));
    }

    #[test]
    fn test_german_street_gets_decompounded_form() {
        let mut street = GeoFeature::new(1, FeatureKind::PointOfInterest, "Goethestraße");
        street.country_code = Some("DE".into());
        street.shape = Some(Geometry::LineString(
            line_string![(x: 6.95, y: 50.93), (x: 6.96, y: 50.94)],
        ));

        populate_alternate_names(&mut street, "name:de===Lindenweg", &FieldLimits::default());
        assert!(street.has_alternate_name("Lindenweg", Some("de")));
        assert!(street.has_alternate_name("Linden Weg", Some("de")));
        assert!(street.has_alternate_name("Goethe Straße", Some("de")));
    }

    #[test]
    fn test_non_linear_feature_gets_no_synthesized_names() {
        let mut f = GeoFeature::new(1, FeatureKind::Place { municipality: false }, "Goethestraße");
        f.country_code = Some("DE".into());
        populate_alternate_names(&mut f, "name:de===Lindenweg", &FieldLimits::default());
        assert_eq!(f.alternate_names().len(), 1);
    }
}
