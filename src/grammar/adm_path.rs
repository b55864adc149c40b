//! "Is in administrative hierarchy" blobs.
//!
//! `Illinois___4___122586___Sangamon County___6___122590___` reads as
//! triples of (name, admin level, external id) with `___` both inside and
//! between triples.

use tracing::warn;

use crate::models::feature::ADM_LEVELS;
use crate::models::{AdmDescriptor, AdmRecord, GeoFeature};
use crate::policy::AdmLevelPolicy;

const DELIMITER: &str = "___";

/// Parse a hierarchy blob into descriptors sorted by ascending level.
///
/// A non-numeric level drops the entry; a non-numeric id keeps it with id 0.
pub fn parse_is_in_adm(blob: &str) -> Vec<AdmDescriptor> {
    let parts: Vec<&str> = blob.trim().split(DELIMITER).collect();
    let mut adms = Vec::with_capacity(parts.len() / 3 + 1);

    for (i, triple) in parts.chunks(3).enumerate() {
        let name = triple.first().map(|s| s.trim()).unwrap_or_default();
        let level = triple.get(1).map(|s| s.trim()).unwrap_or_default();
        let id = triple.get(2).map(|s| s.trim()).unwrap_or_default();

        // trailing delimiter
        if name.is_empty() && level.is_empty() && id.is_empty() {
            continue;
        }

        let level: u8 = match level.parse() {
            Ok(level) => level,
            Err(_) => {
                warn!("Wrong adm level '{}' for isInAdm entry {} in {}", level, i, blob);
                continue;
            }
        };
        let external_id = match id.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                if !id.is_empty() {
                    warn!("Wrong external id '{}' for isInAdm entry {} in {}", id, i, blob);
                }
                0
            }
        };

        let name = (!name.is_empty()).then(|| name.to_string());
        adms.push(AdmDescriptor::new(name, level, external_id));
    }

    adms.sort_by_key(|a| a.level);
    adms
}

/// Fill the feature's adm-name slots, most global first.
///
/// Only entries above the feature's own level are taken (`current_level` 0
/// means unknown), consecutive duplicates are collapsed and levels the
/// country does not treat as administrative are ignored.
pub fn populate_adm_names(
    feature: &mut GeoFeature,
    current_level: u8,
    adms: &[AdmDescriptor],
    policy: &dyn AdmLevelPolicy,
) {
    let country_code = feature.country_code.clone();
    let mut slot = 1;
    let mut last_name = String::new();

    for adm in adms {
        let Some(name) = adm.name.as_deref() else {
            continue;
        };
        if current_level != 0 && adm.level >= current_level {
            continue;
        }
        if last_name.to_lowercase() == name.to_lowercase() {
            continue;
        }
        if !policy.should_be_imported_as_administrative(country_code.as_deref(), adm.level) {
            continue;
        }
        if slot > ADM_LEVELS {
            break;
        }
        feature.adm_names.set(slot, Some(name.to_string()));
        slot += 1;
        last_name = name.to_string();
    }
}

/// Copy adm-name slots from the parent record, collapsing consecutive duplicates.
pub fn populate_adm_names_from_adm(feature: &mut GeoFeature, adm: &AdmRecord) {
    let mut slot = 1;
    let mut last_name = String::new();
    for name in adm.adm_names.iter() {
        if last_name.to_lowercase() == name.to_lowercase() {
            continue;
        }
        feature.adm_names.set(slot, Some(name.to_string()));
        slot += 1;
        last_name = name.to_string();
    }
}
