//! Row-by-row reconciliation of map-extract rows against existing records.
//!
//! Each row is classified, matched against the search index, then either
//! merged into the record it matches or turned into a new record. Rows of
//! one file must be processed in order: relation rows come before the node
//! rows of the same entity, and "only if no map-extract id yet" rules make
//! the first writer win.

mod row;
mod summary;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::adm_link::AdmHierarchyLinker;
use crate::classify::{classify, Classification};
use crate::config::{EngineConfig, SearchConfig};
use crate::error::{RowError, StoreError};
use crate::grammar::{
    best_zip_code, is_unwanted_zip_code, parse_is_in_adm, populate_adm_names,
    populate_alternate_names, split_postal,
};
use crate::ids::IdGenerator;
use crate::labels::LabelGenerator;
use crate::models::candidate::{ONLY_PLACE, PLACE_AND_SUB_PLACE};
use crate::models::{FeatureKind, FieldLimits, GeoFeature, Placetype, Source, ZipCode};
use crate::municipality::MunicipalityDetector;
use crate::policy::AdmLevelPolicy;
use crate::search::{CandidateResolver, CandidateSearch, MatchKind};
use crate::store::FeatureStore;

pub use row::{dump_fields, InputRow, COLUMN_COUNT};
pub use summary::RunSummary;

use row::{COL_ALTERNATE_NAMES, COL_IS_IN, COL_IS_IN_ADM, COL_POSTAL_CODE, COL_SUBDIVISION_POSTAL_CODE};

/// External services the engine works with
#[derive(Clone)]
pub struct Capabilities {
    pub ids: Arc<dyn IdGenerator>,
    pub store: Arc<dyn FeatureStore>,
    pub search: Arc<dyn CandidateSearch>,
    pub detector: Arc<dyn MunicipalityDetector>,
    pub labels: Arc<dyn LabelGenerator>,
    pub policy: Arc<dyn AdmLevelPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Comment or blank line, not counted
    Comment,
    Invalid(RowError),
    /// The row describes a point of interest but the matching record is
    /// populated; the record is left as it is.
    Conflict { placetype: Placetype, feature_id: i64 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Created { placetype: Placetype, feature_id: i64 },
    Updated { placetype: Placetype, feature_id: i64 },
    /// A place that is really a sub-place was removed and recreated
    DemotedAndRecreated { removed: i64, created: i64 },
    /// An unpopulated place or sub-place was replaced by a point of interest
    DeletedSuperseded { removed: i64, created: i64 },
    Skipped(SkipReason),
}

impl RowOutcome {
    fn created(feature: &GeoFeature) -> Self {
        RowOutcome::Created {
            placetype: feature.placetype(),
            feature_id: feature.feature_id,
        }
    }

    fn updated(feature: &GeoFeature) -> Self {
        RowOutcome::Updated {
            placetype: feature.placetype(),
            feature_id: feature.feature_id,
        }
    }
}

/// What a branch decided: the record to write after post-processing and
/// the record it replaces, removed only once the write succeeded.
struct Decision {
    feature: Option<GeoFeature>,
    replaces: Option<(Placetype, i64)>,
    outcome: RowOutcome,
}

impl Decision {
    fn write(feature: GeoFeature, outcome: RowOutcome) -> Self {
        Self {
            feature: Some(feature),
            replaces: None,
            outcome,
        }
    }

    fn replace(feature: GeoFeature, removed: (Placetype, i64), outcome: RowOutcome) -> Self {
        Self {
            feature: Some(feature),
            replaces: Some(removed),
            outcome,
        }
    }

    fn nothing(outcome: RowOutcome) -> Self {
        Self {
            feature: None,
            replaces: None,
            outcome,
        }
    }
}

pub struct ReconciliationEngine {
    caps: Capabilities,
    resolver: CandidateResolver,
    linker: AdmHierarchyLinker,
    limits: FieldLimits,
    batch_size: usize,
    pending: usize,
    summary: RunSummary,
}

impl ReconciliationEngine {
    pub fn new(caps: Capabilities, engine: &EngineConfig, search: &SearchConfig) -> Self {
        let resolver = CandidateResolver::new(
            caps.search.clone(),
            search.min_score,
            search.name_similarity,
            search.candidate_limit,
        );
        let linker = AdmHierarchyLinker::new(caps.search.clone(), caps.store.clone());
        Self {
            caps,
            resolver,
            linker,
            limits: engine.limits(),
            batch_size: engine.batch_size.max(1),
            pending: 0,
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Reconcile one tab-separated line.
    pub async fn process_line(&mut self, line: &str) -> RowOutcome {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return RowOutcome::Skipped(SkipReason::Comment);
        }
        let fields: Vec<&str> = line.split('\t').collect();
        self.process_fields(&fields).await
    }

    /// Reconcile one row given as columns. Never fails: every error ends up
    /// as a logged, skipped row.
    pub async fn process_fields(&mut self, fields: &[&str]) -> RowOutcome {
        if fields.first().is_some_and(|f| f.starts_with('#')) {
            return RowOutcome::Skipped(SkipReason::Comment);
        }

        let outcome = match InputRow::from_fields(fields, &self.limits) {
            Err(e) => {
                warn!("Skipping row: {} ({})", e, dump_fields(fields));
                RowOutcome::Skipped(SkipReason::Invalid(e))
            }
            Ok(row) => match self.reconcile(&row).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Error reconciling {}: {} ({})", row.name, e, row.dump_fields());
                    RowOutcome::Skipped(SkipReason::Failed(e.to_string()))
                }
            },
        };

        self.summary.record(&outcome);
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.flush().await;
        }
        outcome
    }

    async fn flush(&mut self) {
        self.pending = 0;
        if let Err(e) = self.caps.store.flush().await {
            error!("Error flushing store: {}", e);
        }
    }

    /// Flush what is left and return the counts of this engine's rows.
    pub async fn finish(self) -> Result<RunSummary, StoreError> {
        self.caps.store.flush().await?;
        Ok(self.summary)
    }

    async fn reconcile(&mut self, row: &InputRow) -> Result<RowOutcome, StoreError> {
        let classification = classify(
            row.tag(),
            row.country_code.as_deref(),
            row.raw_adm_level(),
            &row.name,
            self.caps.policy.as_ref(),
        );
        debug!("{} is a {:?}", row.name, classification);

        let decision = match classification {
            Classification::PointOfInterest => self.reconcile_poi(row).await?,
            Classification::SubPlace => self.reconcile_sub_place(row).await?,
            Classification::Place => self.reconcile_place(row).await?,
        };

        if let Some(mut feature) = decision.feature {
            self.populate(&mut feature, row).await;
            self.caps.store.save(&feature).await?;
            if let Some((placetype, feature_id)) = decision.replaces {
                self.caps.store.remove(placetype, feature_id).await?;
            }
        }
        Ok(decision.outcome)
    }

    /// Fresh record for the row, owned by the map extract.
    fn new_feature(&self, kind: FeatureKind, row: &InputRow) -> Result<GeoFeature, StoreError> {
        let mut feature = GeoFeature::new(self.caps.ids.next_id()?, kind, row.name.clone());
        feature.country_code = row.country_code.clone();
        feature.location = row.location;
        feature.admin_centre_location = row.admin_centre_location;
        feature.source = Source::MapExtract;
        Ok(feature)
    }

    fn create(&self, kind: FeatureKind, row: &InputRow) -> Result<Decision, StoreError> {
        let feature = self.new_feature(kind, row)?;
        let outcome = RowOutcome::created(&feature);
        Ok(Decision::write(feature, outcome))
    }

    async fn reconcile_poi(&mut self, row: &InputRow) -> Result<Decision, StoreError> {
        let resolution = self
            .resolver
            .resolve(
                row.location,
                Some(&row.name),
                row.country_code.as_deref(),
                PLACE_AND_SUB_PLACE,
                row.shape.as_ref(),
                Some(Placetype::Poi),
            )
            .await;

        let Some(resolution) = resolution else {
            return self.create(FeatureKind::PointOfInterest, row);
        };
        let candidate = resolution.candidate;
        let Some(existing) = self
            .caps
            .store
            .get(candidate.placetype, candidate.feature_id)
            .await?
        else {
            warn!(
                "{} {} is indexed but not stored, creating a point of interest",
                candidate.placetype, candidate.feature_id
            );
            return self.create(FeatureKind::PointOfInterest, row);
        };

        if existing.population.unwrap_or(0) != 0 {
            warn!(
                "{} {} ({}) has a population of {}, not turning it into a point of interest: {}",
                existing.placetype(),
                existing.feature_id,
                existing.name,
                existing.population.unwrap_or(0),
                row.dump_fields()
            );
            return Ok(Decision::nothing(RowOutcome::Skipped(SkipReason::Conflict {
                placetype: existing.placetype(),
                feature_id: existing.feature_id,
            })));
        }

        info!(
            "Replacing unpopulated {} {} ({}) with a point of interest",
            existing.placetype(),
            existing.feature_id,
            existing.name
        );
        let mut poi = self.new_feature(FeatureKind::PointOfInterest, row)?;
        poi.inherit_secondary_attributes(&existing);
        let outcome = RowOutcome::DeletedSuperseded {
            removed: existing.feature_id,
            created: poi.feature_id,
        };
        Ok(Decision::replace(
            poi,
            (existing.placetype(), existing.feature_id),
            outcome,
        ))
    }

    async fn reconcile_sub_place(&mut self, row: &InputRow) -> Result<Decision, StoreError> {
        let resolution = self
            .resolver
            .resolve(
                row.location,
                Some(&row.name),
                row.country_code.as_deref(),
                PLACE_AND_SUB_PLACE,
                row.shape.as_ref(),
                Some(Placetype::SubPlace),
            )
            .await;

        let Some(resolution) = resolution else {
            return self.create(FeatureKind::SubPlace, row);
        };
        if resolution.kind == MatchKind::Ambiguous {
            self.summary.ambiguous += 1;
            warn!(
                "Ambiguous candidates for {}, merging into sub-place {}: {}",
                row.name,
                resolution.candidate.feature_id,
                row.dump_fields()
            );
        }
        let candidate = resolution.candidate;

        match candidate.placetype {
            Placetype::SubPlace => {
                let Some(mut sub_place) = self
                    .caps
                    .store
                    .get(Placetype::SubPlace, candidate.feature_id)
                    .await?
                else {
                    return self.create(FeatureKind::SubPlace, row);
                };
                if sub_place.source == Source::Gazetteer {
                    sub_place.source = Source::Both;
                }
                if sub_place.map_extract_id().is_none() {
                    sub_place.name = row.name.clone();
                }
                if row.country_code.is_some() {
                    sub_place.country_code = row.country_code.clone();
                }
                if row.admin_centre_location.is_some() {
                    sub_place.admin_centre_location = row.admin_centre_location;
                }
                if row.location.is_some() {
                    sub_place.location = row.location;
                }
                let outcome = RowOutcome::updated(&sub_place);
                Ok(Decision::write(sub_place, outcome))
            }
            Placetype::Place if !candidate.is_merged() && !candidate.municipality => {
                let replaced = self
                    .caps
                    .store
                    .get(Placetype::Place, candidate.feature_id)
                    .await?;
                info!(
                    "Place {} ({}) is a sub-place, replacing it",
                    candidate.feature_id, row.name
                );
                let mut sub_place = self.new_feature(FeatureKind::SubPlace, row)?;
                match &replaced {
                    Some(replaced) => sub_place.inherit_secondary_attributes(replaced),
                    None => sub_place.population = Some(0),
                }
                let outcome = RowOutcome::DemotedAndRecreated {
                    removed: candidate.feature_id,
                    created: sub_place.feature_id,
                };
                Ok(Decision::replace(
                    sub_place,
                    (Placetype::Place, candidate.feature_id),
                    outcome,
                ))
            }
            _ => {
                debug!(
                    "Keeping {} {} next to new sub-place {}",
                    candidate.placetype, candidate.feature_id, row.name
                );
                self.create(FeatureKind::SubPlace, row)
            }
        }
    }

    async fn reconcile_place(&mut self, row: &InputRow) -> Result<Decision, StoreError> {
        let resolution = self
            .resolver
            .resolve(
                row.location,
                Some(&row.name),
                row.country_code.as_deref(),
                ONLY_PLACE,
                row.shape.as_ref(),
                None,
            )
            .await;

        let existing = match resolution {
            Some(resolution) => {
                self.caps
                    .store
                    .get(Placetype::Place, resolution.candidate.feature_id)
                    .await?
            }
            None => None,
        };

        let (mut place, outcome) = match existing {
            Some(mut place) => {
                if place.source == Source::Gazetteer {
                    place.source = Source::Both;
                }
                if place.map_extract_id().is_none() {
                    place.name = row.name.clone();
                    if row.location.is_some() {
                        place.location = row.location;
                    }
                }
                if row.country_code.is_some() {
                    place.country_code = row.country_code.clone();
                }
                if row.admin_centre_location.is_some() {
                    place.admin_centre_location = row.admin_centre_location;
                }
                let outcome = RowOutcome::updated(&place);
                (place, outcome)
            }
            None => {
                let place = self.new_feature(FeatureKind::Place { municipality: false }, row)?;
                let outcome = RowOutcome::created(&place);
                (place, outcome)
            }
        };

        if row.tag().is_some_and(|tag| tag.eq_ignore_ascii_case("locality")) {
            place.set_municipality(false);
        } else if !place.is_municipality() {
            let municipality = self.caps.detector.is_municipality(
                row.country_code.as_deref(),
                row.tag(),
                row.source_kind,
                Source::MapExtract,
            );
            place.set_municipality(municipality);
        }

        Ok(Decision::write(place, outcome))
    }

    /// Fill the record from the rest of the row: population, postal codes,
    /// tags, ids, names, parent and labels.
    async fn populate(&self, feature: &mut GeoFeature, row: &InputRow) {
        if feature.placetype() != Placetype::SubPlace {
            match row.population() {
                Some(Ok(population)) => feature.population = Some(population),
                Some(Err(e)) => warn!("Can not parse population of {}: {}", row.name, e),
                None => {}
            }
        }

        let country_code = feature.country_code.clone();
        for column in [COL_POSTAL_CODE, COL_SUBDIVISION_POSTAL_CODE] {
            let Some(raw) = row.field(column) else {
                continue;
            };
            for code in split_postal(raw) {
                if is_unwanted_zip_code(Some(code)) {
                    debug!("Ignoring postal code {} of {}", code, row.name);
                    continue;
                }
                feature.add_zip_code(ZipCode::new(code, country_code.clone()));
            }
        }
        let best = best_zip_code(feature.zip_codes().iter().map(|z| z.code.as_str()))
            .map(str::to_string);
        if best.is_some() {
            feature.zip_code = best;
        }

        if let Some(tag) = row.tag() {
            feature.amenity = Some(tag.to_string());
        }
        if let Some(shape) = &row.shape {
            feature.shape = Some(shape.clone());
        }
        if let Some(id) = row.map_extract_id {
            if !feature.set_map_extract_id(id) && feature.map_extract_id() != Some(id) {
                debug!(
                    "{} keeps map-extract id {:?}, ignoring {}",
                    feature.name,
                    feature.map_extract_id(),
                    id
                );
            }
        }
        if let Some(level) = row.adm_level() {
            feature.adm_level = Some(level);
        }

        if let Some(blob) = row.field(COL_ALTERNATE_NAMES) {
            populate_alternate_names(feature, blob, &self.limits);
        }

        if let Some(blob) = row.field(COL_IS_IN_ADM) {
            let adms = parse_is_in_adm(blob);
            populate_adm_names(
                feature,
                row.adm_level().unwrap_or(0),
                &adms,
                self.caps.policy.as_ref(),
            );
            if feature.adm.is_none() && !self.linker.link(feature, &adms).await {
                debug!("No adm found for {}", feature.name);
            }
        } else if let Some(is_in) = row.field(COL_IS_IN) {
            if feature.adm.is_none() && !self.linker.link_from_is_in(feature, is_in).await {
                debug!("No adm named {} for {}", is_in, feature.name);
            }
        }

        feature.label = Some(self.caps.labels.label(feature));
        feature.fully_qualified_name = Some(self.caps.labels.qualified_name(feature));
        feature.alternate_labels = self.caps.labels.alternate_labels(feature);
        feature.updated_at = Utc::now();
    }
}
