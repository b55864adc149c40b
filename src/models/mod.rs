//! Core data models for the reconciliation engine.

pub mod adm;
pub mod candidate;
pub mod feature;
pub mod point;

pub use adm::{AdmDescriptor, AdmRecord};
pub use candidate::{CandidateMatch, Placetype};
pub use feature::{
    AdmNames, AdmParent, AlternateName, FeatureKind, FieldLimits, GeoFeature, Source, ZipCode,
};
pub use point::GeoPoint;
