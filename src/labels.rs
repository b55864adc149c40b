//! Display labels derived from a feature's names and hierarchy.

use crate::models::GeoFeature;

pub trait LabelGenerator: Send + Sync {
    fn label(&self, feature: &GeoFeature) -> String;

    /// Name followed by the administrative names, most local first, then country.
    fn qualified_name(&self, feature: &GeoFeature) -> String;

    fn alternate_labels(&self, feature: &GeoFeature) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultLabelGenerator;

impl DefaultLabelGenerator {
    /// Most local adm name that differs from the feature name
    fn context<'a>(&self, feature: &'a GeoFeature) -> Option<&'a str> {
        feature
            .adm_names
            .iter()
            .rev()
            .find(|n| !n.eq_ignore_ascii_case(&feature.name))
    }
}

impl LabelGenerator for DefaultLabelGenerator {
    fn label(&self, feature: &GeoFeature) -> String {
        match self.context(feature) {
            Some(adm) => format!("{}, {}", feature.name, adm),
            None => feature.name.clone(),
        }
    }

    fn qualified_name(&self, feature: &GeoFeature) -> String {
        let mut parts: Vec<&str> = vec![feature.name.as_str()];
        for adm in feature.adm_names.iter().rev() {
            if parts.last().is_some_and(|last| last.eq_ignore_ascii_case(adm)) {
                continue;
            }
            parts.push(adm);
        }
        if let Some(zip) = feature.zip_code.as_deref() {
            parts.insert(1, zip);
        }
        if let Some(cc) = feature.country_code.as_deref() {
            parts.push(cc);
        }
        parts.join(", ")
    }

    fn alternate_labels(&self, feature: &GeoFeature) -> Vec<String> {
        let context = self.context(feature);
        let mut labels: Vec<String> = Vec::new();
        for an in feature.alternate_names() {
            if an.name == feature.name {
                continue;
            }
            let label = match context {
                Some(adm) => format!("{}, {}", an.name, adm),
                None => an.name.clone(),
            };
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlternateName, FeatureKind, Source};

    fn springfield() -> GeoFeature {
        let mut f = GeoFeature::new(1, FeatureKind::Place { municipality: true }, "Springfield");
        f.country_code = Some("US".into());
        f.adm_names.set(1, Some("Illinois".into()));
        f.adm_names.set(2, Some("Sangamon County".into()));
        f
    }

    #[test]
    fn test_label_and_qualified_name() {
        let mut f = springfield();
        let g = DefaultLabelGenerator;
        assert_eq!(g.label(&f), "Springfield, Sangamon County");
        assert_eq!(
            g.qualified_name(&f),
            "Springfield, Sangamon County, Illinois, US"
        );

        f.zip_code = Some("62701".into());
        assert_eq!(
            g.qualified_name(&f),
            "Springfield, 62701, Sangamon County, Illinois, US"
        );
    }

    #[test]
    fn test_no_hierarchy() {
        let f = GeoFeature::new(1, FeatureKind::SubPlace, "Enos Park");
        let g = DefaultLabelGenerator;
        assert_eq!(g.label(&f), "Enos Park");
        assert_eq!(g.qualified_name(&f), "Enos Park");
        assert!(g.alternate_labels(&f).is_empty());
    }

    #[test]
    fn test_alternate_labels() {
        let mut f = springfield();
        f.add_alternate_name(AlternateName::new("Springfield", Some("fr".into()), Source::MapExtract, None));
        f.add_alternate_name(AlternateName::new("Springfeld", Some("de".into()), Source::MapExtract, None));
        let labels = DefaultLabelGenerator.alternate_labels(&f);
        assert_eq!(labels, vec!["Springfeld, Sangamon County".to_string()]);
    }
}
