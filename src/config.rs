//! TOML configuration. Every section is optional.
//!
//! ```toml
//! [engine]
//! batch_size = 100
//!
//! [search]
//! es_url = "http://localhost:9200"
//! index = "features"
//! min_score = 0.9
//! es_score_scale = 30.0
//!
//! [store]
//! path = "data/larch.sled"
//!
//! [levels.countries.JP]
//! place = [7]
//! sub_place = [8, 9]
//!
//! [municipality.excluded_tags]
//! JP = ["village"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::feature::{LANGUAGE_MAX_LENGTH, NAME_MAX_LENGTH};
use crate::models::FieldLimits;
use crate::municipality::TagMunicipalityDetector;
use crate::policy::CountryLevelTable;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub search: SearchConfig,
    pub store: StoreConfig,
    pub levels: CountryLevelTable,
    pub municipality: TagMunicipalityDetector,
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows between store flushes
    pub batch_size: usize,
    pub max_name_length: usize,
    pub max_language_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_name_length: NAME_MAX_LENGTH,
            max_language_length: LANGUAGE_MAX_LENGTH,
        }
    }
}

impl EngineConfig {
    pub fn limits(&self) -> FieldLimits {
        FieldLimits {
            max_name_length: self.max_name_length,
            max_language_length: self.max_language_length,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub es_url: String,
    pub index: String,
    /// Score in [0, 1] above which a hit is the same entity regardless of name
    pub min_score: f64,
    /// Raw Elasticsearch score normalized to 0.5. With `min_score` 0.9 a
    /// hit needs nine times this to match on score alone.
    pub es_score_scale: f64,
    pub candidate_limit: usize,
    /// Jaro-Winkler threshold of the name similarity rule
    pub name_similarity: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            es_url: "http://localhost:9200".to_string(),
            index: "features".to_string(),
            min_score: 0.9,
            es_score_scale: 30.0,
            candidate_limit: 1,
            name_similarity: 0.95,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Added to generated ids so they never collide with gazetteer ids
    pub id_offset: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/larch.sled"),
            id_offset: 10_000_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotifyConfig {
    pub discord_webhook: Option<String>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.batch_size == 0 {
            anyhow::bail!("engine.batch_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.search.name_similarity) {
            anyhow::bail!("search.name_similarity must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.search.min_score) {
            anyhow::bail!("search.min_score must be within [0, 1]");
        }
        if self.search.es_score_scale <= 0.0 {
            anyhow::bail!("search.es_score_scale must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::municipality::{MunicipalityDetector, SourceKind};
    use crate::models::Source;
    use crate::policy::AdmLevelPolicy;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.batch_size, 100);
        assert_eq!(config.search.candidate_limit, 1);
        assert_eq!(config.engine.limits().max_language_length, LANGUAGE_MAX_LENGTH);
        assert!(config.notify.discord_webhook.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [engine]
            batch_size = 500

            [search]
            index = "features_us"
            min_score = 0.95
            es_score_scale = 45.0

            [levels.countries.JP]
            place = [7]
            sub_place = [8, 9]

            [municipality.excluded_tags]
            JP = ["village"]
            "#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.engine.batch_size, 500);
        assert_eq!(config.search.index, "features_us");
        assert_eq!(config.search.es_url, "http://localhost:9200");
        assert_eq!(config.search.es_score_scale, 45.0);
        assert!(config.levels.is_sub_place_level(Some("JP"), "8"));
        assert!(!config.municipality.is_municipality(
            Some("JP"),
            Some("village"),
            Some(SourceKind::Relation),
            Source::MapExtract
        ));
    }

    #[test]
    fn test_invalid_batch_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[engine]\nbatch_size = 0\n").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_raw_score_threshold_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[search]\nmin_score = 12.5\n").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }
}
