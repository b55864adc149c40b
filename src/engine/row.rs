//! One tab-separated map-extract row.

use geo::Geometry;
use tracing::warn;

use crate::error::RowError;
use crate::geometry::{decode_hex_ewkb, decode_hex_point};
use crate::models::{FieldLimits, GeoPoint};
use crate::municipality::SourceKind;

pub const COLUMN_COUNT: usize = 16;

pub const COL_SOURCE_KIND: usize = 0;
pub const COL_MAP_EXTRACT_ID: usize = 1;
pub const COL_ADMIN_CENTRE_ID: usize = 2;
pub const COL_NAME: usize = 3;
pub const COL_COUNTRY_CODE: usize = 4;
pub const COL_POSTAL_CODE: usize = 5;
pub const COL_SUBDIVISION_POSTAL_CODE: usize = 6;
pub const COL_ADM_LEVEL: usize = 7;
pub const COL_POPULATION: usize = 8;
pub const COL_LOCATION: usize = 9;
pub const COL_ADMIN_CENTRE_LOCATION: usize = 10;
pub const COL_SHAPE: usize = 11;
pub const COL_TAG: usize = 12;
pub const COL_IS_IN: usize = 13;
pub const COL_IS_IN_ADM: usize = 14;
pub const COL_ALTERNATE_NAMES: usize = 15;

/// A parsed row. Geometry columns are decoded, text columns kept as is
/// (trimmed, empty means absent).
#[derive(Debug, Clone)]
pub struct InputRow {
    fields: Vec<String>,
    pub source_kind: Option<SourceKind>,
    pub map_extract_id: Option<i64>,
    pub name: String,
    /// Upper case
    pub country_code: Option<String>,
    /// Absent when the column is empty; the row then matches nothing
    pub location: Option<GeoPoint>,
    pub admin_centre_location: Option<GeoPoint>,
    pub shape: Option<Geometry<f64>>,
}

fn present(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl InputRow {
    pub fn parse(line: &str, limits: &FieldLimits) -> Result<Self, RowError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        Self::from_fields(&fields, limits)
    }

    pub fn from_fields<S: AsRef<str>>(fields: &[S], limits: &FieldLimits) -> Result<Self, RowError> {
        if fields.len() != COLUMN_COUNT {
            return Err(RowError::ColumnCount {
                expected: COLUMN_COUNT,
                found: fields.len(),
            });
        }
        let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();

        let mut name = present(&fields[COL_NAME])
            .ok_or(RowError::MissingName)?
            .to_string();
        if name.chars().count() > limits.max_name_length {
            warn!(
                "Name too long ({} chars), truncating: {}",
                name.chars().count(),
                name
            );
            name = name
                .chars()
                .take(limits.max_name_length.saturating_sub(1))
                .collect();
        }

        let location = present(&fields[COL_LOCATION])
            .map(decode_hex_point)
            .transpose()?
            .map(GeoPoint::from);

        let map_extract_id = present(&fields[COL_MAP_EXTRACT_ID]).and_then(|raw| match raw.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Invalid map-extract id '{}' for {}", raw, name);
                None
            }
        });

        let admin_centre_location =
            present(&fields[COL_ADMIN_CENTRE_LOCATION]).and_then(|hex| match decode_hex_point(hex) {
                Ok(point) => Some(GeoPoint::from(point)),
                Err(e) => {
                    warn!("Can not parse admin centre location of {}: {}", name, e);
                    None
                }
            });

        let shape = present(&fields[COL_SHAPE]).and_then(|hex| match decode_hex_ewkb(hex) {
            Ok(shape) => Some(shape),
            Err(e) => {
                warn!("Can not parse shape of {}: {}", name, e);
                None
            }
        });

        Ok(Self {
            source_kind: present(&fields[COL_SOURCE_KIND]).and_then(SourceKind::parse),
            map_extract_id,
            name,
            country_code: present(&fields[COL_COUNTRY_CODE]).map(str::to_uppercase),
            location,
            admin_centre_location,
            shape,
            fields,
        })
    }

    /// Trimmed text column, `None` when empty
    pub fn field(&self, column: usize) -> Option<&str> {
        self.fields.get(column).and_then(|f| present(f))
    }

    pub fn tag(&self) -> Option<&str> {
        self.field(COL_TAG)
    }

    pub fn raw_adm_level(&self) -> Option<&str> {
        self.field(COL_ADM_LEVEL)
    }

    pub fn adm_level(&self) -> Option<u8> {
        self.raw_adm_level().and_then(|l| l.parse().ok())
    }

    /// Population with blanks and thousands separators stripped
    pub fn population(&self) -> Option<Result<u32, String>> {
        let raw = self.field(COL_POPULATION)?;
        let digits: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        Some(digits.parse::<u32>().map_err(|e| format!("'{}': {}", raw, e)))
    }

    /// The raw columns for logging, shape replaced by a placeholder.
    pub fn dump_fields(&self) -> String {
        dump_fields(&self.fields)
    }
}

/// Tab-join raw columns for a log line; the shape column is usually huge.
pub fn dump_fields<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| if i == COL_SHAPE { "THE_SHAPE" } else { f.as_ref() })
        .collect::<Vec<_>>()
        .join("\t")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::GeometryError;
    use crate::geometry::tests::{ewkb_point, ewkb_polygon};

    /// Builder for test rows, every column empty until set.
    #[derive(Clone)]
    pub(crate) struct RowBuilder([String; COLUMN_COUNT]);

    impl RowBuilder {
        pub(crate) fn new(name: &str, lat: f64, lon: f64) -> Self {
            let mut fields: [String; COLUMN_COUNT] = Default::default();
            fields[COL_SOURCE_KIND] = "R".into();
            fields[COL_NAME] = name.into();
            fields[COL_LOCATION] = ewkb_point(lon, lat);
            Self(fields)
        }

        pub(crate) fn set(mut self, column: usize, value: &str) -> Self {
            self.0[column] = value.into();
            self
        }

        pub(crate) fn line(&self) -> String {
            self.0.join("\t")
        }
    }

    #[test]
    fn test_parse_row() {
        let line = RowBuilder::new("Springfield", 39.8, -89.65)
            .set(COL_SOURCE_KIND, "N")
            .set(COL_MAP_EXTRACT_ID, "151935")
            .set(COL_COUNTRY_CODE, "us")
            .set(COL_POPULATION, "116 250")
            .set(COL_TAG, "city")
            .set(
                COL_SHAPE,
                &ewkb_polygon(&[(-90.0, 39.0), (-89.0, 39.0), (-89.0, 40.0), (-90.0, 39.0)]),
            )
            .line();
        let row = InputRow::parse(&line, &FieldLimits::default()).unwrap();
        assert_eq!(row.source_kind, Some(SourceKind::Node));
        assert_eq!(row.map_extract_id, Some(151935));
        assert_eq!(row.country_code.as_deref(), Some("US"));
        assert_eq!(row.location, Some(GeoPoint::new(39.8, -89.65)));
        assert_eq!(row.tag(), Some("city"));
        assert_eq!(row.population(), Some(Ok(116250)));
        assert!(row.shape.is_some());
        assert!(row.admin_centre_location.is_none());
        assert!(row.field(COL_IS_IN).is_none());
    }

    #[test]
    fn test_column_count() {
        let err = InputRow::parse("N\t1\tSpringfield", &FieldLimits::default()).unwrap_err();
        assert_eq!(
            err,
            RowError::ColumnCount {
                expected: 16,
                found: 3
            }
        );
    }

    #[test]
    fn test_missing_name_and_bad_location() {
        let limits = FieldLimits::default();
        let line = RowBuilder::new(" ", 1.0, 1.0).line();
        assert_eq!(InputRow::parse(&line, &limits).unwrap_err(), RowError::MissingName);

        let line = RowBuilder::new("Springfield", 1.0, 1.0)
            .set(COL_LOCATION, "0101ZZ")
            .line();
        assert!(matches!(
            InputRow::parse(&line, &limits),
            Err(RowError::Location(GeometryError::Hex(_)))
        ));
    }

    #[test]
    fn test_empty_location_is_absent() {
        let line = RowBuilder::new("Springfield", 1.0, 1.0)
            .set(COL_LOCATION, "")
            .line();
        let row = InputRow::parse(&line, &FieldLimits::default()).unwrap();
        assert!(row.location.is_none());
    }

    #[test]
    fn test_bad_optional_geometries_are_dropped() {
        let line = RowBuilder::new("Springfield", 1.0, 1.0)
            .set(COL_ADMIN_CENTRE_LOCATION, "nothex")
            .set(COL_SHAPE, "0101")
            .line();
        let row = InputRow::parse(&line, &FieldLimits::default()).unwrap();
        assert!(row.admin_centre_location.is_none());
        assert!(row.shape.is_none());
    }

    #[test]
    fn test_name_truncated() {
        let limits = FieldLimits {
            max_name_length: 5,
            max_language_length: 7,
        };
        let line = RowBuilder::new("Springfield", 1.0, 1.0).line();
        assert_eq!(InputRow::parse(&line, &limits).unwrap().name, "Spri");
    }

    #[test]
    fn test_dump_fields_hides_shape() {
        let line = RowBuilder::new("Springfield", 1.0, 1.0)
            .set(COL_SHAPE, "DEADBEEF")
            .line();
        let row = InputRow::parse(&line, &FieldLimits::default()).unwrap();
        let dump = row.dump_fields();
        assert!(dump.contains("THE_SHAPE"));
        assert!(!dump.contains("DEADBEEF"));
    }

    #[test]
    fn test_bad_population() {
        let line = RowBuilder::new("Springfield", 1.0, 1.0)
            .set(COL_POPULATION, "about 12k")
            .line();
        let row = InputRow::parse(&line, &FieldLimits::default()).unwrap();
        assert!(matches!(row.population(), Some(Err(_))));
    }
}
