//! Record Formats
//!
//! Every format turns one CSV row into one [`Record`], whose prepared form is
//! the ordered attribute sequence that gets inserted into the tree.

use super::IngestError;
use serde::{Deserialize, Serialize};

/// A data record that can be fed into Nested STAR
pub trait Record {
    /// Ordered attribute values, most general first
    fn prepare(&self) -> Vec<String>;
}

impl Record for Vec<String> {
    fn prepare(&self) -> Vec<String> {
        self.clone()
    }
}

impl Record for [&str] {
    fn prepare(&self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// How rows of the input file are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// Country code, `num_attrs` `lat;lon` granularities, one trailing field
    #[default]
    Location,
    /// Exactly `num_attrs` attribute values
    Attributes,
}

impl RecordFormat {
    /// Number of CSV fields a row must have for `num_attrs` attributes
    pub fn field_count(&self, num_attrs: usize) -> usize {
        match self {
            RecordFormat::Location => num_attrs + 2,
            RecordFormat::Attributes => num_attrs,
        }
    }
}

impl std::str::FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "location" | "foursquare" => Ok(RecordFormat::Location),
            "attributes" | "attrs" => Ok(RecordFormat::Attributes),
            other => Err(format!("unknown record format {:?}", other)),
        }
    }
}

/// Plain row of attribute values, e.g. `US,release,windows`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    values: Vec<String>,
}

impl AttributeRecord {
    pub fn parse(fields: &[&str], num_attrs: usize) -> Result<Self, IngestError> {
        if fields.len() != num_attrs {
            return Err(IngestError::FieldCount {
                expected: num_attrs,
                got: fields.len(),
            });
        }
        Ok(AttributeRecord {
            values: fields.iter().map(|f| f.trim().to_string()).collect(),
        })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl Record for AttributeRecord {
    fn prepare(&self) -> Vec<String> {
        self.values.clone()
    }
}

/// Latitude/longitude pair at one granularity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f32,
    pub lon: f32,
}

impl LatLon {
    /// Parse `lat;lon`. Coarse granularities come as e.g. `41.;28.`, in
    /// which case all periods are dropped from both halves.
    pub fn parse(s: &str) -> Result<Self, IngestError> {
        let mut pair: Vec<String> = s.split(';').map(str::to_string).collect();
        if pair.len() != 2 {
            return Err(IngestError::LatLon(
                "expected exactly one ';' separator in lat/lon".to_string(),
            ));
        }

        if pair[0].ends_with('.') {
            pair[0] = pair[0].replace('.', "");
            pair[1] = pair[1].replace('.', "");
        }

        let lat = pair[0]
            .trim()
            .parse::<f32>()
            .map_err(|e| IngestError::LatLon(format!("failed to parse lat {:?}: {}", pair[0], e)))?;
        let lon = pair[1]
            .trim()
            .parse::<f32>()
            .map_err(|e| IngestError::LatLon(format!("failed to parse lon {:?}: {}", pair[1], e)))?;

        Ok(LatLon { lat, lon })
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:7.6};{:7.6}", self.lat, self.lon)
    }
}

/// Check-in record: a country code followed by the same location at
/// decreasing coarseness
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    country_code: String,
    locations: Vec<LatLon>,
}

impl LocationRecord {
    pub fn parse(fields: &[&str], num_granularities: usize) -> Result<Self, IngestError> {
        let expected = RecordFormat::Location.field_count(num_granularities);
        if fields.len() != expected {
            return Err(IngestError::FieldCount {
                expected,
                got: fields.len(),
            });
        }

        let locations = fields[1..=num_granularities]
            .iter()
            .map(|field| LatLon::parse(field))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LocationRecord {
            country_code: fields[0].trim().to_string(),
            locations,
        })
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn locations(&self) -> &[LatLon] {
        &self.locations
    }
}

impl Record for LocationRecord {
    fn prepare(&self) -> Vec<String> {
        self.locations.iter().map(LatLon::to_string).collect()
    }
}

impl std::fmt::Display for LocationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.country_code)?;
        for loc in &self.locations {
            write!(f, " {:.7};{:.7}", loc.lat, loc.lon)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lon_parse() {
        let loc = LatLon::parse("40.7128;-74.0060").unwrap();
        assert!((loc.lat - 40.7128).abs() < 1e-4);
        assert!((loc.lon + 74.006).abs() < 1e-4);
    }

    #[test]
    fn test_lat_lon_trailing_period() {
        let loc = LatLon::parse("41.;28.").unwrap();
        assert_eq!(loc.lat, 41.0);
        assert_eq!(loc.lon, 28.0);
    }

    #[test]
    fn test_lat_lon_errors() {
        assert!(matches!(LatLon::parse("41.0"), Err(IngestError::LatLon(_))));
        assert!(matches!(LatLon::parse("1;2;3"), Err(IngestError::LatLon(_))));
        assert!(matches!(LatLon::parse("abc;2"), Err(IngestError::LatLon(_))));
    }

    #[test]
    fn test_lat_lon_display() {
        let loc = LatLon { lat: 41.0, lon: -8.5 };
        assert_eq!(loc.to_string(), "41.000000;-8.500000");
    }

    #[test]
    fn test_location_record_prepare() {
        let fields = ["TR ", "41.0082;28.9784", "41.01;28.98", "41.;28.", "extra"];
        let record = LocationRecord::parse(&fields, 3).unwrap();

        assert_eq!(record.country_code(), "TR");
        assert_eq!(record.locations().len(), 3);

        let prepared = record.prepare();
        assert_eq!(prepared.len(), 3);
        assert_eq!(prepared[2], "41.000000;28.000000");
    }

    #[test]
    fn test_location_record_field_count() {
        let fields = ["TR", "41.;28."];
        assert!(matches!(
            LocationRecord::parse(&fields, 3),
            Err(IngestError::FieldCount { expected: 5, got: 2 })
        ));
    }

    #[test]
    fn test_attribute_record() {
        let record = AttributeRecord::parse(&["US", " release", "windows "], 3).unwrap();
        assert_eq!(record.prepare(), vec!["US", "release", "windows"]);

        assert!(matches!(
            AttributeRecord::parse(&["US", "release"], 3),
            Err(IngestError::FieldCount { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_record_format_from_str() {
        assert_eq!("location".parse::<RecordFormat>(), Ok(RecordFormat::Location));
        assert_eq!("Attributes".parse::<RecordFormat>(), Ok(RecordFormat::Attributes));
        assert!("xml".parse::<RecordFormat>().is_err());
    }
}
