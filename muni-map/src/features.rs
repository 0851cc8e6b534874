//! Encoding vehicle records into renderable map features.
//!
//! A [`FeatureCollection`] holds every vehicle currently known for one route's
//! layer. It always replaces a source's data wholesale.

use geojson::{Feature, Geometry, JsonObject, Value};

use crate::domain::VehicleRecord;

/// Property key the symbol layer reads its text from (`text-field: {message}`).
pub const LABEL_PROPERTY: &str = "message";

/// Error encoding a vehicle record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// Latitude or longitude is not a finite decimal number
    #[error("vehicle {vehicle}: invalid {field} {value:?}")]
    InvalidCoordinate {
        vehicle: String,
        field: &'static str,
        value: String,
    },
}

/// A single labelled point on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// `(longitude, latitude)`, the order map libraries expect.
    pub coordinates: (f64, f64),

    /// Display label, `Bus# {id}-({routeTag})`.
    pub label: String,
}

impl PointFeature {
    pub fn longitude(&self) -> f64 {
        self.coordinates.0
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates.1
    }

    /// Convert to a GeoJSON point feature.
    pub fn to_geojson(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert(LABEL_PROPERTY.to_string(), self.label.clone().into());

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.coordinates.0,
                self.coordinates.1,
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Ordered features for one route's layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<PointFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<PointFeature>) -> Self {
        Self { features }
    }

    /// A collection that renders nothing. New sources start with this.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn features(&self) -> &[PointFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Convert to a GeoJSON feature collection.
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(PointFeature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

/// Encode records into a collection, failing on the first bad coordinate.
///
/// Preserves input order. Empty input yields an empty collection.
pub fn encode(records: &[VehicleRecord]) -> Result<FeatureCollection, EncodeError> {
    records
        .iter()
        .map(encode_record)
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureCollection::new)
}

/// Encode records into a collection, dropping records with bad coordinates.
///
/// Returns the collection of well-formed records, in input order, alongside
/// the error for each dropped record.
pub fn encode_lenient(records: &[VehicleRecord]) -> (FeatureCollection, Vec<EncodeError>) {
    let mut features = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for record in records {
        match encode_record(record) {
            Ok(feature) => features.push(feature),
            Err(e) => errors.push(e),
        }
    }

    (FeatureCollection::new(features), errors)
}

/// Encode a single record.
pub fn encode_record(record: &VehicleRecord) -> Result<PointFeature, EncodeError> {
    let lon = parse_coordinate(&record.lon, "longitude", &record.id)?;
    let lat = parse_coordinate(&record.lat, "latitude", &record.id)?;

    Ok(PointFeature {
        coordinates: (lon, lat),
        label: record.label(),
    })
}

fn parse_coordinate(value: &str, field: &'static str, vehicle: &str) -> Result<f64, EncodeError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EncodeError::InvalidCoordinate {
            vehicle: vehicle.to_string(),
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RouteTag;

    fn record(id: &str, tag: &str, lon: &str, lat: &str) -> VehicleRecord {
        VehicleRecord {
            id: id.to_string(),
            route_tag: RouteTag::parse(tag).unwrap(),
            lat: lat.to_string(),
            lon: lon.to_string(),
            heading: None,
            speed_kmh: None,
            secs_since_report: None,
            dir_tag: None,
            predictable: true,
        }
    }

    #[test]
    fn encode_sample_vehicle() {
        let records = [record("1455", "N", "-122.493721", "37.760983")];
        let collection = encode(&records).unwrap();

        assert_eq!(collection.len(), 1);
        let feature = &collection.features()[0];
        assert_eq!(feature.coordinates, (-122.493721, 37.760983));
        assert_eq!(feature.label, "Bus# 1455-(N)");
    }

    #[test]
    fn encode_empty() {
        let collection = encode(&[]).unwrap();
        assert!(collection.is_empty());
        assert!(collection.to_geojson().features.is_empty());
    }

    #[test]
    fn encode_fails_whole_batch_on_bad_coordinate() {
        let records = [
            record("1", "N", "-122.4", "37.7"),
            record("2", "N", "west", "37.7"),
        ];
        assert_eq!(
            encode(&records),
            Err(EncodeError::InvalidCoordinate {
                vehicle: "2".to_string(),
                field: "longitude",
                value: "west".to_string(),
            })
        );
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        assert!(encode(&[record("1", "N", "NaN", "37.7")]).is_err());
        assert!(encode(&[record("1", "N", "-122.4", "inf")]).is_err());
    }

    #[test]
    fn lenient_skips_only_bad_records() {
        let records = [
            record("1", "N", "-122.4", "37.7"),
            record("2", "N", "-122.5", ""),
            record("3", "N", "-122.6", "37.8"),
        ];
        let (collection, errors) = encode_lenient(&records);

        let labels: Vec<_> = collection.features().iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["Bus# 1-(N)", "Bus# 3-(N)"]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("latitude"));
    }

    #[test]
    fn geojson_point_is_lon_lat_with_message() {
        let collection = encode(&[record("1455", "N", "-122.493721", "37.760983")]).unwrap();
        let geojson = collection.to_geojson();

        let feature = &geojson.features[0];
        match &feature.geometry.as_ref().unwrap().value {
            Value::Point(coords) => assert_eq!(coords, &vec![-122.493721, 37.760983]),
            other => panic!("expected point, got {:?}", other),
        }
        assert_eq!(
            feature.property(LABEL_PROPERTY).and_then(|v| v.as_str()),
            Some("Bus# 1455-(N)")
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::RouteTag;
    use proptest::prelude::*;

    fn arb_record() -> impl Strategy<Value = VehicleRecord> {
        (
            "[0-9]{1,5}",
            prop::sample::select(vec!["1", "6", "8", "N", "KT", "38R"]),
            -180.0f64..180.0,
            -90.0f64..90.0,
        )
            .prop_map(|(id, tag, lon, lat)| VehicleRecord {
                id,
                route_tag: RouteTag::parse(tag).unwrap(),
                lat: format!("{:.6}", lat),
                lon: format!("{:.6}", lon),
                heading: None,
                speed_kmh: None,
                secs_since_report: None,
                dir_tag: None,
                predictable: true,
            })
    }

    proptest! {
        #[test]
        fn encode_preserves_order_and_count(records in prop::collection::vec(arb_record(), 0..50)) {
            let collection = encode(&records).unwrap();
            prop_assert_eq!(collection.len(), records.len());

            for (feature, record) in collection.features().iter().zip(&records) {
                prop_assert_eq!(&feature.label, &record.label());
                prop_assert_eq!(feature.longitude(), record.lon.parse::<f64>().unwrap());
                prop_assert_eq!(feature.latitude(), record.lat.parse::<f64>().unwrap());
            }
        }

        #[test]
        fn lenient_matches_strict_on_well_formed_input(records in prop::collection::vec(arb_record(), 0..50)) {
            let (lenient, errors) = encode_lenient(&records);
            prop_assert!(errors.is_empty());
            prop_assert_eq!(lenient, encode(&records).unwrap());
        }
    }
}
