//! Observed transit vehicle.

use chrono::{DateTime, Utc};

use super::RouteTag;

/// One vehicle as reported by the feed at a point in time.
///
/// Latitude and longitude are kept exactly as transmitted (decimal strings).
/// They are parsed when the record is encoded into a map feature, so a record
/// with unparseable coordinates can still be carried and reported.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    /// Vehicle identifier (fleet number).
    pub id: String,

    /// Route the vehicle is currently serving.
    pub route_tag: RouteTag,

    /// Latitude as a decimal string.
    pub lat: String,

    /// Longitude as a decimal string.
    pub lon: String,

    /// Heading in degrees, clockwise from north.
    pub heading: Option<i32>,

    /// Speed in km/h.
    pub speed_kmh: Option<f64>,

    /// Seconds since the vehicle last reported its position.
    pub secs_since_report: Option<u32>,

    /// Direction tag (e.g. "N____O_F00"), absent when the vehicle is not
    /// assigned to a direction.
    pub dir_tag: Option<String>,

    /// Whether the feed considers the vehicle's predictions reliable.
    pub predictable: bool,
}

impl VehicleRecord {
    /// Map label: `Bus# {id}-({routeTag})`.
    pub fn label(&self) -> String {
        format!("Bus# {}-({})", self.id, self.route_tag)
    }
}

/// A decoded `vehicleLocations` response.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleBatch {
    /// Vehicles in feed order.
    pub vehicles: Vec<VehicleRecord>,

    /// Feed-side timestamp of this batch, when present and parseable.
    pub last_time: Option<DateTime<Utc>>,

    /// Attribution string.
    pub copyright: Option<String>,
}

impl VehicleBatch {
    /// A batch with vehicles and no metadata.
    pub fn from_vehicles(vehicles: Vec<VehicleRecord>) -> Self {
        Self {
            vehicles,
            last_time: None,
            copyright: None,
        }
    }

    /// Number of vehicles in the batch.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the batch has no vehicles.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, tag: &str) -> VehicleRecord {
        VehicleRecord {
            id: id.to_string(),
            route_tag: RouteTag::parse(tag).unwrap(),
            lat: "37.760983".to_string(),
            lon: "-122.493721".to_string(),
            heading: Some(255),
            speed_kmh: Some(27.0),
            secs_since_report: Some(37),
            dir_tag: Some("N____O_F00".to_string()),
            predictable: true,
        }
    }

    #[test]
    fn label_format() {
        assert_eq!(record("1455", "N").label(), "Bus# 1455-(N)");
        assert_eq!(record("8810", "38R").label(), "Bus# 8810-(38R)");
    }

    #[test]
    fn batch_len() {
        let batch = VehicleBatch::from_vehicles(vec![record("1", "N"), record("2", "N")]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(VehicleBatch::from_vehicles(Vec::new()).is_empty());
    }
}
