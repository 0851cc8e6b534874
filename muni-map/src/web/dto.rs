//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::catalog::RouteDetail;
use crate::domain::{RouteTag, VehicleBatch, VehicleRecord};
use crate::map::{Control, MapOptions};

/// Map construction parameters for the browser.
#[derive(Debug, Serialize)]
pub struct MapResponse {
    #[serde(flatten)]
    pub options: MapOptions,

    /// Controls attached once the map loaded
    pub controls: Vec<Control>,
}

/// Query for the route search bar.
#[derive(Debug, Deserialize)]
pub struct RouteSearchRequest {
    /// Text typed so far
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct RouteSearchResponse {
    pub routes: Vec<RouteDetail>,
}

/// Request to add a pill.
#[derive(Debug, Deserialize)]
pub struct AddPillRequest {
    pub tag: String,
}

/// A selected route.
#[derive(Debug, Serialize)]
pub struct PillView {
    pub tag: RouteTag,

    /// Catalog title, if the route is in the catalog
    pub title: Option<String>,

    /// Last fetch failure for the route, cleared by the next success
    pub error: Option<String>,
}

/// The current selection.
#[derive(Debug, Serialize)]
pub struct PillsResponse {
    pub pills: Vec<PillView>,

    /// Maximum number of pills
    pub capacity: usize,

    /// Whether the request changed the selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

/// Query for a one-off vehicle fetch.
#[derive(Debug, Deserialize)]
pub struct VehiclesRequest {
    /// Comma-separated route tags. Every route when absent or empty.
    pub routes: Option<String>,
}

/// A vehicle position.
#[derive(Debug, Serialize)]
pub struct VehicleResult {
    pub id: String,
    pub route_tag: RouteTag,
    pub label: String,
    pub lat: String,
    pub lon: String,
    pub heading: Option<i32>,
    pub speed_kmh: Option<f64>,
    pub secs_since_report: Option<u32>,
    pub dir_tag: Option<String>,
    pub predictable: bool,
}

/// A route whose fetch failed.
#[derive(Debug, Serialize)]
pub struct RouteErrorResult {
    pub tag: RouteTag,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct VehiclesResponse {
    pub vehicles: Vec<VehicleResult>,

    /// Feed timestamp in milliseconds since the Unix epoch
    pub last_time: Option<i64>,

    pub copyright: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RouteErrorResult>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// Conversion implementations

impl VehicleResult {
    pub fn from_record(record: &VehicleRecord) -> Self {
        Self {
            id: record.id.clone(),
            route_tag: record.route_tag.clone(),
            label: record.label(),
            lat: record.lat.clone(),
            lon: record.lon.clone(),
            heading: record.heading,
            speed_kmh: record.speed_kmh,
            secs_since_report: record.secs_since_report,
            dir_tag: record.dir_tag.clone(),
            predictable: record.predictable,
        }
    }
}

impl VehiclesResponse {
    /// Merge batches, keeping the latest timestamp and the first copyright.
    pub fn from_batches<'a>(
        batches: impl IntoIterator<Item = &'a VehicleBatch>,
        errors: Vec<RouteErrorResult>,
    ) -> Self {
        let mut vehicles = Vec::new();
        let mut last_time = None;
        let mut copyright = None;

        for batch in batches {
            vehicles.extend(batch.vehicles.iter().map(VehicleResult::from_record));
            last_time = last_time.max(batch.last_time);
            if copyright.is_none() {
                copyright = batch.copyright.clone();
            }
        }

        Self {
            vehicles,
            last_time: last_time.map(|t| t.timestamp_millis()),
            copyright,
            errors,
        }
    }
}
