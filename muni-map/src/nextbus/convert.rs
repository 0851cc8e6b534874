//! Conversion from NextBus DTOs to domain types.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{RouteTag, VehicleBatch, VehicleRecord};

use super::error::FeedError;
use super::types::{VehicleDto, VehicleLocationsResponse};

/// Error converting a single vehicle DTO.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Vehicle has no route tag and the request was not scoped to one
    #[error("vehicle {0} has no route tag")]
    MissingRouteTag(String),

    /// Route tag present but unusable
    #[error("vehicle {id} has invalid route tag {tag:?}")]
    InvalidRouteTag { id: String, tag: String },
}

/// Convert a `vehicleLocations` response to a domain batch.
///
/// `requested` is the route the request was scoped to, if any. It stands in for
/// a missing per-vehicle `routeTag`.
///
/// A response carrying `Error` and no `vehicle` key is a feed failure. An
/// `Error` alongside vehicle data is only a warning and the vehicles are kept.
/// Vehicles that cannot be converted are skipped rather than failing the batch.
pub fn convert_response(
    response: &VehicleLocationsResponse,
    requested: Option<&RouteTag>,
) -> Result<VehicleBatch, FeedError> {
    let vehicles = match (&response.vehicle, &response.error) {
        (None, Some(error)) => {
            return Err(FeedError::Feed {
                content: error.content.clone(),
                should_retry: error.should_retry(),
            });
        }
        (Some(vehicles), Some(error)) => {
            warn!(content = %error.content, "feed returned vehicles with an error notice");
            vehicles.as_slice()
        }
        (Some(vehicles), None) => vehicles.as_slice(),
        (None, None) => &[],
    };

    let mut records = Vec::with_capacity(vehicles.len());
    for dto in vehicles {
        match convert_vehicle(dto, requested) {
            Ok(record) => records.push(record),
            Err(e) => warn!(vehicle = %dto.id, error = %e, "skipping vehicle"),
        }
    }

    Ok(VehicleBatch {
        vehicles: records,
        last_time: response
            .last_time
            .as_ref()
            .and_then(|t| parse_last_time(&t.time)),
        copyright: response.copyright.clone(),
    })
}

/// Convert a single vehicle DTO.
pub fn convert_vehicle(
    dto: &VehicleDto,
    requested: Option<&RouteTag>,
) -> Result<VehicleRecord, ConversionError> {
    let route_tag = match (&dto.route_tag, requested) {
        (Some(tag), _) => RouteTag::parse(tag).map_err(|_| ConversionError::InvalidRouteTag {
            id: dto.id.clone(),
            tag: tag.clone(),
        })?,
        (None, Some(requested)) => requested.clone(),
        (None, None) => return Err(ConversionError::MissingRouteTag(dto.id.clone())),
    };

    Ok(VehicleRecord {
        id: dto.id.clone(),
        route_tag,
        lat: dto.lat.clone(),
        lon: dto.lon.clone(),
        heading: dto
            .heading
            .as_deref()
            .and_then(|h| h.parse::<i32>().ok())
            .filter(|h| *h >= 0),
        speed_kmh: dto.speed_km_hr.as_deref().and_then(|s| s.parse().ok()),
        secs_since_report: dto.secs_since_report.as_deref().and_then(|s| s.parse().ok()),
        dir_tag: dto.dir_tag.clone(),
        predictable: dto
            .predictable
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("true")),
    })
}

/// Parse `lastTime.time` (milliseconds since the epoch).
fn parse_last_time(millis: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = millis.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}
