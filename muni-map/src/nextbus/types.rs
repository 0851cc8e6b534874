//! NextBus public JSON feed response DTOs.
//!
//! These types map directly to the `vehicleLocations` JSON response. Every value
//! arrives as a string, including numbers and booleans. Field-name mapping:
//!
//! | JSON key          | Field               |
//! |-------------------|---------------------|
//! | `vehicle`         | `vehicle`           |
//! | `lastTime.time`   | `last_time.time`    |
//! | `copyright`       | `copyright`         |
//! | `Error`           | `error`             |
//! | `Error.shouldRetry` | `error.should_retry` |
//!
//! Note that `Error` is the only key with an uppercase initial, so it is renamed
//! explicitly rather than via `rename_all`.

use serde::{Deserialize, Deserializer};

/// Response from `command=vehicleLocations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLocationsResponse {
    /// Vehicles. The feed sends a bare object when there is exactly one vehicle
    /// and omits the key when there are none.
    #[serde(default, deserialize_with = "one_or_many")]
    pub vehicle: Option<Vec<VehicleDto>>,

    /// Feed-side timestamp of this response.
    pub last_time: Option<LastTime>,

    /// Attribution string.
    pub copyright: Option<String>,

    /// Feed-reported error. Can accompany valid vehicle data as a warning.
    #[serde(rename = "Error")]
    pub error: Option<FeedErrorDto>,
}

/// A single vehicle as sent by the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    /// Vehicle identifier.
    pub id: String,

    /// Longitude as a decimal string.
    pub lon: String,

    /// Latitude as a decimal string.
    pub lat: String,

    /// Route tag. Missing for vehicles not assigned to a route.
    pub route_tag: Option<String>,

    /// `"true"` or `"false"`.
    pub predictable: Option<String>,

    /// Speed in km/h.
    #[serde(rename = "speedKmHr")]
    pub speed_km_hr: Option<String>,

    /// Direction tag.
    pub dir_tag: Option<String>,

    /// Heading in degrees. `-1` when unknown.
    pub heading: Option<String>,

    /// Seconds since the last position report.
    pub secs_since_report: Option<String>,
}

/// The `lastTime` object.
#[derive(Debug, Clone, Deserialize)]
pub struct LastTime {
    /// Milliseconds since the Unix epoch, as a string.
    pub time: String,
}

/// The `Error` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedErrorDto {
    /// Human-readable message.
    pub content: String,

    /// `"true"` or `"false"`.
    pub should_retry: String,
}

impl FeedErrorDto {
    /// Whether the feed advises retrying.
    pub fn should_retry(&self) -> bool {
        self.should_retry.eq_ignore_ascii_case("true")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<OneOrMany<T>> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    }))
}
