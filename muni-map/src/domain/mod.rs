//! Domain types for the live transit map.
//!
//! These types represent validated feed data. They are distinct from the
//! NextBus wire DTOs, which mirror the JSON as-is.

mod route_tag;
mod vehicle;

pub use route_tag::{InvalidRouteTag, RouteTag};
pub use vehicle::{VehicleBatch, VehicleRecord};
