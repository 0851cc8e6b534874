//! NextBus public JSON feed client.
//!
//! This module provides an HTTP client for the NextBus `vehicleLocations`
//! command, which reports live positions of every vehicle of a transit agency.
//!
//! Key characteristics of the feed:
//! - Every value is a string, including coordinates, speeds and booleans
//! - `vehicle` is an object rather than an array when exactly one vehicle matches
//! - The error key is `Error`, with an uppercase initial, and may accompany
//!   valid data as a warning

mod client;
mod convert;
mod error;
mod mock;
mod provider;
mod types;

pub use client::{NextBusClient, NextBusConfig};
pub use convert::{ConversionError, convert_response, convert_vehicle};
pub use error::FeedError;
pub use mock::MockFeedClient;
pub use provider::{FeedProvider, fetch_routes};
pub use types::{FeedErrorDto, LastTime, VehicleDto, VehicleLocationsResponse};
