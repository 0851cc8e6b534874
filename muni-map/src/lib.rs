//! Live SF Muni vehicle map server.
//!
//! Keeps one map layer per selected route, refreshed from the NextBus
//! vehicle feed, and serves the map and the selection over HTTP.

pub mod catalog;
pub mod domain;
pub mod engine;
pub mod features;
pub mod map;
pub mod nextbus;
pub mod selection;
pub mod web;
