//! Route layer synchronization engine.
//!
//! Keeps one map source and symbol layer per selected route, fed by periodic
//! polls of the vehicle feed. Selection changes race with in-flight fetches;
//! every fetch carries the epoch its route was activated under, and results
//! for a route that has since been deselected are dropped.
//!
//! [`RouteLayerEngine`] is the synchronous state machine. [`spawn`] runs it on
//! a tokio task together with the polling clock and fetch tasks.

mod clock;
mod config;
mod layers;
mod service;
mod state;


pub use clock::PollingClock;
pub use config::EngineConfig;
pub use layers::RouteLayerEngine;
pub use service::{EngineHandle, LayerEvent, spawn};
pub use state::{Completion, FetchKind, FetchTicket, LayerEntry, LayerState};
