//! Web layer for the live vehicle map.
//!
//! Serves the map page and a JSON API over the route selection, the route
//! catalog and the map's sources and layers.

mod dto;
mod routes;
mod state;
mod templates;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, FailureMap};
pub use templates::IndexTemplate;
