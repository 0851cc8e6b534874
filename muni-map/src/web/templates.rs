//! Askama templates for the web frontend.

use askama::Template;

use crate::map::MapOptions;
use crate::selection::MAX_PILLS;

/// The map page.
///
/// Map options are rendered into `data-` attributes; `static/app.js` reads
/// them to construct the browser map.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub access_token: String,
    pub style: String,
    pub center_lon: f64,
    pub center_lat: f64,
    pub zoom: f64,
    pub capacity: usize,
}

impl IndexTemplate {
    pub fn from_options(options: &MapOptions) -> Self {
        Self {
            access_token: options.access_token.clone().unwrap_or_default(),
            style: options.style.clone(),
            center_lon: options.center[0],
            center_lat: options.center[1],
            zoom: options.zoom,
            capacity: MAX_PILLS,
        }
    }
}
