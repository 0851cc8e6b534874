//! The map surface boundary.
//!
//! The engine drives a map rendering library through [`MapSurface`] and never
//! the other way round. The library reports back only through [`MapEvent`]s.

use serde::Serialize;

use crate::domain::RouteTag;
use crate::features::FeatureCollection;

/// Errors reported by a map surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// A source with this id already exists
    #[error("source {0} already exists")]
    DuplicateSource(String),

    /// A layer with this id already exists
    #[error("layer {0} already exists")]
    DuplicateLayer(String),

    /// No source with this id
    #[error("source {0} does not exist")]
    MissingSource(String),
}

/// Options used to construct the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOptions {
    /// Initial `[longitude, latitude]` center.
    pub center: [f64; 2],
    /// Initial zoom level.
    pub zoom: f64,
    /// Style reference.
    pub style: String,
    /// Map provider access token, injected at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl MapOptions {
    pub fn with_center(mut self, longitude: f64, latitude: f64) -> Self {
        self.center = [longitude, latitude];
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: [-122.41, 37.75], // San Francisco
            zoom: 12.0,
            style: "mapbox://styles/mapbox/streets-v11".to_string(),
            access_token: None,
        }
    }
}

/// UI controls that can be attached to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    /// Zoom and compass buttons.
    Navigation,
}

/// Events the map reports to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    /// The map started loading tiles or data.
    DataLoading,
    /// The map finished its initial load and accepts sources and layers.
    Load,
}

/// Layout properties of a symbol layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SymbolLayout {
    pub text_field: String,
    pub text_size: f64,
    pub text_transform: String,
    pub icon_image: String,
    pub icon_size: f64,
    pub text_offset: [f64; 2],
}

/// Paint properties of a symbol layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SymbolPaint {
    pub text_color: String,
    pub text_halo_color: String,
    pub text_halo_width: f64,
}

/// A symbol layer drawing one route's vehicles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolLayer {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub layer_type: &'static str,
    pub layout: SymbolLayout,
    pub paint: SymbolPaint,
}

impl SymbolLayer {
    /// The bus layer for a route. Layer and source share the route tag as id.
    pub fn for_route(tag: &RouteTag) -> Self {
        Self {
            id: tag.as_str().to_string(),
            source: tag.as_str().to_string(),
            layer_type: "symbol",
            layout: SymbolLayout {
                text_field: format!("{{{}}}", crate::features::LABEL_PROPERTY),
                text_size: 12.0,
                text_transform: "uppercase".to_string(),
                icon_image: "bus".to_string(),
                icon_size: 2.0,
                text_offset: [0.0, 1.5],
            },
            paint: SymbolPaint {
                text_color: "#f16624".to_string(),
                text_halo_color: "#fff".to_string(),
                text_halo_width: 2.0,
            },
        }
    }
}

/// A map rendering surface.
///
/// Sources hold feature data; layers draw a source. Removing an id that does
/// not exist is a no-op.
pub trait MapSurface: Send + 'static {
    fn add_control(&mut self, control: Control);

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError>;

    fn add_layer(&mut self, layer: SymbolLayer) -> Result<(), MapError>;

    fn has_source(&self, id: &str) -> bool;

    fn has_layer(&self, id: &str) -> bool;

    /// Replace a source's data wholesale.
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError>;

    fn remove_layer(&mut self, id: &str);

    fn remove_source(&mut self, id: &str);

    /// Fit the map to its container.
    fn resize(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = MapOptions::default();
        assert_eq!(options.center, [-122.41, 37.75]);
        assert_eq!(options.zoom, 12.0);
        assert_eq!(options.style, "mapbox://styles/mapbox/streets-v11");
        assert!(options.access_token.is_none());
    }

    #[test]
    fn options_builder() {
        let options = MapOptions::default()
            .with_center(-122.0, 37.0)
            .with_zoom(13.0)
            .with_style("mapbox://styles/mapbox/dark-v10")
            .with_access_token("pk.test");
        assert_eq!(options.center, [-122.0, 37.0]);
        assert_eq!(options.zoom, 13.0);
        assert_eq!(options.style, "mapbox://styles/mapbox/dark-v10");
        assert_eq!(options.access_token.as_deref(), Some("pk.test"));
    }

    #[test]
    fn route_layer_style() {
        let layer = SymbolLayer::for_route(&RouteTag::parse("N").unwrap());
        let json = serde_json::to_value(&layer).unwrap();

        assert_eq!(json["id"], "N");
        assert_eq!(json["source"], "N");
        assert_eq!(json["type"], "symbol");
        assert_eq!(json["layout"]["text-field"], "{message}");
        assert_eq!(json["layout"]["text-size"], 12.0);
        assert_eq!(json["layout"]["icon-image"], "bus");
        assert_eq!(json["layout"]["text-offset"], serde_json::json!([0.0, 1.5]));
        assert_eq!(json["paint"]["text-color"], "#f16624");
        assert_eq!(json["paint"]["text-halo-width"], 2.0);
    }
}
