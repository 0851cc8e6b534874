//! In-memory map surface.
//!
//! Holds sources and layers exactly as a rendering library would, and records
//! every call made on it. The web layer serves its contents to the browser map;
//! tests inspect the call log.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::features::FeatureCollection;

use super::surface::{Control, MapError, MapOptions, MapSurface, SymbolLayer};

/// A call made on the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOp {
    AddControl(Control),
    AddSource(String),
    AddLayer(String),
    SetSourceData { id: String, features: usize },
    RemoveLayer(String),
    RemoveSource(String),
    Resize,
}

#[derive(Debug, Default)]
struct MapState {
    sources: BTreeMap<String, FeatureCollection>,
    layers: Vec<SymbolLayer>,
    controls: Vec<Control>,
    ops: Vec<MapOp>,
}

/// A clonable handle to an in-memory map. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryMap {
    options: Arc<MapOptions>,
    state: Arc<RwLock<MapState>>,
}

impl InMemoryMap {
    /// Construct a map with the given options.
    pub fn new(options: MapOptions) -> Self {
        Self {
            options: Arc::new(options),
            state: Arc::new(RwLock::new(MapState::default())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MapState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MapState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Current data of a source.
    pub fn source_data(&self, id: &str) -> Option<FeatureCollection> {
        self.read().sources.get(id).cloned()
    }

    /// Ids of every source, sorted.
    pub fn source_ids(&self) -> Vec<String> {
        self.read().sources.keys().cloned().collect()
    }

    /// Every layer, in the order they were added.
    pub fn layers(&self) -> Vec<SymbolLayer> {
        self.read().layers.clone()
    }

    pub fn controls(&self) -> Vec<Control> {
        self.read().controls.clone()
    }

    /// Every call made so far, in order.
    pub fn ops(&self) -> Vec<MapOp> {
        self.read().ops.clone()
    }

    /// Number of recorded calls equal to `op`.
    pub fn count(&self, op: &MapOp) -> usize {
        self.read().ops.iter().filter(|o| *o == op).count()
    }
}

impl Default for InMemoryMap {
    fn default() -> Self {
        Self::new(MapOptions::default())
    }
}

impl MapSurface for InMemoryMap {
    fn add_control(&mut self, control: Control) {
        let mut state = self.write();
        state.ops.push(MapOp::AddControl(control));
        state.controls.push(control);
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        let mut state = self.write();
        state.ops.push(MapOp::AddSource(id.to_string()));
        if state.sources.contains_key(id) {
            return Err(MapError::DuplicateSource(id.to_string()));
        }
        state.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn add_layer(&mut self, layer: SymbolLayer) -> Result<(), MapError> {
        let mut state = self.write();
        state.ops.push(MapOp::AddLayer(layer.id.clone()));
        if state.layers.iter().any(|l| l.id == layer.id) {
            return Err(MapError::DuplicateLayer(layer.id));
        }
        if !state.sources.contains_key(&layer.source) {
            return Err(MapError::MissingSource(layer.source));
        }
        state.layers.push(layer);
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.read().sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.read().layers.iter().any(|l| l.id == id)
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        let mut state = self.write();
        state.ops.push(MapOp::SetSourceData {
            id: id.to_string(),
            features: data.len(),
        });
        match state.sources.get_mut(id) {
            Some(existing) => {
                *existing = data;
                Ok(())
            }
            None => Err(MapError::MissingSource(id.to_string())),
        }
    }

    fn remove_layer(&mut self, id: &str) {
        let mut state = self.write();
        state.ops.push(MapOp::RemoveLayer(id.to_string()));
        state.layers.retain(|l| l.id != id);
    }

    fn remove_source(&mut self, id: &str) {
        let mut state = self.write();
        state.ops.push(MapOp::RemoveSource(id.to_string()));
        state.sources.remove(id);
    }

    fn resize(&mut self) {
        self.write().ops.push(MapOp::Resize);
    }
}
