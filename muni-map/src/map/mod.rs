//! Map surface abstraction and an in-memory implementation.

mod memory;
mod surface;

pub use memory::{InMemoryMap, MapOp};
pub use surface::{
    Control, MapError, MapEvent, MapOptions, MapSurface, SymbolLayer, SymbolLayout, SymbolPaint,
};
