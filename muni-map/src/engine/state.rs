//! Per-route layer state and the values the engine hands to its driver.

use std::time::Duration;

use crate::domain::RouteTag;
use crate::map::MapError;

/// Lifecycle of one route's layer.
///
/// ```text
///            activate             fetch ok
/// Inactive ───────────► Activating ───────► Active ──┐ refresh
///  ▲ ▲  retry / tick        │                 │ ▲    │
///  │ └─── fetch failed ─────┘                 │ └────┘
///  └────────────── map rejected ──────────────┘
///
/// any ── deactivate ──► Deactivating ──► (removed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// No layer on the map. A registered route waits here for the map to load
    /// or for an activation retry.
    Inactive,
    /// Activation fetch in flight; the layer may not exist yet.
    Activating,
    /// Source and layer exist on the map.
    Active,
    /// Layer and source are being removed.
    Deactivating,
}

/// Registry entry for a selected route.
#[derive(Debug, Clone)]
pub struct LayerEntry {
    pub state: LayerState,

    /// Whether the engine has created this route's source on the map.
    pub source_exists: bool,

    /// Generation token. A fresh one is assigned on every activation, so
    /// results fetched for an earlier selection of the same route are
    /// recognisable.
    pub epoch: u64,

    /// Consecutive failed activation attempts.
    pub attempts: u32,

    /// Whether a backoff retry has been handed to the driver and not yet
    /// come back. Refresh ticks leave such routes alone.
    pub retry_pending: bool,
}

impl LayerEntry {
    pub(crate) fn new(epoch: u64) -> Self {
        Self {
            state: LayerState::Inactive,
            source_exists: false,
            epoch,
            attempts: 0,
            retry_pending: false,
        }
    }
}

/// Why a fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Activate,
    Refresh,
}

/// A feed fetch the engine wants performed.
///
/// The driver runs the fetch and hands the ticket back with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub tag: RouteTag,
    pub epoch: u64,
    pub kind: FetchKind,
}

/// Outcome of applying a fetch result.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Source data replaced.
    Applied {
        /// Features installed.
        features: usize,
        /// Vehicles dropped for bad coordinates.
        skipped: usize,
    },

    /// The route was deactivated (or re-selected) since the fetch was issued;
    /// the result was discarded.
    Stale,

    /// The fetch failed. For activations, `retry_after` says when to retry.
    Failed { retry_after: Option<Duration> },

    /// The map refused to create or update the route's layer. The route is
    /// back to `Inactive`; `retry_after` says when to retry.
    MapRejected {
        error: MapError,
        retry_after: Option<Duration>,
    },
}
