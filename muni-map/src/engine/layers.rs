//! The route layer state machine.
//!
//! Owns the mapping from selected route tags to map sources and layers. It
//! performs no I/O itself: operations that need feed data return
//! [`FetchTicket`]s, and results come back through [`RouteLayerEngine::complete`].
//! A result is applied only if its ticket's route is still registered under the
//! same epoch, so a route that was deselected while its fetch was in flight is
//! never resurrected.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::domain::{RouteTag, VehicleBatch};
use crate::features::{FeatureCollection, encode_lenient};
use crate::map::{Control, MapError, MapEvent, MapSurface, SymbolLayer};
use crate::nextbus::FeedError;

use super::config::EngineConfig;
use super::state::{Completion, FetchKind, FetchTicket, LayerEntry, LayerState};

/// Route layer engine over a map surface.
pub struct RouteLayerEngine<M: MapSurface> {
    map: M,
    config: EngineConfig,
    ready: bool,
    layers: BTreeMap<RouteTag, LayerEntry>,
    next_epoch: u64,
}

impl<M: MapSurface> RouteLayerEngine<M> {
    /// Create an engine over a freshly constructed map.
    ///
    /// The map is not considered ready until it reports [`MapEvent::Load`].
    pub fn new(map: M, config: EngineConfig) -> Self {
        Self {
            map,
            config,
            ready: false,
            layers: BTreeMap::new(),
            next_epoch: 0,
        }
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the map has finished loading.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Current state of a route. Unregistered routes are `Inactive`.
    pub fn state(&self, tag: &RouteTag) -> LayerState {
        self.layers
            .get(tag)
            .map_or(LayerState::Inactive, |entry| entry.state)
    }

    /// Registry entry of a route.
    pub fn entry(&self, tag: &RouteTag) -> Option<&LayerEntry> {
        self.layers.get(tag)
    }

    /// Every registered route, sorted.
    pub fn registered(&self) -> Vec<RouteTag> {
        self.layers.keys().cloned().collect()
    }

    /// Routes whose layer is live, sorted.
    pub fn active(&self) -> Vec<RouteTag> {
        self.layers
            .iter()
            .filter(|(_, entry)| entry.state == LayerState::Active)
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    fn issue_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    /// Register a selected route.
    ///
    /// Returns an activation ticket if the map is ready. Otherwise the route
    /// waits as `Inactive` and is activated by [`bootstrap`](Self::bootstrap).
    /// Activating a registered route is a no-op.
    pub fn activate(&mut self, tag: RouteTag) -> Option<FetchTicket> {
        if self.layers.contains_key(&tag) {
            trace!(route = %tag, "already registered");
            return None;
        }

        let epoch = self.issue_epoch();
        let mut entry = LayerEntry::new(epoch);

        let ticket = if self.ready {
            entry.state = LayerState::Activating;
            Some(FetchTicket {
                tag: tag.clone(),
                epoch,
                kind: FetchKind::Activate,
            })
        } else {
            debug!(route = %tag, "map not loaded, deferring activation");
            None
        };

        self.layers.insert(tag, entry);
        ticket
    }

    /// Deregister a route and tear down its layer and source.
    ///
    /// Any fetch still in flight for the route becomes stale. Returns whether
    /// the route was registered.
    pub fn deactivate(&mut self, tag: &RouteTag) -> bool {
        let Some(entry) = self.layers.get_mut(tag) else {
            return false;
        };

        entry.state = LayerState::Deactivating;
        if self.ready {
            self.map.remove_layer(tag.as_str());
            self.map.remove_source(tag.as_str());
        }
        self.layers.remove(tag);

        debug!(route = %tag, "deactivated");
        true
    }

    /// Tickets for the periodic poll.
    ///
    /// Active routes get a refresh. Once the map is ready, routes sitting
    /// `Inactive` with no retry pending are re-activated, so a route whose
    /// activation retries ran out recovers once the feed comes back.
    pub fn refresh_tick(&mut self) -> Vec<FetchTicket> {
        let ready = self.ready;
        self.layers
            .iter_mut()
            .filter_map(|(tag, entry)| {
                let kind = match entry.state {
                    LayerState::Active => FetchKind::Refresh,
                    LayerState::Inactive if ready && !entry.retry_pending => {
                        debug!(route = %tag, attempts = entry.attempts, "re-activating on tick");
                        entry.state = LayerState::Activating;
                        FetchKind::Activate
                    }
                    _ => return None,
                };
                Some(FetchTicket {
                    tag: tag.clone(),
                    epoch: entry.epoch,
                    kind,
                })
            })
            .collect()
    }

    /// Retry a failed activation.
    ///
    /// Only applies while the route is still registered under `epoch` and
    /// waiting as `Inactive`.
    pub fn retry(&mut self, tag: &RouteTag, epoch: u64) -> Option<FetchTicket> {
        let entry = self.layers.get_mut(tag)?;
        if entry.epoch != epoch {
            return None;
        }
        entry.retry_pending = false;

        if !self.ready || entry.state != LayerState::Inactive {
            return None;
        }

        entry.state = LayerState::Activating;
        Some(FetchTicket {
            tag: tag.clone(),
            epoch,
            kind: FetchKind::Activate,
        })
    }

    /// Prepare the loaded map and activate routes selected before it loaded.
    ///
    /// Runs once; later calls return nothing.
    pub fn bootstrap(&mut self) -> Vec<FetchTicket> {
        if self.ready {
            return Vec::new();
        }

        self.map.add_control(Control::Navigation);
        self.ready = true;

        let tickets: Vec<FetchTicket> = self
            .layers
            .iter_mut()
            .filter(|(_, entry)| entry.state == LayerState::Inactive)
            .map(|(tag, entry)| {
                entry.state = LayerState::Activating;
                FetchTicket {
                    tag: tag.clone(),
                    epoch: entry.epoch,
                    kind: FetchKind::Activate,
                }
            })
            .collect();

        info!(routes = tickets.len(), "map loaded");
        tickets
    }

    /// React to an event from the map.
    pub fn handle_map_event(&mut self, event: MapEvent) -> Vec<FetchTicket> {
        match event {
            MapEvent::DataLoading => {
                self.map.resize();
                Vec::new()
            }
            MapEvent::Load => self.bootstrap(),
        }
    }

    /// Apply the result of a ticket's fetch.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<VehicleBatch, FeedError>,
    ) -> Completion {
        let tag = &ticket.tag;

        let Some(entry) = self.layers.get_mut(tag) else {
            debug!(route = %tag, "discarding result for deselected route");
            return Completion::Stale;
        };

        if entry.epoch != ticket.epoch || entry.state == LayerState::Deactivating || !self.ready {
            debug!(
                route = %tag,
                epoch = ticket.epoch,
                current = entry.epoch,
                "discarding stale result"
            );
            return Completion::Stale;
        }

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                return match ticket.kind {
                    FetchKind::Activate => {
                        let retry_after = fail_activation(entry, &self.config);
                        warn!(
                            route = %tag,
                            attempt = entry.attempts,
                            retry_in = ?retry_after,
                            error = %e,
                            "activation fetch failed"
                        );
                        Completion::Failed { retry_after }
                    }
                    FetchKind::Refresh => {
                        warn!(route = %tag, error = %e, "refresh failed, keeping previous data");
                        Completion::Failed { retry_after: None }
                    }
                };
            }
        };

        let (collection, skipped) = encode_lenient(&batch.vehicles);
        for e in &skipped {
            warn!(route = %tag, error = %e, "dropping vehicle");
        }
        let features = collection.len();

        let applied = ensure_route_layer(&mut self.map, tag)
            .and_then(|()| self.map.set_source_data(tag.as_str(), collection));

        if let Err(error) = applied {
            entry.source_exists = self.map.has_source(tag.as_str());
            let retry_after = match ticket.kind {
                FetchKind::Activate => fail_activation(entry, &self.config),
                FetchKind::Refresh => {
                    entry.state = LayerState::Inactive;
                    None
                }
            };
            warn!(
                route = %tag,
                error = %error,
                retry_in = ?retry_after,
                "map rejected route layer"
            );
            return Completion::MapRejected { error, retry_after };
        }

        entry.source_exists = true;
        entry.state = LayerState::Active;
        entry.attempts = 0;
        trace!(route = %tag, features, kind = ?ticket.kind, "source updated");

        Completion::Applied {
            features,
            skipped: skipped.len(),
        }
    }
}

/// Mark a failed activation and work out when to retry it.
fn fail_activation(entry: &mut LayerEntry, config: &EngineConfig) -> Option<Duration> {
    entry.state = LayerState::Inactive;
    entry.attempts += 1;
    let retry_after = config.retry_backoff(entry.attempts);
    entry.retry_pending = retry_after.is_some();
    retry_after
}

/// Create whichever of a route's source and layer is missing.
///
/// A source created here is removed again if its layer cannot be added, so
/// the map never keeps a source without its layer.
fn ensure_route_layer<M: MapSurface>(map: &mut M, tag: &RouteTag) -> Result<(), MapError> {
    let id = tag.as_str();
    let created = !map.has_source(id);
    if created {
        map.add_source(id, FeatureCollection::empty())?;
    }

    if map.has_layer(id) {
        return Ok(());
    }

    let added = map.add_layer(SymbolLayer::for_route(tag));
    if added.is_err() && created {
        map.remove_source(id);
    }
    added
}
