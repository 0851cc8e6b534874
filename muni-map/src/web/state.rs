//! Application state for the web layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::RouteCatalog;
use crate::domain::RouteTag;
use crate::engine::{EngineHandle, LayerEvent};
use crate::map::InMemoryMap;
use crate::nextbus::FeedProvider;
use crate::selection::SelectionController;

/// Last fetch failure per route.
pub type FailureMap = Arc<RwLock<BTreeMap<RouteTag, String>>>;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
pub struct AppState<F: FeedProvider> {
    /// Selected routes, forwarding changes to the engine
    pub selection: Arc<Mutex<SelectionController<EngineHandle>>>,

    /// Routes offered by the search bar
    pub catalog: Arc<RouteCatalog>,

    /// The map the engine draws on
    pub map: InMemoryMap,

    /// Vehicle feed, for one-off fetches
    pub feed: Arc<F>,

    /// Fetch failures reported by the engine
    pub failures: FailureMap,
}

impl<F: FeedProvider> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            selection: Arc::clone(&self.selection),
            catalog: Arc::clone(&self.catalog),
            map: self.map.clone(),
            feed: Arc::clone(&self.feed),
            failures: Arc::clone(&self.failures),
        }
    }
}

impl<F: FeedProvider> AppState<F> {
    /// Create a new app state.
    pub fn new(
        selection: SelectionController<EngineHandle>,
        catalog: RouteCatalog,
        map: InMemoryMap,
        feed: Arc<F>,
    ) -> Self {
        Self {
            selection: Arc::new(Mutex::new(selection)),
            catalog: Arc::new(catalog),
            map,
            feed,
            failures: Arc::default(),
        }
    }

    /// Keep [`failures`](Self::failures) in step with the engine's events.
    ///
    /// The task ends when the engine stops.
    pub async fn track_failures(&self) -> JoinHandle<()> {
        let events = self.selection.lock().await.sink().subscribe();
        tokio::spawn(track_failures(events, Arc::clone(&self.failures)))
    }
}

async fn track_failures(
    mut events: tokio::sync::broadcast::Receiver<LayerEvent>,
    failures: FailureMap,
) {
    loop {
        match events.recv().await {
            Ok(event) => apply_event(&failures, event).await,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "layer event tracker fell behind");
            }
            Err(RecvError::Closed) => {
                debug!("engine stopped, failure tracker exiting");
                break;
            }
        }
    }
}

async fn apply_event(failures: &FailureMap, event: LayerEvent) {
    let mut failures = failures.write().await;
    match event {
        LayerEvent::FetchFailed { tag, message } => {
            failures.insert(tag, message);
        }
        LayerEvent::Updated { tag, .. } | LayerEvent::Removed { tag } => {
            failures.remove(&tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> RouteTag {
        RouteTag::parse(s).unwrap()
    }

    #[tokio::test]
    async fn failure_is_recorded_and_cleared_by_success() {
        let failures = FailureMap::default();

        apply_event(
            &failures,
            LayerEvent::FetchFailed {
                tag: tag("N"),
                message: "feed down".to_string(),
            },
        )
        .await;
        assert_eq!(
            failures.read().await.get(&tag("N")).map(String::as_str),
            Some("feed down")
        );

        apply_event(
            &failures,
            LayerEvent::Updated {
                tag: tag("N"),
                vehicles: 3,
                skipped: 0,
            },
        )
        .await;
        assert!(failures.read().await.is_empty());
    }

    #[tokio::test]
    async fn removal_clears_failure() {
        let failures = FailureMap::default();
        apply_event(
            &failures,
            LayerEvent::FetchFailed {
                tag: tag("6"),
                message: "timeout".to_string(),
            },
        )
        .await;
        apply_event(&failures, LayerEvent::Removed { tag: tag("6") }).await;
        assert!(failures.read().await.is_empty());
    }
}
