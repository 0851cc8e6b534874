//! Async driver for the route layer engine.
//!
//! A single task owns the engine and its map. Selection changes, map events,
//! fetch results and clock ticks all arrive at that task as messages, so the
//! layer registry never needs a lock. Each fetch runs on its own task and
//! reports back through a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::{RouteTag, VehicleBatch};
use crate::map::{MapEvent, MapSurface};
use crate::nextbus::{FeedError, FeedProvider};
use crate::selection::LayerSink;

use super::clock::PollingClock;
use super::layers::RouteLayerEngine;
use super::state::{Completion, FetchTicket};

/// Requests accepted by the driver.
#[derive(Debug, Clone)]
enum Command {
    Activate(RouteTag),
    Deactivate(RouteTag),
    MapEvent(MapEvent),
    Shutdown,
}

/// Notifications about route layers, for observers such as the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    /// A route's source was replaced with fresh data.
    Updated {
        tag: RouteTag,
        vehicles: usize,
        skipped: usize,
    },
    /// A fetch or map update for a route failed. The previous data, if any,
    /// stays on the map.
    FetchFailed { tag: RouteTag, message: String },
    /// A route's layer and source were removed.
    Removed { tag: RouteTag },
}

/// Handle to a running engine task.
///
/// Cheap to clone. Sends never block. The task stops when
/// [`shutdown`](Self::shutdown) is called or every handle is dropped.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<LayerEvent>,
}

impl EngineHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("engine task has stopped, dropping command");
        }
    }

    /// Forward a map event (data loading, load finished).
    pub fn map_event(&self, event: MapEvent) {
        self.send(Command::MapEvent(event));
    }

    /// Stop the engine task and its polling clock.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Whether the engine task has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Subscribe to layer events.
    pub fn subscribe(&self) -> broadcast::Receiver<LayerEvent> {
        self.events.subscribe()
    }
}

impl LayerSink for EngineHandle {
    fn activate(&mut self, tag: &RouteTag) {
        self.send(Command::Activate(tag.clone()));
    }

    fn deactivate(&mut self, tag: &RouteTag) {
        self.send(Command::Deactivate(tag.clone()));
    }
}

type FetchResult = (FetchTicket, Result<VehicleBatch, FeedError>);

struct Driver<M: MapSurface, F: FeedProvider> {
    engine: RouteLayerEngine<M>,
    feed: Arc<F>,
    events: broadcast::Sender<LayerEvent>,
    results: mpsc::UnboundedSender<FetchResult>,
    retries: mpsc::UnboundedSender<(RouteTag, u64)>,
}

/// Start the engine task.
///
/// The join handle yields the engine back once the task stops.
pub fn spawn<M, F>(engine: RouteLayerEngine<M>, feed: Arc<F>) -> (EngineHandle, JoinHandle<RouteLayerEngine<M>>)
where
    M: MapSurface,
    F: FeedProvider,
{
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let (retries_tx, retries_rx) = mpsc::unbounded_channel();
    let (events_tx, _) = broadcast::channel(engine.config().event_capacity.max(1));

    let handle = EngineHandle {
        commands: commands_tx,
        events: events_tx.clone(),
    };

    let driver = Driver {
        engine,
        feed,
        events: events_tx,
        results: results_tx,
        retries: retries_tx,
    };

    let task = tokio::spawn(driver.run(commands_rx, results_rx, retries_rx));
    (handle, task)
}

impl<M: MapSurface, F: FeedProvider> Driver<M, F> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut results: mpsc::UnboundedReceiver<FetchResult>,
        mut retries: mpsc::UnboundedReceiver<(RouteTag, u64)>,
    ) -> RouteLayerEngine<M> {
        let config = self.engine.config();
        let mut clock = PollingClock::new(config.initial_delay(), config.poll_period());

        info!("route layer engine started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some((ticket, result)) = results.recv() => self.handle_result(ticket, result),
                Some((tag, epoch)) = retries.recv() => {
                    let ticket = self.engine.retry(&tag, epoch);
                    self.dispatch(ticket);
                }
                tick = clock.tick() => {
                    let tickets = self.engine.refresh_tick();
                    if tickets.is_empty() {
                        debug!(tick, "no routes to poll");
                    } else {
                        debug!(tick, routes = tickets.len(), "refreshing");
                    }
                    self.dispatch(tickets);
                }
            }
        }

        info!("route layer engine stopped");
        self.engine
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate(tag) => {
                let ticket = self.engine.activate(tag);
                self.dispatch(ticket);
            }
            Command::Deactivate(tag) => {
                if self.engine.deactivate(&tag) {
                    let _ = self.events.send(LayerEvent::Removed { tag });
                }
            }
            Command::MapEvent(event) => {
                let tickets = self.engine.handle_map_event(event);
                self.dispatch(tickets);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_result(&mut self, ticket: FetchTicket, result: Result<VehicleBatch, FeedError>) {
        let message = result.as_ref().err().map(ToString::to_string);

        match self.engine.complete(&ticket, result) {
            Completion::Applied { features, skipped } => {
                let _ = self.events.send(LayerEvent::Updated {
                    tag: ticket.tag,
                    vehicles: features,
                    skipped,
                });
            }
            Completion::Stale => {}
            Completion::Failed { retry_after } => {
                if let Some(delay) = retry_after {
                    self.schedule_retry(ticket.tag.clone(), ticket.epoch, delay);
                }
                let _ = self.events.send(LayerEvent::FetchFailed {
                    tag: ticket.tag,
                    message: message.unwrap_or_default(),
                });
            }
            Completion::MapRejected { error, retry_after } => {
                if let Some(delay) = retry_after {
                    self.schedule_retry(ticket.tag.clone(), ticket.epoch, delay);
                }
                let _ = self.events.send(LayerEvent::FetchFailed {
                    tag: ticket.tag,
                    message: error.to_string(),
                });
            }
        }
    }

    fn schedule_retry(&self, tag: RouteTag, epoch: u64, delay: Duration) {
        let retries = self.retries.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = retries.send((tag, epoch));
        });
    }

    fn dispatch(&self, tickets: impl IntoIterator<Item = FetchTicket>) {
        for ticket in tickets {
            let feed = Arc::clone(&self.feed);
            let results = self.results.clone();
            tokio::spawn(async move {
                let result = feed.fetch_vehicles(Some(&ticket.tag)).await;
                let _ = results.send((ticket, result));
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleRecord;
    use crate::engine::{EngineConfig, LayerState};
    use crate::map::{Control, InMemoryMap, MapOp};
    use crate::nextbus::MockFeedClient;
    use crate::selection::SelectionController;
    use tokio::time::Instant;

    fn tag(s: &str) -> RouteTag {
        RouteTag::parse(s).unwrap()
    }

    fn batch(route: &str, ids: &[&str]) -> VehicleBatch {
        VehicleBatch::from_vehicles(
            ids.iter()
                .map(|id| VehicleRecord {
                    id: id.to_string(),
                    route_tag: tag(route),
                    lat: "37.760983".to_string(),
                    lon: "-122.493721".to_string(),
                    heading: None,
                    speed_kmh: None,
                    secs_since_report: None,
                    dir_tag: None,
                    predictable: true,
                })
                .collect(),
        )
    }

    fn start(
        feed: &MockFeedClient,
    ) -> (
        EngineHandle,
        JoinHandle<RouteLayerEngine<InMemoryMap>>,
        InMemoryMap,
    ) {
        let map = InMemoryMap::default();
        let engine = RouteLayerEngine::new(map.clone(), EngineConfig::default());
        let (handle, task) = spawn(engine, Arc::new(feed.clone()));
        (handle, task, map)
    }

    async fn next_event(events: &mut broadcast::Receiver<LayerEvent>) -> LayerEvent {
        tokio::time::timeout(Duration::from_secs(120), events.recv())
            .await
            .expect("no layer event")
            .expect("event channel closed")
    }

    #[tokio::test(start_paused = true)]
    async fn polls_after_initial_delay_then_every_period() {
        let feed = MockFeedClient::new();
        feed.set_batch(tag("N"), batch("N", &["1455"])).await;
        let (handle, _task, map) = start(&feed);
        let mut events = handle.subscribe();
        let began = Instant::now();

        handle.map_event(MapEvent::Load);
        handle.clone().activate(&tag("N"));

        let updated = LayerEvent::Updated {
            tag: tag("N"),
            vehicles: 1,
            skipped: 0,
        };

        // Activation fetch.
        assert_eq!(next_event(&mut events).await, updated);
        assert_eq!(began.elapsed(), Duration::ZERO);
        assert_eq!(feed.call_count().await, 1);

        // First poll.
        assert_eq!(next_event(&mut events).await, updated);
        assert_eq!(began.elapsed(), Duration::from_secs(1));
        assert_eq!(feed.call_count().await, 2);

        // Second poll.
        assert_eq!(next_event(&mut events).await, updated);
        assert_eq!(began.elapsed(), Duration::from_secs(16));
        assert_eq!(feed.calls().await, vec![Some(tag("N")); 3]);

        assert_eq!(map.source_ids(), vec!["N".to_string()]);
        assert_eq!(map.controls(), vec![Control::Navigation]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_polls_without_selected_routes() {
        let feed = MockFeedClient::new();
        let (handle, _task, _map) = start(&feed);
        handle.map_event(MapEvent::Load);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(feed.call_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deselect_during_activation_fetch_leaves_no_layer() {
        let feed = MockFeedClient::new();
        feed.set_batch(tag("N"), batch("N", &["1455"])).await;
        feed.set_latency(Duration::from_secs(5)).await;
        let (handle, task, map) = start(&feed);
        let mut events = handle.subscribe();

        handle.map_event(MapEvent::Load);
        let mut selection = SelectionController::new(handle.clone());
        selection.add(tag("N"));
        selection.remove(&tag("N"));

        assert_eq!(
            next_event(&mut events).await,
            LayerEvent::Removed { tag: tag("N") }
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(feed.call_count().await, 1);
        assert!(map.source_ids().is_empty());
        assert_eq!(map.count(&MapOp::AddSource("N".to_string())), 0);

        handle.shutdown();
        let engine = task.await.unwrap();
        assert!(engine.registered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_activation_is_retried_with_backoff() {
        let feed = MockFeedClient::new();
        feed.set_batch(tag("N"), batch("N", &["1455"])).await;
        feed.fail_route(tag("N"), "Agency server cannot accept client").await;
        let (handle, _task, map) = start(&feed);
        let mut events = handle.subscribe();
        let began = Instant::now();

        handle.map_event(MapEvent::Load);
        handle.clone().activate(&tag("N"));

        let LayerEvent::FetchFailed { tag: failed, message } = next_event(&mut events).await
        else {
            panic!("expected a fetch failure");
        };
        assert_eq!(failed, tag("N"));
        assert!(message.contains("Agency server cannot accept client"));
        assert!(!map.has_source("N"));

        feed.clear_failure(&tag("N")).await;

        assert!(matches!(
            next_event(&mut events).await,
            LayerEvent::Updated { vehicles: 1, .. }
        ));
        assert_eq!(began.elapsed(), Duration::from_secs(2));
        assert!(map.has_layer("N"));
    }

    #[tokio::test(start_paused = true)]
    async fn route_recovers_when_feed_returns_after_retries_run_out() {
        let feed = MockFeedClient::new();
        feed.set_batch(tag("N"), batch("N", &["1455"])).await;
        feed.fail_route(tag("N"), "feed down").await;
        let (handle, task, map) = start(&feed);
        let mut events = handle.subscribe();

        handle.map_event(MapEvent::Load);
        handle.clone().activate(&tag("N"));

        // Backoff retries at 2, 6, 14 and 30 s, then one attempt per poll.
        tokio::time::sleep(Duration::from_secs(60)).await;
        let during_outage = feed.call_count().await;
        assert!(during_outage > 5, "only {during_outage} fetches during outage");
        assert!(!map.has_source("N"));

        feed.clear_failure(&tag("N")).await;
        let recovered = loop {
            match next_event(&mut events).await {
                LayerEvent::Updated { tag, vehicles, .. } => break (tag, vehicles),
                LayerEvent::FetchFailed { .. } => continue,
                other => panic!("unexpected event {other:?}"),
            }
        };
        assert_eq!(recovered, (tag("N"), 1));
        assert!(map.has_source("N"));
        assert!(map.has_layer("N"));

        handle.shutdown();
        let engine = task.await.unwrap();
        assert_eq!(engine.state(&tag("N")), LayerState::Active);
        assert_eq!(engine.entry(&tag("N")).unwrap().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_layer() {
        let feed = MockFeedClient::new();
        feed.set_batch(tag("N"), batch("N", &["1455", "1456"])).await;
        let (handle, task, map) = start(&feed);
        let mut events = handle.subscribe();

        handle.map_event(MapEvent::Load);
        handle.clone().activate(&tag("N"));
        assert!(matches!(
            next_event(&mut events).await,
            LayerEvent::Updated { vehicles: 2, .. }
        ));

        feed.fail_route(tag("N"), "feed down").await;
        assert!(matches!(
            next_event(&mut events).await,
            LayerEvent::FetchFailed { .. }
        ));
        assert_eq!(map.source_data("N").unwrap().len(), 2);

        handle.shutdown();
        let engine = task.await.unwrap();
        assert_eq!(engine.state(&tag("N")), LayerState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_before_load_is_applied_on_load() {
        let feed = MockFeedClient::new();
        feed.set_batch(tag("6"), batch("6", &["8001"])).await;
        let (handle, _task, map) = start(&feed);
        let mut events = handle.subscribe();

        let selection = SelectionController::with_initial([tag("6")], handle.clone());
        assert_eq!(selection.len(), 1);

        handle.map_event(MapEvent::DataLoading);
        handle.map_event(MapEvent::Load);

        assert_eq!(
            next_event(&mut events).await,
            LayerEvent::Updated {
                tag: tag("6"),
                vehicles: 1,
                skipped: 0
            }
        );
        assert_eq!(map.count(&MapOp::Resize), 1);
        assert!(map.has_layer("6"));
    }

    #[tokio::test(start_paused = true)]
    async fn engine_stops_when_handles_are_dropped() {
        let feed = MockFeedClient::new();
        let (handle, task, _map) = start(&feed);
        let observer = handle.clone();

        drop(handle);
        assert!(!observer.is_closed());
        drop(observer);

        let engine = task.await.unwrap();
        assert!(!engine.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_handle() {
        let feed = MockFeedClient::new();
        let (handle, task, _map) = start(&feed);

        handle.shutdown();
        task.await.unwrap();
        assert!(handle.is_closed());

        // Commands after shutdown are dropped quietly.
        handle.clone().activate(&tag("N"));
        assert_eq!(feed.call_count().await, 0);
    }
}
