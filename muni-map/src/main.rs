use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use muni_map::catalog::RouteCatalog;
use muni_map::domain::RouteTag;
use muni_map::engine::{EngineConfig, RouteLayerEngine, spawn};
use muni_map::map::{InMemoryMap, MapEvent, MapOptions};
use muni_map::nextbus::{FeedProvider, MockFeedClient, NextBusClient, NextBusConfig};
use muni_map::selection::SelectionController;
use muni_map::web::{AppState, create_router};

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("MUNI_MAP_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let mut options = MapOptions::default();
    match std::env::var("MAPBOX_ACCESS_TOKEN") {
        Ok(token) => options = options.with_access_token(token),
        Err(_) => warn!("MAPBOX_ACCESS_TOKEN not set, the map will not render"),
    }

    let initial = initial_routes(std::env::var("MUNI_MAP_ROUTES").ok().as_deref());
    let static_dir = std::env::var("MUNI_MAP_STATIC_DIR")
        .unwrap_or_else(|_| concat!(env!("CARGO_MANIFEST_DIR"), "/static").to_string());

    match std::env::var("MUNI_MAP_MOCK_DIR") {
        Ok(dir) => {
            let feed = MockFeedClient::from_dir(&dir)?;
            info!(dir = %dir, "serving canned vehicle data");
            serve(feed, options, initial, &static_dir, addr).await
        }
        Err(_) => {
            let feed = NextBusClient::new(NextBusConfig::default())?;
            serve(feed, options, initial, &static_dir, addr).await
        }
    }
}

/// Parse a comma-separated route list, skipping invalid tags.
fn initial_routes(raw: Option<&str>) -> Vec<RouteTag> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match RouteTag::parse(s) {
            Ok(tag) => Some(tag),
            Err(e) => {
                warn!(route = s, error = %e, "ignoring initial route");
                None
            }
        })
        .collect()
}

async fn serve<F: FeedProvider>(
    feed: F,
    options: MapOptions,
    initial: Vec<RouteTag>,
    static_dir: &str,
    addr: SocketAddr,
) -> Result<(), BoxError> {
    let feed = Arc::new(feed);
    let map = InMemoryMap::new(options);
    let engine = RouteLayerEngine::new(map.clone(), EngineConfig::default());
    let (handle, engine_task) = spawn(engine, Arc::clone(&feed));

    // The server-side map has nothing to download.
    handle.map_event(MapEvent::DataLoading);
    handle.map_event(MapEvent::Load);

    let selection = SelectionController::with_initial(initial, handle.clone());
    info!(pills = ?selection.pills(), "initial selection");

    let state = AppState::new(selection, RouteCatalog::sf_muni(), map, feed);
    let tracker = state.track_failures().await;
    let app = create_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("muni map listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;

    handle.shutdown();
    engine_task.await?;
    tracker.abort();
    info!("shut down");
    Ok(())
}
