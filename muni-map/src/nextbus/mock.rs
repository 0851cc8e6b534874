//! Mock feed client for testing without network access.
//!
//! Serves canned vehicle batches per route, either registered in code or
//! loaded from `{tag}.json` files holding raw `vehicleLocations` responses.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::domain::{RouteTag, VehicleBatch};

use super::convert::convert_response;
use super::error::FeedError;
use super::provider::FeedProvider;
use super::types::VehicleLocationsResponse;

#[derive(Default)]
struct MockState {
    batches: BTreeMap<RouteTag, VehicleBatch>,
    failures: HashMap<RouteTag, (String, bool)>,
    calls: Vec<Option<RouteTag>>,
    latency: Duration,
}

/// Mock feed client that serves data from memory.
///
/// Routes with no registered batch answer with an empty batch, which is what
/// the live feed does for a route with no vehicles in service.
#[derive(Clone, Default)]
pub struct MockFeedClient {
    state: Arc<Mutex<MockState>>,
}

impl MockFeedClient {
    /// Create an empty mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock client by loading JSON files from a directory.
    ///
    /// Expects files named `{tag}.json` (e.g., `N.json`, `38R.json`), each a raw
    /// `vehicleLocations` response.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> Result<Self, FeedError> {
        let data_dir = data_dir.as_ref();
        let mut batches = BTreeMap::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| FeedError::Api {
            status: 0,
            message: format!("Failed to read mock data directory: {}", e),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| FeedError::Api {
                status: 0,
                message: format!("Failed to read directory entry: {}", e),
            })?;

            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let tag_str = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| FeedError::Api {
                    status: 0,
                    message: format!("Invalid filename: {:?}", path),
                })?;

            let tag = RouteTag::parse(tag_str).map_err(|_| FeedError::Api {
                status: 0,
                message: format!("Invalid route tag in filename: {}", tag_str),
            })?;

            let json = std::fs::read_to_string(&path).map_err(|e| FeedError::Api {
                status: 0,
                message: format!("Failed to read {:?}: {}", path, e),
            })?;

            let response: VehicleLocationsResponse =
                serde_json::from_str(&json).map_err(|e| FeedError::Json {
                    message: format!("Failed to parse {:?}: {}", path, e),
                    body: None,
                })?;

            let batch = convert_response(&response, Some(&tag))?;
            batches.insert(tag, batch);
        }

        if batches.is_empty() {
            return Err(FeedError::Api {
                status: 0,
                message: format!("No mock route files found in {:?}", data_dir),
            });
        }

        Ok(Self {
            state: Arc::new(Mutex::new(MockState {
                batches,
                ..MockState::default()
            })),
        })
    }

    /// Register the batch served for a route.
    pub async fn set_batch(&self, route: RouteTag, batch: VehicleBatch) {
        self.state.lock().await.batches.insert(route, batch);
    }

    /// Make every fetch for a route fail with a feed error.
    pub async fn fail_route(&self, route: RouteTag, content: impl Into<String>) {
        self.state
            .lock()
            .await
            .failures
            .insert(route, (content.into(), false));
    }

    /// Stop failing fetches for a route.
    pub async fn clear_failure(&self, route: &RouteTag) {
        self.state.lock().await.failures.remove(route);
    }

    /// Delay every response by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Every fetch made so far, in order.
    pub async fn calls(&self) -> Vec<Option<RouteTag>> {
        self.state.lock().await.calls.clone()
    }

    /// Number of fetches made so far.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Routes with registered batches.
    pub async fn available_routes(&self) -> Vec<RouteTag> {
        self.state.lock().await.batches.keys().cloned().collect()
    }
}

impl FeedProvider for MockFeedClient {
    async fn fetch_vehicles(&self, route: Option<&RouteTag>) -> Result<VehicleBatch, FeedError> {
        let (result, latency) = {
            let mut state = self.state.lock().await;
            state.calls.push(route.cloned());

            let result = match route {
                Some(route) => match state.failures.get(route) {
                    Some((content, should_retry)) => Err(FeedError::Feed {
                        content: content.clone(),
                        should_retry: *should_retry,
                    }),
                    None => Ok(state
                        .batches
                        .get(route)
                        .cloned()
                        .unwrap_or_else(|| VehicleBatch::from_vehicles(Vec::new()))),
                },
                None => Ok(VehicleBatch::from_vehicles(
                    state
                        .batches
                        .values()
                        .flat_map(|b| b.vehicles.iter().cloned())
                        .collect(),
                )),
            };

            (result, state.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        result
    }
}
