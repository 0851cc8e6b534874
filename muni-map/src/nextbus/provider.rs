//! The feed seam used by the route layer engine.

use std::future::Future;

use futures::future::join_all;

use crate::domain::{RouteTag, VehicleBatch};

use super::client::NextBusClient;
use super::error::FeedError;

/// Source of vehicle positions.
///
/// This abstraction lets the engine driver run against the live feed or
/// against canned data in tests.
pub trait FeedProvider: Send + Sync + 'static {
    /// Fetch vehicle positions for one route, or for every route when `route`
    /// is `None`.
    fn fetch_vehicles(
        &self,
        route: Option<&RouteTag>,
    ) -> impl Future<Output = Result<VehicleBatch, FeedError>> + Send;
}

impl FeedProvider for NextBusClient {
    async fn fetch_vehicles(&self, route: Option<&RouteTag>) -> Result<VehicleBatch, FeedError> {
        self.get_vehicle_locations(route).await
    }
}

/// Fetch several routes concurrently.
///
/// Results come back in the order of `routes`. One route failing does not
/// affect the others.
pub async fn fetch_routes<F: FeedProvider>(
    feed: &F,
    routes: &[RouteTag],
) -> Vec<(RouteTag, Result<VehicleBatch, FeedError>)> {
    let fetches = routes.iter().map(|route| async move {
        let result = feed.fetch_vehicles(Some(route)).await;
        (route.clone(), result)
    });
    join_all(fetches).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nextbus::MockFeedClient;

    fn tag(s: &str) -> RouteTag {
        RouteTag::parse(s).unwrap()
    }

    #[tokio::test]
    async fn fetch_routes_keeps_order_and_isolates_failures() {
        let feed = MockFeedClient::new();
        feed.fail_route(tag("6"), "no such route").await;

        let results = fetch_routes(&feed, &[tag("N"), tag("6"), tag("1")]).await;

        let routes: Vec<_> = results.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(routes, ["N", "6", "1"]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
        assert_eq!(feed.call_count().await, 3);
    }

    #[tokio::test]
    async fn fetch_routes_with_no_routes_makes_no_calls() {
        let feed = MockFeedClient::new();
        assert!(fetch_routes(&feed, &[]).await.is_empty());
        assert_eq!(feed.call_count().await, 0);
    }
}
