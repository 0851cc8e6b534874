//! NextBus public JSON feed HTTP client.
//!
//! Provides async access to the `vehicleLocations` command, scoped to a single
//! route or covering every route of the agency.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{RouteTag, VehicleBatch};

use super::convert::convert_response;
use super::error::FeedError;
use super::types::VehicleLocationsResponse;

/// Default base URL for the NextBus public JSON feed.
const DEFAULT_BASE_URL: &str = "http://webservices.nextbus.com/service/publicJSONFeed";

/// Default transit agency.
const DEFAULT_AGENCY: &str = "sf-muni";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Configuration for the NextBus client.
#[derive(Debug, Clone)]
pub struct NextBusConfig {
    /// Base URL for the feed (defaults to the public NextBus endpoint)
    pub base_url: String,
    /// Agency tag passed as the `a` query parameter
    pub agency: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl NextBusConfig {
    /// Create a config for the default agency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the agency.
    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = agency.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for NextBusConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agency: DEFAULT_AGENCY.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 10,
        }
    }
}

/// NextBus feed client.
///
/// Uses a semaphore to bound concurrent requests, so a burst of refreshes for
/// several routes does not open more connections than configured.
#[derive(Debug, Clone)]
pub struct NextBusClient {
    http: reqwest::Client,
    base_url: String,
    agency: String,
    semaphore: Arc<Semaphore>,
}

impl NextBusClient {
    /// Create a new client with the given configuration.
    pub fn new(config: NextBusConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            agency: config.agency,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    /// Query parameters for a `vehicleLocations` request.
    fn query(&self, route: Option<&RouteTag>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("command", "vehicleLocations".to_string()),
            ("a", self.agency.clone()),
        ];
        if let Some(route) = route {
            query.push(("r", route.as_str().to_string()));
        }
        query
    }

    /// Fetch vehicle locations.
    ///
    /// With `route` set, only vehicles on that route are requested. With `None`,
    /// every vehicle of the agency is returned.
    pub async fn get_vehicle_locations(
        &self,
        route: Option<&RouteTag>,
    ) -> Result<VehicleBatch, FeedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FeedError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        debug!(route = ?route.map(RouteTag::as_str), "fetching vehicle locations");

        let response = self
            .http
            .get(&self.base_url)
            .query(&self.query(route))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        let parsed: VehicleLocationsResponse =
            serde_json::from_str(&body).map_err(|e| FeedError::Json {
                message: e.to_string(),
                body: Some(body.chars().take(500).collect()),
            })?;

        convert_response(&parsed, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = NextBusConfig::new()
            .with_base_url("http://localhost:8080")
            .with_agency("actransit")
            .with_max_concurrent(10)
            .with_timeout(60);

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.agency, "actransit");
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn config_defaults() {
        let config = NextBusConfig::default();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.agency, "sf-muni");
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn client_creation() {
        let client = NextBusClient::new(NextBusConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn scoped_query_includes_route() {
        let client = NextBusClient::new(NextBusConfig::default()).unwrap();
        let route = RouteTag::parse("N").unwrap();

        let query = client.query(Some(&route));
        assert_eq!(
            query,
            vec![
                ("command", "vehicleLocations".to_string()),
                ("a", "sf-muni".to_string()),
                ("r", "N".to_string()),
            ]
        );
    }

    #[test]
    fn unscoped_query_omits_route() {
        let client = NextBusClient::new(NextBusConfig::default()).unwrap();
        let query = client.query(None);
        assert!(query.iter().all(|(k, _)| *k != "r"));
        assert_eq!(query.len(), 2);
    }

    // Requests against the live feed belong in an #[ignore]d test run
    // separately; the public endpoint is rate limited.
}
