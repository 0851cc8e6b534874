//! HTTP route handlers.

use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{delete, get},
};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::domain::RouteTag;
use crate::map::SymbolLayer;
use crate::nextbus::{FeedError, FeedProvider, fetch_routes};
use crate::selection::MAX_PILLS;

use super::dto::*;
use super::state::AppState;
use super::templates::IndexTemplate;

/// Create the application router.
///
/// `static_dir` is the path to the static assets directory.
pub fn create_router<F: FeedProvider>(state: AppState<F>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(index_page::<F>))
        .route("/health", get(health))
        .route("/api/map", get(map_options::<F>))
        .route("/api/routes/search", get(search_routes::<F>))
        .route("/api/pills", get(list_pills::<F>).post(add_pill::<F>))
        .route("/api/pills/:tag", delete(remove_pill::<F>))
        .route("/api/sources/:tag", get(source_data::<F>))
        .route("/api/layers", get(list_layers::<F>))
        .route("/api/vehicles", get(vehicles::<F>))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// The map page.
async fn index_page<F: FeedProvider>(
    State(state): State<AppState<F>>,
) -> Result<Html<String>, AppError> {
    let html = IndexTemplate::from_options(state.map.options())
        .render()
        .map_err(|e| AppError::Internal {
            message: format!("Template error: {}", e),
        })?;
    Ok(Html(html))
}

/// Map construction parameters, including the access token.
async fn map_options<F: FeedProvider>(State(state): State<AppState<F>>) -> Json<MapResponse> {
    Json(MapResponse {
        options: state.map.options().clone(),
        controls: state.map.controls(),
    })
}

/// Search the route catalog by tag.
async fn search_routes<F: FeedProvider>(
    State(state): State<AppState<F>>,
    Query(req): Query<RouteSearchRequest>,
) -> Json<RouteSearchResponse> {
    let routes = state.catalog.filter(&req.q).into_iter().cloned().collect();
    Json(RouteSearchResponse { routes })
}

fn parse_tag(s: &str) -> Result<RouteTag, AppError> {
    RouteTag::parse(s).map_err(|e| AppError::BadRequest {
        message: format!("Invalid route tag {:?}: {}", s, e),
    })
}

/// Build the pills view for `pills`, annotated with catalog titles and the
/// last failure of each route.
async fn pills_response<F: FeedProvider>(
    state: &AppState<F>,
    pills: Vec<RouteTag>,
    changed: Option<bool>,
) -> PillsResponse {
    let failures = state.failures.read().await;
    let pills = pills
        .into_iter()
        .map(|tag| PillView {
            title: state.catalog.find(&tag).map(|r| r.title.clone()),
            error: failures.get(&tag).cloned(),
            tag,
        })
        .collect();

    PillsResponse {
        pills,
        capacity: MAX_PILLS,
        changed,
    }
}

/// The current selection.
async fn list_pills<F: FeedProvider>(State(state): State<AppState<F>>) -> Json<PillsResponse> {
    let pills = state.selection.lock().await.pills().to_vec();
    Json(pills_response(&state, pills, None).await)
}

/// Add a route to the selection.
///
/// Adding to a full selection or adding a selected route changes nothing;
/// the response says whether anything changed.
async fn add_pill<F: FeedProvider>(
    State(state): State<AppState<F>>,
    Json(req): Json<AddPillRequest>,
) -> Result<Json<PillsResponse>, AppError> {
    let tag = parse_tag(&req.tag)?;

    let (changed, pills) = {
        let mut selection = state.selection.lock().await;
        let changed = selection.add(tag.clone());
        (changed, selection.pills().to_vec())
    };

    if changed {
        info!(route = %tag, "pill added");
    }
    Ok(Json(pills_response(&state, pills, Some(changed)).await))
}

/// Remove a route from the selection.
async fn remove_pill<F: FeedProvider>(
    State(state): State<AppState<F>>,
    Path(tag): Path<String>,
) -> Result<Json<PillsResponse>, AppError> {
    let tag = parse_tag(&tag)?;

    let (changed, pills) = {
        let mut selection = state.selection.lock().await;
        let changed = selection.remove(&tag);
        (changed, selection.pills().to_vec())
    };

    if changed {
        info!(route = %tag, "pill removed");
    }
    Ok(Json(pills_response(&state, pills, Some(changed)).await))
}

/// Current GeoJSON of a route's source.
async fn source_data<F: FeedProvider>(
    State(state): State<AppState<F>>,
    Path(tag): Path<String>,
) -> Result<Json<geojson::FeatureCollection>, AppError> {
    let collection = state
        .map
        .source_data(&tag)
        .ok_or_else(|| AppError::NotFound {
            message: format!("No source for route {}", tag),
        })?;
    Ok(Json(collection.to_geojson()))
}

/// Every layer on the map.
async fn list_layers<F: FeedProvider>(State(state): State<AppState<F>>) -> Json<Vec<SymbolLayer>> {
    Json(state.map.layers())
}

/// Fetch vehicles straight from the feed.
///
/// With no `routes`, a single request covers every route of the agency.
/// Otherwise the routes are fetched concurrently and per-route failures are
/// reported alongside the vehicles that did arrive.
async fn vehicles<F: FeedProvider>(
    State(state): State<AppState<F>>,
    Query(req): Query<VehiclesRequest>,
) -> Result<Json<VehiclesResponse>, AppError> {
    let routes = req
        .routes
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_tag)
        .collect::<Result<Vec<_>, _>>()?;

    if routes.is_empty() {
        let batch = state.feed.fetch_vehicles(None).await?;
        return Ok(Json(VehiclesResponse::from_batches([&batch], Vec::new())));
    }

    let mut batches = Vec::new();
    let mut errors = Vec::new();
    for (tag, result) in fetch_routes(state.feed.as_ref(), &routes).await {
        match result {
            Ok(batch) => batches.push(batch),
            Err(e) => {
                warn!(route = %tag, error = %e, "vehicle fetch failed");
                errors.push(RouteErrorResult {
                    tag,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(Json(VehiclesResponse::from_batches(&batches, errors)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Upstream { message: String },
    Internal { message: String },
}

impl From<FeedError> for AppError {
    fn from(e: FeedError) -> Self {
        AppError::Upstream {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, "{}", message);
        } else {
            warn!(%status, "{}", message);
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
