use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::SecondsFormat;
use serde_json::Value;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use mersul_core::Origin;
use mersul_core::cache::Cached;
use mersul_core::schema::{self, SchemaKind, TrainSchemaVersion};

use crate::dto::{
    HealthResponse, ItineraryQuery, StationListingResponse, StationQuery, TrainListingResponse,
    TrainQuery,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Response header carrying the instant the served record was scraped.
pub const LAST_FETCHED_HEADER: &str = "x-last-fetched";

/// Build the full router with all routes.
pub fn router<O: Origin>(state: Arc<AppState<O>>) -> Router {
    let v1 = Router::new()
        .route("/train/.schema.json", get(train_schema_v1))
        .route("/train/{number}", get(train_v1::<O>))
        .route("/trains", get(cached_trains::<O>));

    let v2 = Router::new()
        .route("/v2/train/.schema.json", get(train_schema_v2))
        .route("/v2/train/{number}", get(train_v2::<O>))
        .route("/v2/station/.schema.json", get(station_schema_v2))
        .route("/v2/station/{name}", get(station_v2::<O>))
        .route("/v2/trains", get(known_trains::<O>))
        .route("/v2/stations", get(known_stations::<O>));

    let v3 = Router::new()
        .route("/v3/itineraries/.schema.json", get(itineraries_schema_v3))
        .route("/v3/itineraries", get(itineraries_v3::<O>));

    let public = Router::new()
        .route("/health", get(health::<O>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(v1).merge(v2).merge(v3).with_state(state)
}

/// Base URL for `$schema` links: the configured public URL, else the `Host`
/// the request came in on.
fn schema_base<O: Origin>(state: &AppState<O>, headers: &HeaderMap) -> String {
    if let Some(url) = &state.public_url {
        return url.clone();
    }
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

type LastFetched = [(&'static str, String); 1];

fn last_fetched<T>(cached: &Cached<T>) -> LastFetched {
    [(
        LAST_FETCHED_HEADER,
        cached.last_refreshed.to_rfc3339_opts(SecondsFormat::Secs, true),
    )]
}

async fn train_response<O: Origin>(
    state: &AppState<O>,
    headers: &HeaderMap,
    number: &str,
    query: &TrainQuery,
    version: TrainSchemaVersion,
) -> Result<(LastFetched, axum::Json<Value>), ApiError> {
    let cached = state
        .service
        .train(number, query.use_yesterday(), query.date())
        .await?;
    let url = version.kind().url(&schema_base(state, headers));
    let document = schema::train_document(&cached.value, version, &url)?;
    Ok((last_fetched(&cached), axum::Json(document)))
}

// ---------------------------------------------------------------------------
// Trains
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/train/{number}",
    params(
        ("number" = String, Path, description = "Train number, e.g. 1538"),
        TrainQuery,
    ),
    responses(
        (status = 200, description = "Train document with H:MM schedule times", body = Object),
        (status = 404, description = "Train does not run on that day", body = crate::dto::ErrorResponse),
        (status = 500, description = "Fetch, parse or validation failure", body = crate::dto::ErrorResponse),
        (status = 504, description = "Origin timed out", body = crate::dto::ErrorResponse),
    ),
    tag = "v1"
)]
pub async fn train_v1<O: Origin>(
    State(state): State<Arc<AppState<O>>>,
    Path(number): Path<String>,
    Query(query): Query<TrainQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    train_response(&state, &headers, &number, &query, TrainSchemaVersion::V1).await
}

#[utoipa::path(
    get,
    path = "/v2/train/{number}",
    params(
        ("number" = String, Path, description = "Train number, e.g. 1538"),
        TrainQuery,
    ),
    responses(
        (status = 200, description = "Train document", body = Object),
        (status = 404, description = "Train does not run on that day", body = crate::dto::ErrorResponse),
        (status = 500, description = "Fetch, parse or validation failure", body = crate::dto::ErrorResponse),
        (status = 504, description = "Origin timed out", body = crate::dto::ErrorResponse),
    ),
    tag = "v2"
)]
pub async fn train_v2<O: Origin>(
    State(state): State<Arc<AppState<O>>>,
    Path(number): Path<String>,
    Query(query): Query<TrainQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    train_response(&state, &headers, &number, &query, TrainSchemaVersion::V2).await
}

#[utoipa::path(
    get,
    path = "/trains",
    responses(
        (status = 200, description = "Train numbers currently cached", body = Vec<String>),
    ),
    tag = "v1"
)]
pub async fn cached_trains<O: Origin>(State(state): State<Arc<AppState<O>>>) -> impl IntoResponse {
    axum::Json(state.service.cached_train_numbers().await)
}

#[utoipa::path(
    get,
    path = "/v2/trains",
    responses(
        (status = 200, description = "Every train seen so far", body = Vec<TrainListingResponse>),
    ),
    tag = "v2"
)]
pub async fn known_trains<O: Origin>(State(state): State<Arc<AppState<O>>>) -> impl IntoResponse {
    let trains: Vec<TrainListingResponse> = state
        .service
        .known_trains()
        .await
        .into_iter()
        .map(TrainListingResponse::from)
        .collect();
    axum::Json(trains)
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v2/station/{name}",
    params(
        ("name" = String, Path, description = "Station name or slug, e.g. brasov"),
        StationQuery,
    ),
    responses(
        (status = 200, description = "Station departures and arrivals", body = Object),
        (status = 500, description = "Fetch, parse or validation failure", body = crate::dto::ErrorResponse),
        (status = 504, description = "Origin timed out", body = crate::dto::ErrorResponse),
    ),
    tag = "v2"
)]
pub async fn station_v2<O: Origin>(
    State(state): State<Arc<AppState<O>>>,
    Path(name): Path<String>,
    Query(query): Query<StationQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let cached = state.service.station(&name, query.date()).await?;
    let url = SchemaKind::StationV2.url(&schema_base(&state, &headers));
    let document = schema::station_document(&cached.value, &url)?;
    Ok((last_fetched(&cached), axum::Json(document)))
}

#[utoipa::path(
    get,
    path = "/v2/stations",
    responses(
        (status = 200, description = "Every station seen so far, busiest first", body = Vec<StationListingResponse>),
    ),
    tag = "v2"
)]
pub async fn known_stations<O: Origin>(State(state): State<Arc<AppState<O>>>) -> impl IntoResponse {
    let stations: Vec<StationListingResponse> = state
        .service
        .known_stations()
        .await
        .into_iter()
        .map(StationListingResponse::from)
        .collect();
    axum::Json(stations)
}

// ---------------------------------------------------------------------------
// Itineraries
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v3/itineraries",
    params(ItineraryQuery),
    responses(
        (status = 200, description = "Itineraries between the two stations", body = Object),
        (status = 400, description = "Missing from or to"),
        (status = 404, description = "No connection on that day", body = crate::dto::ErrorResponse),
        (status = 500, description = "Fetch, parse or validation failure", body = crate::dto::ErrorResponse),
        (status = 504, description = "Origin timed out", body = crate::dto::ErrorResponse),
    ),
    tag = "v3"
)]
pub async fn itineraries_v3<O: Origin>(
    State(state): State<Arc<AppState<O>>>,
    Query(query): Query<ItineraryQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let cached = state
        .service
        .itineraries(&query.from, &query.to, query.date())
        .await?;
    let url = SchemaKind::ItinerariesV3.url(&schema_base(&state, &headers));
    let document = schema::itineraries_document(&cached.value, &url)?;
    Ok((last_fetched(&cached), axum::Json(document)))
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/train/.schema.json",
    responses((status = 200, description = "JSON Schema of v1 train documents", body = Object)),
    tag = "schemas"
)]
pub async fn train_schema_v1() -> impl IntoResponse {
    axum::Json(SchemaKind::TrainV1.document().clone())
}

#[utoipa::path(
    get,
    path = "/v2/train/.schema.json",
    responses((status = 200, description = "JSON Schema of v2 train documents", body = Object)),
    tag = "schemas"
)]
pub async fn train_schema_v2() -> impl IntoResponse {
    axum::Json(SchemaKind::TrainV2.document().clone())
}

#[utoipa::path(
    get,
    path = "/v2/station/.schema.json",
    responses((status = 200, description = "JSON Schema of station documents", body = Object)),
    tag = "schemas"
)]
pub async fn station_schema_v2() -> impl IntoResponse {
    axum::Json(SchemaKind::StationV2.document().clone())
}

#[utoipa::path(
    get,
    path = "/v3/itineraries/.schema.json",
    responses((status = 200, description = "JSON Schema of itinerary documents", body = Object)),
    tag = "schemas"
)]
pub async fn itineraries_schema_v3() -> impl IntoResponse {
    axum::Json(SchemaKind::ItinerariesV3.document().clone())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<O: Origin>(State(state): State<Arc<AppState<O>>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        known_trains: state.service.known_trains().await.len(),
        known_stations: state.service.known_stations().await.len(),
    };
    axum::Json(response)
}
