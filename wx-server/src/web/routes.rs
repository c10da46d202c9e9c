//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::domain::{Coordinate, IcaoCode};
use crate::engine::EngineError;
use crate::scheduler::UpdateMode;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stations", get(list_stations))
        .route("/stations/:code", get(get_station))
        .route("/qnh", get(qnh))
        .route("/status", get(status))
        .route("/refresh", post(refresh))
        .route("/position", put(set_position))
        .route("/route", put(set_route))
        .route("/consent", put(set_consent))
        .route("/save", post(save))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// All stations, nearest first.
async fn list_stations(State(state): State<AppState>) -> Json<StationsResponse> {
    let view = state.engine.view();
    Json(StationsResponse::from_view(&view))
}

/// One station by ICAO code.
async fn get_station(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StationResult>, AppError> {
    let code = IcaoCode::parse_normalized(&code).map_err(|_| AppError::BadRequest {
        message: format!("Invalid ICAO code: {code}"),
    })?;

    let view = state.engine.view();
    let station = view
        .stations
        .iter()
        .find(|s| s.code() == code)
        .ok_or_else(|| AppError::NotFound {
            message: format!("No reports for {code}"),
        })?;

    Ok(Json(StationResult::from_station(station, view.position)))
}

/// Pressure setting from the nearest reporting station.
async fn qnh(State(state): State<AppState>) -> Result<Json<QnhResponse>, AppError> {
    let view = state.engine.view();
    let query = view.query();
    let not_found = || AppError::NotFound {
        message: "No pressure setting available".to_string(),
    };

    let setting = query.nearest_pressure_setting().ok_or_else(not_found)?;
    let description = query
        .describe_pressure_setting(Utc::now())
        .ok_or_else(not_found)?;

    Ok(Json(QnhResponse::new(setting, description)))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let view = state.engine.view();
    let scheduler = view.status(Instant::now());

    Json(StatusResponse {
        fetching: scheduler.fetching,
        mode: scheduler.mode,
        next_update_in_secs: scheduler.next_update_in_secs,
        stations: view.stations.len(),
        revision: view.revision,
        consent: view.consent,
        position: view.position,
        route_waypoints: view.route.len(),
    })
}

/// Ask for a foreground update.
async fn refresh(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.engine.request_update(UpdateMode::Foreground).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn set_position(
    State(state): State<AppState>,
    Json(req): Json<PositionRequest>,
) -> Result<StatusCode, AppError> {
    let position = if req.valid {
        Some(coordinate(req.lat, req.lon)?)
    } else {
        None
    };
    state.engine.set_position(position).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<StatusCode, AppError> {
    let route = req
        .waypoints
        .iter()
        .map(|wp| coordinate(wp.lat, wp.lon))
        .collect::<Result<Vec<_>, _>>()?;
    state.engine.set_route(route).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_consent(
    State(state): State<AppState>,
    Json(req): Json<ConsentRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.set_consent(req.accepted).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Write the registry snapshot now.
async fn save(State(state): State<AppState>) -> Result<Json<SaveResponse>, AppError> {
    match state.engine.save().await? {
        Some(saved) => Ok(Json(SaveResponse { saved })),
        None => Err(AppError::BadRequest {
            message: "No snapshot path configured".to_string(),
        }),
    }
}

fn coordinate(lat: f64, lon: f64) -> Result<Coordinate, AppError> {
    Coordinate::new(lat, lon).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            warn!(%status, %message, "request failed");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
