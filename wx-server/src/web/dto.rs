//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, Metar, Taf};
use crate::engine::WeatherView;
use crate::query::PressureSetting;
use crate::registry::Station;
use crate::scheduler::UpdateMode;

/// A station with its current reports.
#[derive(Debug, Serialize)]
pub struct StationResult {
    /// ICAO code
    pub code: String,

    /// Station position, if any report carried one
    pub coordinate: Option<Coordinate>,

    /// Distance from the current position in nautical miles
    pub distance_nm: Option<f64>,

    pub metar: Option<Metar>,
    pub taf: Option<Taf>,
}

impl StationResult {
    pub fn from_station(station: &Station, reference: Option<Coordinate>) -> Self {
        let distance_nm = reference
            .zip(station.coordinate())
            .map(|(here, there)| here.distance_nm(&there));

        Self {
            code: station.code().to_string(),
            coordinate: station.coordinate(),
            distance_nm,
            metar: station.metar().cloned(),
            taf: station.taf().cloned(),
        }
    }
}

/// Stations nearest first.
#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub reference: Option<Coordinate>,
    pub stations: Vec<StationResult>,
}

impl StationsResponse {
    pub fn from_view(view: &WeatherView) -> Self {
        let stations = view
            .query()
            .stations_by_proximity()
            .into_iter()
            .map(|s| StationResult::from_station(s, view.position))
            .collect();

        Self {
            reference: view.position,
            stations,
        }
    }
}

/// The pressure setting to use.
#[derive(Debug, Serialize)]
pub struct QnhResponse {
    /// QNH in hPa
    pub qnh: u16,
    pub station: String,
    pub observation_time: DateTime<Utc>,
    pub distance_nm: f64,
    /// Human readable summary, e.g. "QNH: 1013 hPa in EDDF, 12 min ago"
    pub description: String,
}

impl QnhResponse {
    pub fn new(setting: PressureSetting, description: String) -> Self {
        Self {
            qnh: setting.qnh,
            station: setting.station.to_string(),
            observation_time: setting.observation_time,
            distance_nm: setting.distance_nm(),
            description,
        }
    }
}

/// Engine status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub fetching: bool,
    pub mode: Option<UpdateMode>,
    pub next_update_in_secs: u64,
    pub stations: usize,
    pub revision: u64,
    pub consent: bool,
    pub position: Option<Coordinate>,
    pub route_waypoints: usize,
}

/// A position fix.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub lat: f64,
    pub lon: f64,

    /// Whether the fix is usable; invalid fixes keep the last valid position
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

/// A route waypoint.
#[derive(Debug, Deserialize)]
pub struct WaypointRequest {
    pub lat: f64,
    pub lon: f64,
}

/// The planned route, in flight order.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub waypoints: Vec<WaypointRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// Number of records written
    pub saved: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
