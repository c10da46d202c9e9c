//! Weather records: current observations (METAR) and forecasts (TAF).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Coordinate, IcaoCode};

/// How long a METAR stays current after its observation time, in minutes.
const METAR_LIFETIME_MINS: i64 = 90;

/// hPa per inch of mercury, as rounded by the aviation data server.
const HPA_PER_INHG: f64 = 33.86;

/// Plausible range for a reported pressure setting, in hPa.
const QNH_RANGE: std::ops::RangeInclusive<i64> = 800..=1200;

/// The two kinds of weather record a station can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Current observation.
    Metar,
    /// Terminal aerodrome forecast.
    Taf,
}

impl RecordKind {
    /// Data source name used by the aviation weather data server.
    pub fn data_source(self) -> &'static str {
        match self {
            RecordKind::Metar => "metars",
            RecordKind::Taf => "tafs",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Metar => f.write_str("METAR"),
            RecordKind::Taf => f.write_str("TAF"),
        }
    }
}

/// Flight category as computed by the data server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlightCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
}

impl FromStr for FlightCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "VFR" => Ok(FlightCategory::Vfr),
            "MVFR" => Ok(FlightCategory::Mvfr),
            "IFR" => Ok(FlightCategory::Ifr),
            "LIFR" => Ok(FlightCategory::Lifr),
            _ => Err(()),
        }
    }
}

/// Surface wind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wind {
    /// True direction in degrees; `None` for variable wind.
    pub direction_deg: Option<u16>,
    pub speed_kt: u16,
    pub gust_kt: Option<u16>,
}

/// A current weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metar {
    pub station: IcaoCode,
    pub observation_time: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub raw_text: String,
    pub coordinate: Option<Coordinate>,

    /// Pressure setting in hPa; 0 means "not reported".
    pub qnh: u16,

    pub temperature_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub wind: Option<Wind>,
    pub visibility_sm: Option<f64>,
    pub flight_category: Option<FlightCategory>,
}

impl Metar {
    /// Create an observation with no optional fields set. The expiration is
    /// derived from the observation time.
    pub fn new(
        station: IcaoCode,
        observation_time: DateTime<Utc>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            station,
            observation_time,
            expiration: observation_time + Duration::minutes(METAR_LIFETIME_MINS),
            raw_text: raw_text.into(),
            coordinate: None,
            qnh: 0,
            temperature_c: None,
            dewpoint_c: None,
            wind: None,
            visibility_sm: None,
            flight_category: None,
        }
    }

    /// Convert an altimeter setting in inches of mercury to whole hPa.
    ///
    /// Returns 0 ("not reported") for values outside 800–1200 hPa.
    pub fn qnh_from_inhg(inhg: f64) -> u16 {
        if !inhg.is_finite() {
            return 0;
        }
        let hpa = (inhg * HPA_PER_INHG).round() as i64;
        if QNH_RANGE.contains(&hpa) {
            hpa as u16
        } else {
            0
        }
    }

    /// Whether a pressure setting was reported.
    pub fn has_qnh(&self) -> bool {
        self.qnh != 0
    }
}

/// A terminal aerodrome forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taf {
    pub station: IcaoCode,
    pub issue_time: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub raw_text: String,
    pub coordinate: Option<Coordinate>,
}

impl Taf {
    pub fn new(
        station: IcaoCode,
        issue_time: DateTime<Utc>,
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            station,
            issue_time,
            valid_from,
            valid_to,
            raw_text: raw_text.into(),
            coordinate: None,
        }
    }
}

/// A decoded, validated weather record of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherRecord {
    Metar(Metar),
    Taf(Taf),
}

impl WeatherRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            WeatherRecord::Metar(_) => RecordKind::Metar,
            WeatherRecord::Taf(_) => RecordKind::Taf,
        }
    }

    pub fn station(&self) -> IcaoCode {
        match self {
            WeatherRecord::Metar(m) => m.station,
            WeatherRecord::Taf(t) => t.station,
        }
    }

    /// Observation time for a METAR, issue time for a TAF.
    pub fn observation_time(&self) -> DateTime<Utc> {
        match self {
            WeatherRecord::Metar(m) => m.observation_time,
            WeatherRecord::Taf(t) => t.issue_time,
        }
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        match self {
            WeatherRecord::Metar(m) => m.expiration,
            WeatherRecord::Taf(t) => t.valid_to,
        }
    }

    pub fn raw_text(&self) -> &str {
        match self {
            WeatherRecord::Metar(m) => &m.raw_text,
            WeatherRecord::Taf(t) => &t.raw_text,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            WeatherRecord::Metar(m) => m.coordinate,
            WeatherRecord::Taf(t) => t.coordinate,
        }
    }

    /// A record is expired once its expiration lies strictly before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration() < now
    }
}

impl From<Metar> for WeatherRecord {
    fn from(metar: Metar) -> Self {
        WeatherRecord::Metar(metar)
    }
}

impl From<Taf> for WeatherRecord {
    fn from(taf: Taf) -> Self {
        WeatherRecord::Taf(taf)
    }
}
