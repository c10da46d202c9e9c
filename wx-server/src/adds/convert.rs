//! Conversion from raw feed elements to validated domain records.
//!
//! A report that lacks a parseable station code or its required timestamps
//! is malformed and gets dropped; optional fields that fail to parse are
//! simply left unset.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::{Coordinate, IcaoCode, Metar, RecordKind, Taf, WeatherRecord, Wind};

/// Why a report element could not become a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRecord {
    /// Required field absent or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Station identifier is not a valid ICAO code
    #[error("invalid station code: {0}")]
    InvalidStation(String),

    /// Timestamp could not be parsed
    #[error("invalid timestamp in {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// The text content of a report element's direct children.
#[derive(Debug, Clone)]
pub struct RawElement {
    pub kind: RecordKind,
    fields: HashMap<String, String>,
}

impl RawElement {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: HashMap::new(),
        }
    }

    /// Append text to a field.
    pub fn push_text(&mut self, field: &str, text: &str) {
        self.fields.entry(field.to_string()).or_default().push_str(text);
    }

    /// Trimmed, non-empty field content.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Convert into a validated record.
    pub fn into_record(self) -> Result<WeatherRecord, MalformedRecord> {
        match self.kind {
            RecordKind::Metar => convert_metar(&self).map(WeatherRecord::Metar),
            RecordKind::Taf => convert_taf(&self).map(WeatherRecord::Taf),
        }
    }
}

fn convert_metar(raw: &RawElement) -> Result<Metar, MalformedRecord> {
    let station = station(raw)?;
    let observation_time = required_time(raw, "observation_time")?;
    let raw_text = raw.field("raw_text").unwrap_or_default();

    let mut metar = Metar::new(station, observation_time, raw_text);
    metar.coordinate = coordinate(raw);
    metar.qnh = number::<f64>(raw, "altim_in_hg")
        .map(Metar::qnh_from_inhg)
        .unwrap_or(0);
    metar.temperature_c = number(raw, "temp_c");
    metar.dewpoint_c = number(raw, "dewpoint_c");
    metar.wind = wind(raw);
    metar.visibility_sm = raw
        .field("visibility_statute_mi")
        .and_then(|v| v.trim_end_matches('+').parse().ok());
    metar.flight_category = raw.field("flight_category").and_then(|v| v.parse().ok());

    Ok(metar)
}

fn convert_taf(raw: &RawElement) -> Result<Taf, MalformedRecord> {
    let station = station(raw)?;
    let issue_time = required_time(raw, "issue_time")?;
    let valid_to = required_time(raw, "valid_time_to")?;
    let valid_from = optional_time(raw, "valid_time_from")?.unwrap_or(issue_time);
    let raw_text = raw.field("raw_text").unwrap_or_default();

    let mut taf = Taf::new(station, issue_time, valid_from, valid_to, raw_text);
    taf.coordinate = coordinate(raw);
    Ok(taf)
}

fn station(raw: &RawElement) -> Result<IcaoCode, MalformedRecord> {
    let value = raw
        .field("station_id")
        .ok_or(MalformedRecord::MissingField("station_id"))?;
    IcaoCode::parse(value).map_err(|_| MalformedRecord::InvalidStation(value.to_string()))
}

fn required_time(raw: &RawElement, field: &'static str) -> Result<DateTime<Utc>, MalformedRecord> {
    optional_time(raw, field)?.ok_or(MalformedRecord::MissingField(field))
}

fn optional_time(
    raw: &RawElement,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, MalformedRecord> {
    raw.field(field)
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| MalformedRecord::InvalidTimestamp {
                    field,
                    value: value.to_string(),
                })
        })
        .transpose()
}

fn number<T: FromStr>(raw: &RawElement, field: &str) -> Option<T> {
    raw.field(field)?.parse().ok()
}

fn coordinate(raw: &RawElement) -> Option<Coordinate> {
    let lat = number(raw, "latitude")?;
    let lon = number(raw, "longitude")?;
    Coordinate::new(lat, lon).ok()
}

fn wind(raw: &RawElement) -> Option<Wind> {
    let speed_kt = number(raw, "wind_speed_kt")?;
    // "VRB" (or a missing direction) means variable.
    let direction_deg = number(raw, "wind_dir_degrees");
    Some(Wind {
        direction_deg,
        speed_kt,
        gust_kt: number(raw, "wind_gust_kt"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FlightCategory;
    use chrono::TimeZone;

    fn metar_element(fields: &[(&str, &str)]) -> RawElement {
        let mut raw = RawElement::new(RecordKind::Metar);
        for (name, value) in fields {
            raw.push_text(name, value);
        }
        raw
    }

    #[test]
    fn full_metar() {
        let raw = metar_element(&[
            ("raw_text", "EDDF 011220Z 24012G22KT 9999 FEW030 18/09 Q1016"),
            ("station_id", "EDDF"),
            ("observation_time", "2024-06-01T12:20:00Z"),
            ("latitude", "50.03"),
            ("longitude", "8.55"),
            ("temp_c", "18.0"),
            ("dewpoint_c", "9.0"),
            ("wind_dir_degrees", "240"),
            ("wind_speed_kt", "12"),
            ("wind_gust_kt", "22"),
            ("visibility_statute_mi", "6.21+"),
            ("altim_in_hg", "30.00"),
            ("flight_category", "VFR"),
        ]);

        let WeatherRecord::Metar(metar) = raw.into_record().unwrap() else {
            panic!("expected METAR");
        };
        assert_eq!(metar.station.as_str(), "EDDF");
        assert_eq!(
            metar.observation_time,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 20, 0).unwrap()
        );
        assert_eq!(metar.qnh, 1016);
        assert_eq!(metar.temperature_c, Some(18.0));
        assert_eq!(
            metar.wind,
            Some(Wind {
                direction_deg: Some(240),
                speed_kt: 12,
                gust_kt: Some(22)
            })
        );
        assert_eq!(metar.visibility_sm, Some(6.21));
        assert_eq!(metar.flight_category, Some(FlightCategory::Vfr));
        assert!(metar.coordinate.is_some());
    }

    #[test]
    fn minimal_metar_is_valid() {
        let raw = metar_element(&[
            ("station_id", "KJFK"),
            ("observation_time", "2024-06-01T12:51:00Z"),
        ]);
        let record = raw.into_record().unwrap();
        let WeatherRecord::Metar(metar) = record else {
            panic!("expected METAR");
        };
        assert_eq!(metar.qnh, 0);
        assert!(metar.coordinate.is_none());
        assert!(metar.wind.is_none());
    }

    #[test]
    fn variable_wind_has_no_direction() {
        let raw = metar_element(&[
            ("station_id", "KJFK"),
            ("observation_time", "2024-06-01T12:51:00Z"),
            ("wind_dir_degrees", "VRB"),
            ("wind_speed_kt", "3"),
        ]);
        let WeatherRecord::Metar(metar) = raw.into_record().unwrap() else {
            panic!("expected METAR");
        };
        let wind = metar.wind.unwrap();
        assert_eq!(wind.direction_deg, None);
        assert_eq!(wind.speed_kt, 3);
    }

    #[test]
    fn missing_station_is_malformed() {
        let raw = metar_element(&[("observation_time", "2024-06-01T12:51:00Z")]);
        assert_eq!(
            raw.into_record().unwrap_err(),
            MalformedRecord::MissingField("station_id")
        );
    }

    #[test]
    fn bad_station_is_malformed() {
        let raw = metar_element(&[
            ("station_id", "XX"),
            ("observation_time", "2024-06-01T12:51:00Z"),
        ]);
        assert!(matches!(
            raw.into_record(),
            Err(MalformedRecord::InvalidStation(s)) if s == "XX"
        ));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let raw = metar_element(&[("station_id", "EDDF"), ("observation_time", "yesterday")]);
        assert!(matches!(
            raw.into_record(),
            Err(MalformedRecord::InvalidTimestamp {
                field: "observation_time",
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_position_is_dropped_not_fatal() {
        let raw = metar_element(&[
            ("station_id", "EDDF"),
            ("observation_time", "2024-06-01T12:20:00Z"),
            ("latitude", "123.0"),
            ("longitude", "8.5"),
        ]);
        assert_eq!(raw.into_record().unwrap().coordinate(), None);
    }

    #[test]
    fn taf_validity_window() {
        let mut raw = RawElement::new(RecordKind::Taf);
        raw.push_text("station_id", "EDDF");
        raw.push_text("issue_time", "2024-06-01T11:00:00Z");
        raw.push_text("valid_time_from", "2024-06-01T12:00:00Z");
        raw.push_text("valid_time_to", "2024-06-02T18:00:00Z");

        let WeatherRecord::Taf(taf) = raw.into_record().unwrap() else {
            panic!("expected TAF");
        };
        assert_eq!(taf.valid_from, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(taf.valid_to, Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap());
    }

    #[test]
    fn taf_without_end_of_validity_is_malformed() {
        let mut raw = RawElement::new(RecordKind::Taf);
        raw.push_text("station_id", "EDDF");
        raw.push_text("issue_time", "2024-06-01T11:00:00Z");
        assert_eq!(
            raw.into_record().unwrap_err(),
            MalformedRecord::MissingField("valid_time_to")
        );
    }

    #[test]
    fn taf_start_defaults_to_issue_time() {
        let mut raw = RawElement::new(RecordKind::Taf);
        raw.push_text("station_id", "EDDF");
        raw.push_text("issue_time", "2024-06-01T11:00:00Z");
        raw.push_text("valid_time_to", "2024-06-02T12:00:00Z");
        let WeatherRecord::Taf(taf) = raw.into_record().unwrap() else {
            panic!("expected TAF");
        };
        assert_eq!(taf.valid_from, taf.issue_time);
    }
}
