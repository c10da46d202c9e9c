//! Derived read views over a registry snapshot.
//!
//! Everything here is a pure function of the station list and the reference
//! coordinate; ties are broken by station code so the same inputs always
//! give the same answer.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::{Coordinate, IcaoCode, METRES_PER_NM};
use crate::registry::Station;

/// The pressure setting to use, and where it comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureSetting {
    /// QNH in hPa.
    pub qnh: u16,
    pub station: IcaoCode,
    pub observation_time: DateTime<Utc>,
    /// Distance from the reference coordinate, in metres.
    pub distance_m: f64,
}

impl PressureSetting {
    /// Distance from the reference coordinate, in nautical miles.
    pub fn distance_nm(&self) -> f64 {
        self.distance_m / METRES_PER_NM
    }
}

/// Read views over a set of stations relative to a reference position.
#[derive(Debug, Clone, Copy)]
pub struct QueryService<'a> {
    stations: &'a [Station],
    reference: Option<Coordinate>,
}

impl<'a> QueryService<'a> {
    pub fn new(stations: &'a [Station], reference: Option<Coordinate>) -> Self {
        Self {
            stations,
            reference,
        }
    }

    /// Distance from the reference to a station, if both positions are known.
    pub fn distance_to(&self, station: &Station) -> Option<f64> {
        let here = self.reference?;
        Some(here.distance_to(&station.coordinate()?))
    }

    /// Stations nearest first. Stations without a known distance come last;
    /// equal distances are ordered by code.
    pub fn stations_by_proximity(&self) -> Vec<&'a Station> {
        let mut keyed: Vec<(Option<f64>, &'a Station)> = self
            .stations
            .iter()
            .map(|s| (self.distance_to(s), s))
            .collect();

        keyed.sort_by(|(da, a), (db, b)| {
            compare_distance(*da, *db).then_with(|| a.code().cmp(&b.code()))
        });

        keyed.into_iter().map(|(_, s)| s).collect()
    }

    /// Nearest station with a reported pressure setting and a known position.
    pub fn nearest_pressure_setting(&self) -> Option<PressureSetting> {
        let here = self.reference?;

        self.stations
            .iter()
            .filter_map(|station| {
                let metar = station.metar().filter(|m| m.has_qnh())?;
                let distance_m = here.distance_to(&station.coordinate()?);
                Some(PressureSetting {
                    qnh: metar.qnh,
                    station: station.code(),
                    observation_time: metar.observation_time,
                    distance_m,
                })
            })
            .min_by(|a, b| {
                a.distance_m
                    .total_cmp(&b.distance_m)
                    .then_with(|| a.station.cmp(&b.station))
            })
    }

    /// One-line summary such as `QNH: 1013 hPa in EDDF, 12 min ago`.
    pub fn describe_pressure_setting(&self, now: DateTime<Utc>) -> Option<String> {
        let setting = self.nearest_pressure_setting()?;
        Some(format!(
            "QNH: {} hPa in {}, {}",
            setting.qnh,
            setting.station,
            describe_time_difference(setting.observation_time, now)
        ))
    }
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Describe how far `then` lies from `now`: `just now`, `12 min ago`,
/// `1h 05min ago`, `in 20 min`.
pub fn describe_time_difference(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes == 0 {
        return "just now".to_string();
    }

    let magnitude = minutes.unsigned_abs();
    let span = if magnitude < 60 {
        format!("{magnitude} min")
    } else {
        format!("{}h {:02}min", magnitude / 60, magnitude % 60)
    };

    if minutes > 0 {
        format!("{span} ago")
    } else {
        format!("in {span}")
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{Metar, WeatherRecord};
    use crate::registry::StationRegistry;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn station_strategy() -> impl Strategy<Value = (String, Option<(f64, f64)>)> {
        (
            "[A-Z]{4}",
            prop::option::of((-80.0f64..80.0, -179.0f64..179.0)),
        )
    }

    fn build(entries: &[(String, Option<(f64, f64)>)]) -> Vec<Station> {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut registry = StationRegistry::new();
        for (code, pos) in entries {
            let mut m = Metar::new(IcaoCode::parse(code).unwrap(), t, "");
            m.coordinate = pos.map(|(lat, lon)| Coordinate::new(lat, lon).unwrap());
            registry.upsert(WeatherRecord::Metar(m));
        }
        registry.snapshot()
    }

    proptest! {
        /// Distances never decrease along the sorted list, and unknown
        /// distances only appear at the end
        #[test]
        fn proximity_is_monotone(
            entries in prop::collection::vec(station_strategy(), 0..20),
            lat in -80.0f64..80.0,
            lon in -179.0f64..179.0,
        ) {
            let stations = build(&entries);
            let query = QueryService::new(&stations, Some(Coordinate::new(lat, lon).unwrap()));
            let sorted = query.stations_by_proximity();
            prop_assert_eq!(sorted.len(), stations.len());

            let distances: Vec<Option<f64>> = sorted.iter().map(|s| query.distance_to(s)).collect();
            for pair in distances.windows(2) {
                match (pair[0], pair[1]) {
                    (Some(a), Some(b)) => prop_assert!(a <= b),
                    (None, Some(_)) => prop_assert!(false, "unknown distance before known"),
                    _ => {}
                }
            }
        }

        /// Input order does not affect the result
        #[test]
        fn proximity_is_deterministic(
            entries in prop::collection::vec(station_strategy(), 0..20),
            lat in -80.0f64..80.0,
            lon in -179.0f64..179.0,
        ) {
            let here = Some(Coordinate::new(lat, lon).unwrap());
            let stations = build(&entries);
            let mut reversed = stations.clone();
            reversed.reverse();

            let a: Vec<IcaoCode> = QueryService::new(&stations, here)
                .stations_by_proximity()
                .iter()
                .map(|s| s.code())
                .collect();
            let b: Vec<IcaoCode> = QueryService::new(&reversed, here)
                .stations_by_proximity()
                .iter()
                .map(|s| s.code())
                .collect();
            prop_assert_eq!(a, b);
        }
    }
}
