//! Keyed, self-expiring store of weather stations.
//!
//! The registry is the only place records are stored. It is mutated solely
//! through [`StationRegistry::upsert`] and [`StationRegistry::sweep_expired`];
//! every mutation bumps a revision counter so the owner can announce one
//! change per batch.

mod persist;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{Coordinate, IcaoCode, Metar, Taf, WeatherRecord};

pub use persist::{
    PersistError, SNAPSHOT_MAGIC, SNAPSHOT_VERSION, SnapshotFile, read_snapshot, write_snapshot,
};

/// A weather station and the current reports it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    code: IcaoCode,
    coordinate: Option<Coordinate>,
    metar: Option<Metar>,
    taf: Option<Taf>,
}

impl Station {
    fn new(code: IcaoCode) -> Self {
        Self {
            code,
            coordinate: None,
            metar: None,
            taf: None,
        }
    }

    pub fn code(&self) -> IcaoCode {
        self.code
    }

    /// Position, known once a report carrying one has been seen.
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn metar(&self) -> Option<&Metar> {
        self.metar.as_ref()
    }

    pub fn taf(&self) -> Option<&Taf> {
        self.taf.as_ref()
    }

    /// True when the station holds neither kind of report.
    pub fn is_empty(&self) -> bool {
        self.metar.is_none() && self.taf.is_none()
    }

    /// The reports held, METAR first.
    pub fn records(&self) -> impl Iterator<Item = WeatherRecord> + '_ {
        let metar = self.metar.clone().map(WeatherRecord::Metar);
        let taf = self.taf.clone().map(WeatherRecord::Taf);
        metar.into_iter().chain(taf)
    }

    /// Replace the report of the record's kind.
    fn set_record(&mut self, record: WeatherRecord) {
        if let Some(coordinate) = record.coordinate() {
            self.coordinate = Some(coordinate);
        }
        match record {
            WeatherRecord::Metar(metar) => self.metar = Some(metar),
            WeatherRecord::Taf(taf) => self.taf = Some(taf),
        }
    }

    /// Clear reports that expired before `now`. Returns true if any were.
    fn clear_expired(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if self.metar.as_ref().is_some_and(|m| m.expiration < now) {
            self.metar = None;
            changed = true;
        }
        if self.taf.as_ref().is_some_and(|t| t.valid_to < now) {
            self.taf = None;
            changed = true;
        }
        changed
    }
}

/// Registry of weather stations keyed by ICAO code.
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: HashMap<IcaoCode, Station>,
    revision: u64,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, creating its station if needed. The station's report
    /// of the same kind is replaced unconditionally.
    pub fn upsert(&mut self, record: WeatherRecord) -> &Station {
        self.revision += 1;
        let station = self
            .stations
            .entry(record.station())
            .or_insert_with(|| Station::new(record.station()));
        station.set_record(record);
        station
    }

    /// Upsert every record in order. Returns how many were stored.
    pub fn extend(&mut self, records: impl IntoIterator<Item = WeatherRecord>) -> usize {
        let mut count = 0;
        for record in records {
            self.upsert(record);
            count += 1;
        }
        count
    }

    /// Drop reports that expired before `now`, then drop stations left
    /// without any report. Returns whether anything changed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        for station in self.stations.values_mut() {
            changed |= station.clear_expired(now);
        }

        let before = self.stations.len();
        self.stations.retain(|_, station| !station.is_empty());
        changed |= self.stations.len() != before;

        if changed {
            self.revision += 1;
        }
        changed
    }

    /// All live stations, in no particular order.
    pub fn snapshot(&self) -> Vec<Station> {
        self.stations.values().cloned().collect()
    }

    pub fn get(&self, code: &IcaoCode) -> Option<&Station> {
        self.stations.get(code)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Every record held, station by station.
    pub fn records(&self) -> Vec<WeatherRecord> {
        self.stations.values().flat_map(Station::records).collect()
    }
}
