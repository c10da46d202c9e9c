//! Query descriptors for the data server.

use std::fmt;

use crate::domain::{Coordinate, RecordKind};

/// Geographic area covered by a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArea {
    /// All stations within `radius_sm` statute miles of `center`.
    Radial { center: Coordinate, radius_sm: u32 },

    /// All stations within `corridor_sm` statute miles of a path.
    FlightPath {
        corridor_sm: u32,
        waypoints: Vec<Coordinate>,
    },
}

/// Which input an area was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaKind {
    Radial,
    FlightPath,
}

impl QueryArea {
    pub fn kind(&self) -> AreaKind {
        match self {
            QueryArea::Radial { .. } => AreaKind::Radial,
            QueryArea::FlightPath { .. } => AreaKind::FlightPath,
        }
    }

    /// The `(name, value)` parameter selecting this area.
    ///
    /// The server expects `lon,lat` pairs.
    fn param(&self) -> (&'static str, String) {
        match self {
            QueryArea::Radial { center, radius_sm } => (
                "radialDistance",
                format!("{};{},{}", radius_sm, center.lon(), center.lat()),
            ),
            QueryArea::FlightPath {
                corridor_sm,
                waypoints,
            } => {
                let mut value = corridor_sm.to_string();
                for wp in waypoints {
                    value.push_str(&format!(";{},{}", wp.lon(), wp.lat()));
                }
                ("flightPath", value)
            }
        }
    }
}

/// One request against the data server: a record kind over an area.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub kind: RecordKind,
    pub area: QueryArea,
}

impl QuerySpec {
    pub fn new(kind: RecordKind, area: QueryArea) -> Self {
        Self { kind, area }
    }

    /// Full parameter list for a retrieve request.
    pub fn query_params(&self, hours_before_now: u32) -> Vec<(&'static str, String)> {
        vec![
            ("requestType", "retrieve".to_string()),
            ("format", "xml".to_string()),
            ("hoursBeforeNow", hours_before_now.to_string()),
            ("mostRecentForEachStation", "true".to_string()),
            ("dataSource", self.kind.data_source().to_string()),
            self.area.param(),
        ]
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.area {
            QueryArea::Radial { center, radius_sm } => write!(
                f,
                "{} within {} sm of {:.4},{:.4}",
                self.kind,
                radius_sm,
                center.lat(),
                center.lon()
            ),
            QueryArea::FlightPath {
                corridor_sm,
                waypoints,
            } => write!(
                f,
                "{} within {} sm of route ({} waypoints)",
                self.kind,
                corridor_sm,
                waypoints.len()
            ),
        }
    }
}
