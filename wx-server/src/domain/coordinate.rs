//! Geographic coordinates and great-circle distance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per nautical mile.
pub const METRES_PER_NM: f64 = 1852.0;

/// Error returned for out-of-range or non-finite coordinates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid coordinate ({lat}, {lon}): {reason}")]
pub struct InvalidCoordinate {
    lat: f64,
    lon: f64,
    reason: &'static str,
}

/// A WGS84 position in decimal degrees.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Create a coordinate, checking that latitude lies in [-90, 90] and
    /// longitude in [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinate> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(InvalidCoordinate {
                lat,
                lon,
                reason: "must be finite",
            });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinate {
                lat,
                lon,
                reason: "latitude out of range",
            });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidCoordinate {
                lat,
                lon,
                reason: "longitude out of range",
            });
        }
        Ok(Self { lat, lon })
    }

    /// Parse `"lat,lon"`, as used in configuration.
    pub fn parse_pair(s: &str) -> Option<Self> {
        let (lat, lon) = s.split_once(',')?;
        let lat = lat.trim().parse().ok()?;
        let lon = lon.trim().parse().ok()?;
        Self::new(lat, lon).ok()
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_M * c
    }

    /// Great-circle distance in nautical miles.
    pub fn distance_nm(&self, other: &Coordinate) -> f64 {
        self.distance_to(other) / METRES_PER_NM
    }
}

impl fmt::Debug for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinate({}, {})", self.lat, self.lon)
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = InvalidCoordinate;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lon)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        RawCoordinate {
            lat: c.lat,
            lon: c.lon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(-90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn accepts_boundaries() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn distance_to_self_is_zero() {
        let here = coord(50.0379, 8.5622);
        assert_eq!(here.distance_to(&here), 0.0);
    }

    #[test]
    fn frankfurt_to_munich() {
        // EDDF to EDDM is roughly 300 km
        let eddf = coord(50.0379, 8.5622);
        let eddm = coord(48.3538, 11.7861);
        let km = eddf.distance_to(&eddm) / 1000.0;
        assert!((km - 298.0).abs() < 5.0, "got {km}");
    }

    #[test]
    fn one_degree_of_latitude_is_sixty_nm() {
        let a = coord(0.0, 0.0);
        let b = coord(1.0, 0.0);
        assert!((a.distance_nm(&b) - 60.0).abs() < 0.2);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = coord(47.46, 8.55);
        let b = coord(51.47, -0.45);
        assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-6);
    }

    #[test]
    fn parse_pair() {
        let c = Coordinate::parse_pair("50.03, 8.56").unwrap();
        assert_eq!(c.lat(), 50.03);
        assert_eq!(c.lon(), 8.56);
        assert!(Coordinate::parse_pair("50.03").is_none());
        assert!(Coordinate::parse_pair("95,8").is_none());
        assert!(Coordinate::parse_pair("a,b").is_none());
    }

    #[test]
    fn serde_validates() {
        let c: Coordinate = serde_json::from_str(r#"{"lat":1.5,"lon":2.5}"#).unwrap();
        assert_eq!(c, coord(1.5, 2.5));
        assert!(serde_json::from_str::<Coordinate>(r#"{"lat":91.0,"lon":0.0}"#).is_err());
    }
}
