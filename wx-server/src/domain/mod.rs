//! Domain types for the weather engine.
//!
//! Station codes and coordinates are valid by construction: their only
//! constructors are fallible. Weather records are plain data; the feed
//! decoder only builds one once its station code and timestamps have parsed.

mod coordinate;
mod record;
mod station;

pub use coordinate::{Coordinate, InvalidCoordinate, METRES_PER_NM};
pub use record::{FlightCategory, Metar, RecordKind, Taf, WeatherRecord, Wind};
pub use station::{IcaoCode, InvalidIcao};
