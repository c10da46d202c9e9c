//! Aviation Weather Center data server ("ADDS") client and feed decoder.
//!
//! The data server answers `requestType=retrieve&format=xml` queries with an
//! XML document holding one `<METAR>` or `<TAF>` element per report.
//!
//! Key characteristics of the feed:
//! - Each report element carries its fields as direct child elements
//!   (`station_id`, `observation_time`, `altim_in_hg`, ...)
//! - Individual reports are frequently incomplete; those are dropped during
//!   decoding rather than failing the response
//! - Times are RFC 3339 in UTC

mod client;
mod convert;
mod decode;
mod error;
mod mock;
mod query;

pub use client::{AddsClient, AddsConfig, WeatherSource};
pub use convert::{MalformedRecord, RawElement};
pub use decode::{DecodeError, Decoded, RecordStream, decode, decode_all};
pub use error::FetchError;
pub use mock::MockWeatherSource;
pub use query::{AreaKind, QueryArea, QuerySpec};
