//! Streaming decoder for the data server's XML feed.
//!
//! The body is consumed as a forward-only sequence of XML events. Each
//! `<METAR>` or `<TAF>` element is gathered into a [`RawElement`] and
//! converted into a record; malformed reports are dropped, everything else
//! in the document is skipped.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::domain::{RecordKind, WeatherRecord};

use super::convert::RawElement;

/// The element cursor could not continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The document is not well-formed XML
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The document ended inside a report element
    #[error("feed ended inside a {element} element")]
    Truncated { element: RecordKind },
}

/// Lazy sequence of records decoded from one response body.
///
/// Yields every valid record in document order. After a [`DecodeError`] the
/// sequence ends; records yielded before it remain usable.
pub struct RecordStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    finished: bool,
    discarded: usize,
}

/// Decode a complete response body.
pub fn decode(body: &[u8]) -> RecordStream<&[u8]> {
    RecordStream::new(body)
}

/// Result of draining a [`RecordStream`].
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<WeatherRecord>,
    /// Report elements dropped as malformed.
    pub discarded: usize,
    /// Set if decoding stopped early.
    pub error: Option<DecodeError>,
}

/// Decode a response body, keeping whatever was readable.
pub fn decode_all(body: &[u8]) -> Decoded {
    let mut stream = decode(body);
    let mut decoded = Decoded::default();

    for item in stream.by_ref() {
        match item {
            Ok(record) => decoded.records.push(record),
            Err(e) => decoded.error = Some(e),
        }
    }

    decoded.discarded = stream.discarded();
    decoded
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::new(),
            finished: false,
            discarded: 0,
        }
    }

    /// Number of report elements dropped as malformed so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn next_event(&mut self) -> Result<Event<'static>, DecodeError> {
        self.buf.clear();
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map(|e| e.into_owned());
        event.map_err(|e| self.xml_error(e))
    }

    fn xml_error(&self, e: impl std::fmt::Display) -> DecodeError {
        DecodeError::Xml {
            position: self.reader.buffer_position() as u64,
            message: e.to_string(),
        }
    }

    /// Gather the direct children of a report element up to its end tag.
    ///
    /// Nested groups (a TAF's `<forecast>` blocks) and attribute-only
    /// children such as `<sky_condition/>` are skipped.
    fn read_element(&mut self, kind: RecordKind) -> Result<RawElement, DecodeError> {
        let mut raw = RawElement::new(kind);
        let mut depth = 0usize;
        let mut field: Option<String> = None;

        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    depth += 1;
                    if depth == 1 {
                        field = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    }
                }
                Event::End(_) => {
                    if depth == 0 {
                        return Ok(raw);
                    }
                    depth -= 1;
                    if depth == 0 {
                        field = None;
                    }
                }
                Event::Text(t) if depth == 1 => {
                    let text = t.unescape().map_err(|e| self.xml_error(e))?;
                    if let Some(name) = &field {
                        raw.push_text(name, &text);
                    }
                }
                Event::CData(c) if depth == 1 => {
                    if let Some(name) = &field {
                        raw.push_text(name, &String::from_utf8_lossy(&c));
                    }
                }
                Event::Eof => return Err(DecodeError::Truncated { element: kind }),
                _ => {}
            }
        }
    }

    /// Read the text of a server diagnostic element such as `<error>`.
    fn read_text(&mut self) -> Result<String, DecodeError> {
        let mut text = String::new();
        let mut depth = 0usize;

        loop {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) if depth == 0 => return Ok(text),
                Event::End(_) => depth -= 1,
                Event::Text(t) => {
                    let part = t.unescape().map_err(|e| self.xml_error(e))?;
                    text.push_str(&part);
                }
                Event::Eof => return Ok(text),
                _ => {}
            }
        }
    }
}

fn report_kind(name: &[u8]) -> Option<RecordKind> {
    match name {
        b"METAR" => Some(RecordKind::Metar),
        b"TAF" => Some(RecordKind::Taf),
        _ => None,
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<WeatherRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let event = match self.next_event() {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            match event {
                Event::Start(e) => {
                    let name = e.name();
                    if let Some(kind) = report_kind(name.as_ref()) {
                        let raw = match self.read_element(kind) {
                            Ok(raw) => raw,
                            Err(e) => {
                                self.finished = true;
                                return Some(Err(e));
                            }
                        };
                        match raw.into_record() {
                            Ok(record) => return Some(Ok(record)),
                            Err(reason) => {
                                self.discarded += 1;
                                debug!(kind = %kind, reason = %reason, "Dropping malformed report");
                            }
                        }
                    } else if matches!(name.as_ref(), b"error" | b"warning") {
                        match self.read_text() {
                            Ok(text) if !text.trim().is_empty() => {
                                warn!(message = %text.trim(), "Weather data server reported a problem");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                self.finished = true;
                                return Some(Err(e));
                            }
                        }
                    }
                }
                Event::Empty(e) => {
                    if let Some(kind) = report_kind(e.name().as_ref()) {
                        self.discarded += 1;
                        debug!(kind = %kind, "Dropping empty report element");
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response xmlns:xsd="http://www.w3.org/2001/XMLSchema" version="1.2">
  <request_index>12345</request_index>
  <data_source name="metars" />
  <request type="retrieve" />
  <errors />
  <warnings />
  <time_taken_ms>7</time_taken_ms>
  <data num_results="2">
    <METAR>
      <raw_text>EDDF 011220Z 24012KT 9999 FEW030 18/09 Q1016</raw_text>
      <station_id>EDDF</station_id>
      <observation_time>2024-06-01T12:20:00Z</observation_time>
      <latitude>50.03</latitude>
      <longitude>8.55</longitude>
      <altim_in_hg>30.00</altim_in_hg>
      <sky_condition sky_cover="FEW" cloud_base_ft_agl="3000" />
      <flight_category>VFR</flight_category>
    </METAR>
    <METAR>
      <raw_text>EDDM 011220Z 07005KT CAVOK 21/08 Q1018</raw_text>
      <station_id>EDDM</station_id>
      <observation_time>2024-06-01T12:20:00Z</observation_time>
      <latitude>48.35</latitude>
      <longitude>11.79</longitude>
      <altim_in_hg>30.06</altim_in_hg>
    </METAR>
  </data>
</response>"#;

    #[test]
    fn decodes_all_reports() {
        let records: Vec<_> = decode(FEED.as_bytes()).collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].station().as_str(), "EDDF");
        assert_eq!(records[1].station().as_str(), "EDDM");
        assert_eq!(
            records[0].raw_text(),
            "EDDF 011220Z 24012KT 9999 FEW030 18/09 Q1016"
        );
    }

    #[test]
    fn malformed_report_is_dropped_silently() {
        let feed = r#"<response><data>
            <METAR>
              <station_id>EDDF</station_id>
              <observation_time>2024-06-01T12:20:00Z</observation_time>
            </METAR>
            <METAR>
              <station_id>EDDM</station_id>
              <observation_time>not a time</observation_time>
            </METAR>
        </data></response>"#;

        let decoded = decode_all(feed.as_bytes());
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.discarded, 1);
        assert!(decoded.error.is_none());
    }

    #[test]
    fn taf_forecast_groups_do_not_leak_into_fields() {
        let feed = r#"<response><data>
            <TAF>
              <raw_text>TAF EDDF 011100Z 0112/0218 24010KT 9999 FEW030</raw_text>
              <station_id>EDDF</station_id>
              <issue_time>2024-06-01T11:00:00Z</issue_time>
              <valid_time_from>2024-06-01T12:00:00Z</valid_time_from>
              <valid_time_to>2024-06-02T18:00:00Z</valid_time_to>
              <forecast>
                <fcst_time_from>2024-06-01T12:00:00Z</fcst_time_from>
                <station_id>XXXX</station_id>
              </forecast>
            </TAF>
        </data></response>"#;

        let records: Vec<_> = decode(feed.as_bytes()).collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RecordKind::Taf);
        assert_eq!(records[0].station().as_str(), "EDDF");
    }

    #[test]
    fn unknown_elements_are_skipped() {
        let feed = r#"<response><PIREP><station_id>EDDF</station_id></PIREP><data/></response>"#;
        let decoded = decode_all(feed.as_bytes());
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.discarded, 0);
        assert!(decoded.error.is_none());
    }

    #[test]
    fn truncated_feed_keeps_earlier_records() {
        let feed = r#"<response><data>
            <METAR>
              <station_id>EDDF</station_id>
              <observation_time>2024-06-01T12:20:00Z</observation_time>
            </METAR>
            <METAR>
              <station_id>EDDM</station_id>"#;

        let mut stream = decode(feed.as_bytes());
        assert!(matches!(stream.next(), Some(Ok(_))));
        assert!(matches!(stream.next(), Some(Err(_))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn mismatched_tags_are_corrupt() {
        let feed = r#"<response><data><METAR><station_id>EDDF</raw_text></METAR></data></response>"#;
        let decoded = decode_all(feed.as_bytes());
        assert!(decoded.records.is_empty());
        assert!(matches!(decoded.error, Some(DecodeError::Xml { .. })));
    }

    #[test]
    fn empty_report_element_counts_as_discarded() {
        let decoded = decode_all(b"<response><data><METAR/></data></response>");
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.discarded, 1);
    }

    #[test]
    fn escaped_text_is_unescaped() {
        let feed = r#"<response><data><METAR>
            <raw_text>EDDF 011220Z RMK A&amp;B</raw_text>
            <station_id>EDDF</station_id>
            <observation_time>2024-06-01T12:20:00Z</observation_time>
        </METAR></data></response>"#;
        let records: Vec<_> = decode(feed.as_bytes()).collect::<Result<_, _>>().unwrap();
        assert_eq!(records[0].raw_text(), "EDDF 011220Z RMK A&B");
    }

    #[test]
    fn server_errors_do_not_stop_decoding() {
        let feed = r#"<response><errors><error>Invalid station string</error></errors>
            <data num_results="0"></data></response>"#;
        let decoded = decode_all(feed.as_bytes());
        assert!(decoded.records.is_empty());
        assert!(decoded.error.is_none());
    }
}
