//! Mock weather source for testing without network access.
//!
//! Serves canned XML bodies (or injected failures) per record kind and area
//! kind, and records every query it receives.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::domain::RecordKind;

use super::client::WeatherSource;
use super::error::FetchError;
use super::query::{AreaKind, QuerySpec};

/// Body served when nothing was configured for a query.
const EMPTY_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response version="1.2"><data num_results="0"></data></response>"#;

#[derive(Debug, Clone)]
enum MockResponse {
    Body(Bytes),
    Failure(String),
}

struct MockInner {
    responses: Mutex<HashMap<(RecordKind, AreaKind), MockResponse>>,
    received: Mutex<Vec<QuerySpec>>,
    request_count: AtomicUsize,
    /// Requests wait on this until it is closed.
    gate: Semaphore,
}

/// Mock weather source.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Clone)]
pub struct MockWeatherSource {
    inner: Arc<MockInner>,
}

impl MockWeatherSource {
    /// A source that answers every query immediately with an empty feed.
    pub fn new() -> Self {
        let gate = Semaphore::new(0);
        gate.close();
        Self::with_gate(gate)
    }

    /// A source whose requests stay pending until [`release`](Self::release)
    /// is called.
    pub fn held() -> Self {
        Self::with_gate(Semaphore::new(0))
    }

    fn with_gate(gate: Semaphore) -> Self {
        Self {
            inner: Arc::new(MockInner {
                responses: Mutex::new(HashMap::new()),
                received: Mutex::new(Vec::new()),
                request_count: AtomicUsize::new(0),
                gate,
            }),
        }
    }

    /// Load `metars.xml` and `tafs.xml` from a directory; each file answers
    /// both radial and flight-path queries of its kind.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> Result<Self, FetchError> {
        let data_dir = data_dir.as_ref();
        let source = Self::new();
        let mut loaded = 0;

        for kind in [RecordKind::Metar, RecordKind::Taf] {
            let path = data_dir.join(format!("{}.xml", kind.data_source()));
            if !path.is_file() {
                continue;
            }
            let body = std::fs::read(&path).map_err(|e| {
                FetchError::Mock(format!("failed to read {}: {}", path.display(), e))
            })?;
            let body = Bytes::from(body);
            source.set(kind, AreaKind::Radial, MockResponse::Body(body.clone()));
            source.set(kind, AreaKind::FlightPath, MockResponse::Body(body));
            loaded += 1;
        }

        if loaded == 0 {
            return Err(FetchError::Mock(format!(
                "no mock feed files found in {}",
                data_dir.display()
            )));
        }

        Ok(source)
    }

    /// Serve `body` for queries of this kind and area.
    pub fn with_body(self, kind: RecordKind, area: AreaKind, body: impl Into<Bytes>) -> Self {
        self.set(kind, area, MockResponse::Body(body.into()));
        self
    }

    /// Fail queries of this kind and area.
    pub fn with_failure(self, kind: RecordKind, area: AreaKind, message: impl Into<String>) -> Self {
        self.set(kind, area, MockResponse::Failure(message.into()));
        self
    }

    fn set(&self, kind: RecordKind, area: AreaKind, response: MockResponse) {
        if let Ok(mut responses) = self.inner.responses.lock() {
            responses.insert((kind, area), response);
        }
    }

    /// Let all pending and future requests complete.
    pub fn release(&self) {
        self.inner.gate.close();
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.inner.request_count.load(Ordering::SeqCst)
    }

    /// Queries received so far, in arrival order.
    pub fn received(&self) -> Vec<QuerySpec> {
        self.inner
            .received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn response_for(&self, query: &QuerySpec) -> Option<MockResponse> {
        let responses = self.inner.responses.lock().ok()?;
        responses.get(&(query.kind, query.area.kind())).cloned()
    }
}

impl Default for MockWeatherSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherSource for MockWeatherSource {
    async fn fetch(&self, query: &QuerySpec) -> Result<Bytes, FetchError> {
        self.inner.request_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut received) = self.inner.received.lock() {
            received.push(query.clone());
        }

        // Closed gate: acquire fails immediately and the request proceeds.
        let _ = self.inner.gate.acquire().await;

        match self.response_for(query) {
            Some(MockResponse::Body(body)) => Ok(body),
            Some(MockResponse::Failure(message)) => Err(FetchError::Mock(message)),
            None => Ok(Bytes::from_static(EMPTY_RESPONSE.as_bytes())),
        }
    }
}
