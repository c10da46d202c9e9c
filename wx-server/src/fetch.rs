//! Fan-out/fan-in over the data server queries of one update cycle.
//!
//! A cycle spawns one task that issues every query concurrently and sends a
//! single [`CycleReport`] once all of them have settled. Reports carry the
//! generation of the cycle that produced them; anything that does not match
//! the active cycle is dropped.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adds::{FetchError, QueryArea, QuerySpec, WeatherSource};
use crate::domain::{Coordinate, RecordKind};

/// Result of one query.
#[derive(Debug)]
pub struct QueryOutcome {
    pub query: QuerySpec,
    pub result: Result<Bytes, FetchError>,
}

/// Everything a cycle fetched, sent once all requests have settled.
#[derive(Debug)]
pub struct CycleReport {
    pub generation: u64,
    pub outcomes: Vec<QueryOutcome>,
}

/// A cycle whose report has been accepted.
pub type CompletedCycle = CycleReport;

#[derive(Debug)]
pub enum CycleStart {
    /// Nothing to fetch; the cycle is already over.
    Completed(CompletedCycle),
    /// Requests are in flight; a report with this generation will follow.
    Pending { generation: u64 },
    /// Another cycle is still running.
    AlreadyActive { generation: u64 },
}

/// Build the queries for the current inputs, at most four: METAR and TAF
/// around the position, then METAR and TAF along the route.
pub fn build_queries(
    position: Option<Coordinate>,
    route: &[Coordinate],
    radius_sm: u32,
    corridor_sm: u32,
) -> Vec<QuerySpec> {
    let mut areas = Vec::with_capacity(2);
    if let Some(center) = position {
        areas.push(QueryArea::Radial { center, radius_sm });
    }
    if !route.is_empty() {
        areas.push(QueryArea::FlightPath {
            corridor_sm,
            waypoints: route.to_vec(),
        });
    }

    areas
        .into_iter()
        .flat_map(|area| {
            [
                QuerySpec::new(RecordKind::Metar, area.clone()),
                QuerySpec::new(RecordKind::Taf, area),
            ]
        })
        .collect()
}

/// Issue every query concurrently and wait for all of them.
pub async fn fan_out<S: WeatherSource>(source: &S, queries: Vec<QuerySpec>) -> Vec<QueryOutcome> {
    let futures: Vec<_> = queries
        .into_iter()
        .map(|query| async move {
            let result = source.fetch(&query).await;
            QueryOutcome { query, result }
        })
        .collect();

    join_all(futures).await
}

pub struct FetchOrchestrator<S> {
    source: Arc<S>,
    reports: mpsc::Sender<CycleReport>,
    active: Option<u64>,
    last_generation: u64,
}

impl<S: WeatherSource> FetchOrchestrator<S> {
    /// Create an orchestrator and the channel its reports arrive on.
    pub fn new(source: Arc<S>) -> (Self, mpsc::Receiver<CycleReport>) {
        let (tx, rx) = mpsc::channel(4);
        let orchestrator = Self {
            source,
            reports: tx,
            active: None,
            last_generation: 0,
        };
        (orchestrator, rx)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Start a cycle over `queries`.
    pub fn start_cycle(&mut self, queries: Vec<QuerySpec>) -> CycleStart {
        if let Some(generation) = self.active {
            return CycleStart::AlreadyActive { generation };
        }

        self.last_generation += 1;
        let generation = self.last_generation;

        if queries.is_empty() {
            debug!(generation, "no queries, cycle complete");
            return CycleStart::Completed(CycleReport {
                generation,
                outcomes: Vec::new(),
            });
        }

        debug!(generation, queries = queries.len(), "starting fetch cycle");
        self.active = Some(generation);

        let source = Arc::clone(&self.source);
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let outcomes = fan_out(source.as_ref(), queries).await;
            let report = CycleReport {
                generation,
                outcomes,
            };
            if reports.send(report).await.is_err() {
                debug!(generation, "engine gone, dropping cycle report");
            }
        });

        CycleStart::Pending { generation }
    }

    /// Accept a report if it belongs to the active cycle.
    pub fn complete(&mut self, report: CycleReport) -> Option<CompletedCycle> {
        if self.active != Some(report.generation) {
            warn!(
                generation = report.generation,
                active = ?self.active,
                "ignoring report from stale cycle"
            );
            return None;
        }

        self.active = None;
        Some(report)
    }
}
