//! The engine: single owner of the registry, scheduler and orchestrator.
//!
//! All mutation happens on one task running [`Engine::run`]. Everyone else
//! talks to it through an [`EngineHandle`]: commands go in over an mpsc
//! channel, the current [`WeatherView`] comes out over a watch channel and
//! change notifications over the broadcast bus.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, warn};

use crate::adds::{WeatherSource, decode_all};
use crate::config::{EngineConfig, InitialInputs};
use crate::domain::Coordinate;
use crate::events::{self, EngineEvent};
use crate::fetch::{CompletedCycle, CycleReport, CycleStart, FetchOrchestrator, build_queries};
use crate::query::QueryService;
use crate::registry::{PersistError, SnapshotFile, Station, StationRegistry};
use crate::scheduler::{SchedulerStatus, UpdateDecision, UpdateMode, UpdateScheduler};

/// Capacity of the command channel.
const COMMAND_CAPACITY: usize = 32;

/// UTC time that advances with the runtime clock, so report expiry and the
/// engine's timers share one notion of elapsed time.
#[derive(Debug, Clone, Copy)]
struct WallClock {
    anchor_utc: DateTime<Utc>,
    anchor: Instant,
}

impl WallClock {
    fn new() -> Self {
        Self {
            anchor_utc: Utc::now(),
            anchor: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.anchor.elapsed())
            .ok()
            .and_then(|elapsed| self.anchor_utc.checked_add_signed(elapsed))
            .unwrap_or_else(Utc::now)
    }
}

/// Immutable view published after every change.
#[derive(Debug, Clone)]
pub struct WeatherView {
    pub stations: Vec<Station>,
    /// Last valid position, the reference for proximity queries.
    pub position: Option<Coordinate>,
    pub route: Vec<Coordinate>,
    pub consent: bool,
    /// Mode of the running cycle, if any.
    pub mode: Option<UpdateMode>,
    pub next_update: Instant,
    pub revision: u64,
}

impl WeatherView {
    pub fn query(&self) -> QueryService<'_> {
        QueryService::new(&self.stations, self.position)
    }

    pub fn status(&self, now: Instant) -> SchedulerStatus {
        SchedulerStatus {
            fetching: self.mode.is_some(),
            mode: self.mode,
            next_update_in_secs: self.next_update.saturating_duration_since(now).as_secs(),
        }
    }
}

#[derive(Debug)]
pub enum EngineCommand {
    RequestUpdate(UpdateMode),
    /// A new position fix. Invalid fixes are passed as `None` and keep the
    /// last valid position.
    SetPosition(Option<Coordinate>),
    SetRoute(Vec<Coordinate>),
    SetConsent(bool),
    /// Write the snapshot; replies with the number of records saved, or
    /// `None` if no snapshot path is configured.
    Save(oneshot::Sender<Result<Option<usize>, PersistError>>),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine is not running")]
    Closed,

    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub struct Engine<S: WeatherSource> {
    config: EngineConfig,
    registry: StationRegistry,
    scheduler: UpdateScheduler,
    orchestrator: FetchOrchestrator<S>,
    reports: mpsc::Receiver<CycleReport>,
    inputs: InitialInputs,
    snapshot: Option<SnapshotFile>,
    events: broadcast::Sender<EngineEvent>,
    view: watch::Sender<Arc<WeatherView>>,
    published_revision: u64,
    clock: WallClock,
}

impl<S: WeatherSource> Engine<S> {
    pub fn new(source: Arc<S>, config: EngineConfig, inputs: InitialInputs) -> Self {
        let scheduler = UpdateScheduler::new(config.warmup, config.update_interval, Instant::now());
        let (orchestrator, reports) = FetchOrchestrator::new(source);
        let (events, _) = events::channel();
        let snapshot = config.snapshot_path.clone().map(SnapshotFile::new);
        let registry = StationRegistry::new();

        let view = WeatherView {
            stations: Vec::new(),
            position: inputs.position,
            route: inputs.route.clone(),
            consent: inputs.consent,
            mode: None,
            next_update: scheduler.next_update(),
            revision: registry.revision(),
        };
        let (view, _) = watch::channel(Arc::new(view));

        Self {
            config,
            registry,
            scheduler,
            orchestrator,
            reports,
            inputs,
            snapshot,
            events,
            view,
            published_revision: 0,
            clock: WallClock::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<WeatherView>> {
        self.view.subscribe()
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn is_fetching(&self) -> bool {
        self.orchestrator.is_active()
    }

    /// Ask for an update in `mode`.
    pub fn request_update(&mut self, mode: UpdateMode) -> UpdateDecision {
        let decision = self
            .scheduler
            .request_update(mode, Instant::now(), self.inputs.consent);

        match decision {
            UpdateDecision::Start(mode) => {
                self.emit(EngineEvent::CycleStarted { mode });
                let queries = build_queries(
                    self.inputs.position,
                    &self.inputs.route,
                    self.config.radial_distance_sm,
                    self.config.corridor_sm,
                );
                match self.orchestrator.start_cycle(queries) {
                    CycleStart::Completed(cycle) => self.finish_cycle(cycle),
                    CycleStart::Pending { generation } => {
                        debug!(generation, %mode, "fetch cycle pending");
                    }
                    CycleStart::AlreadyActive { generation } => {
                        warn!(generation, "previous cycle still in flight");
                    }
                }
            }
            UpdateDecision::ModeUpgraded(mode) => {
                debug!(%mode, "running cycle changed mode");
                self.emit(EngineEvent::ModeChanged { mode });
            }
            UpdateDecision::AlreadyFetching | UpdateDecision::Skipped(_) => {}
        }

        self.publish();
        decision
    }

    /// Process a cycle report, ignoring it if it is stale.
    pub fn handle_report(&mut self, report: CycleReport) {
        if let Some(cycle) = self.orchestrator.complete(report) {
            self.finish_cycle(cycle);
        }
    }

    /// Wait for the running cycle's report and process it. Returns `false`
    /// if no cycle is running.
    pub async fn await_cycle(&mut self) -> bool {
        while self.orchestrator.is_active() {
            match self.reports.recv().await {
                Some(report) => self.handle_report(report),
                None => return false,
            }
        }
        true
    }

    fn finish_cycle(&mut self, cycle: CompletedCycle) {
        let mut decoded = 0;
        for outcome in cycle.outcomes {
            match outcome.result {
                Ok(body) => {
                    let result = decode_all(&body);
                    if let Some(e) = &result.error {
                        warn!(query = %outcome.query, error = %e, "response decoded partially");
                    }
                    debug!(
                        query = %outcome.query,
                        records = result.records.len(),
                        discarded = result.discarded,
                        "decoded response"
                    );
                    decoded += self.registry.extend(result.records);
                }
                Err(e) => {
                    warn!(query = %outcome.query, error = %e, "request failed");
                    self.emit(EngineEvent::request_failed(&outcome.query, &e));
                }
            }
        }

        let mode = self.scheduler.finish().unwrap_or(UpdateMode::Background);
        info!(
            generation = cycle.generation,
            %mode,
            decoded,
            stations = self.registry.len(),
            "fetch cycle complete"
        );
        // Observers of the completion must already see the new view.
        self.publish();
        self.emit(EngineEvent::CycleCompleted { mode, decoded });
    }

    /// Drop expired reports. Returns whether the registry changed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> bool {
        let changed = self.registry.sweep_expired(now);
        if changed {
            debug!(stations = self.registry.len(), "expired reports removed");
            self.publish();
        }
        changed
    }

    pub fn set_position(&mut self, position: Option<Coordinate>) {
        match position {
            Some(position) => {
                self.inputs.position = Some(position);
                self.publish();
            }
            None => debug!("invalid position fix, keeping last valid position"),
        }
    }

    pub fn set_route(&mut self, route: Vec<Coordinate>) {
        self.inputs.route = route;
        self.publish();
    }

    /// Accepting the terms triggers a background update right away.
    pub fn set_consent(&mut self, consent: bool) {
        let granted = consent && !self.inputs.consent;
        self.inputs.consent = consent;
        if granted {
            self.request_update(UpdateMode::Background);
        } else {
            self.publish();
        }
    }

    /// Load the configured snapshot, then drop whatever has expired since.
    /// Returns the number of records loaded.
    pub fn load_snapshot(&mut self, now: DateTime<Utc>) -> Result<usize, PersistError> {
        let Some(file) = &self.snapshot else {
            return Ok(0);
        };
        let Some(records) = file.load()? else {
            debug!(path = %file.path().display(), "no snapshot yet");
            return Ok(0);
        };

        let loaded = self.registry.extend(records);
        self.registry.sweep_expired(now);
        info!(
            path = %file.path().display(),
            loaded,
            stations = self.registry.len(),
            "snapshot loaded"
        );
        self.publish();
        Ok(loaded)
    }

    /// Save the registry to the configured snapshot, if any.
    pub fn save_snapshot(&self) -> Result<Option<usize>, PersistError> {
        let Some(file) = &self.snapshot else {
            return Ok(None);
        };
        let records = self.registry.records();
        file.save(&records)?;
        info!(path = %file.path().display(), records = records.len(), "snapshot saved");
        Ok(Some(records.len()))
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::RequestUpdate(mode) => {
                self.request_update(mode);
            }
            EngineCommand::SetPosition(position) => self.set_position(position),
            EngineCommand::SetRoute(route) => self.set_route(route),
            EngineCommand::SetConsent(consent) => self.set_consent(consent),
            EngineCommand::Save(reply) => {
                let _ = reply.send(self.save_snapshot());
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Republish the view, announcing registry changes once per batch.
    fn publish(&mut self) {
        let revision = self.registry.revision();
        if revision != self.published_revision {
            self.published_revision = revision;
            self.emit(EngineEvent::RegistryChanged { revision });
        }

        let view = WeatherView {
            stations: self.registry.snapshot(),
            position: self.inputs.position,
            route: self.inputs.route.clone(),
            consent: self.inputs.consent,
            mode: self.scheduler.mode(),
            next_update: self.scheduler.next_update(),
            revision,
        };
        self.view.send_replace(Arc::new(view));
    }

    /// Run until every handle is dropped, then save the snapshot.
    pub async fn run(mut self, mut commands: mpsc::Receiver<EngineCommand>) {
        if let Err(e) = self.load_snapshot(self.clock.now()) {
            warn!(error = %e, "failed to load snapshot");
        }

        let period = self.config.sweep_interval;
        let mut sweep = interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next_update = self.scheduler.next_update();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(report) = self.reports.recv() => self.handle_report(report),
                _ = sleep_until(next_update) => {
                    self.request_update(UpdateMode::Background);
                }
                _ = sweep.tick() => {
                    self.sweep_expired(self.clock.now());
                }
            }
        }

        debug!("all handles dropped, engine stopping");
        if let Err(e) = self.save_snapshot() {
            warn!(error = %e, "failed to save snapshot");
        }
    }

    /// Spawn [`Engine::run`] and return a handle to it.
    pub fn spawn(self) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = EngineHandle {
            commands: tx,
            view: self.watch(),
            events: self.events.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    view: watch::Receiver<Arc<WeatherView>>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    /// The most recently published view.
    pub fn view(&self) -> Arc<WeatherView> {
        Arc::clone(&self.view.borrow())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands.send(command).await.map_err(|_| EngineError::Closed)
    }

    pub async fn request_update(&self, mode: UpdateMode) -> Result<(), EngineError> {
        self.send(EngineCommand::RequestUpdate(mode)).await
    }

    pub async fn set_position(&self, position: Option<Coordinate>) -> Result<(), EngineError> {
        self.send(EngineCommand::SetPosition(position)).await
    }

    pub async fn set_route(&self, route: Vec<Coordinate>) -> Result<(), EngineError> {
        self.send(EngineCommand::SetRoute(route)).await
    }

    pub async fn set_consent(&self, consent: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetConsent(consent)).await
    }

    pub async fn save(&self) -> Result<Option<usize>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Save(tx)).await?;
        let saved = rx.await.map_err(|_| EngineError::Closed)??;
        Ok(saved)
    }
}
