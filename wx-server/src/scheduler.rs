//! When to fetch, and in which mode.
//!
//! The scheduler is a small state machine: `Idle` or `Fetching(mode)`. It
//! owns the periodic deadline but no timers of its own; the engine sleeps
//! until [`UpdateScheduler::next_update`] and calls back in.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Who asked for an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Explicit user request; shown as such while it runs.
    Foreground,
    /// Periodic refresh.
    Background,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Foreground => write!(f, "foreground"),
            UpdateMode::Background => write!(f, "background"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching(UpdateMode),
}

/// Why an update request did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user has not accepted the data provider's terms.
    NoConsent,
}

/// What the engine should do after [`UpdateScheduler::request_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    Skipped(SkipReason),
    /// Start a new cycle in this mode.
    Start(UpdateMode),
    /// A cycle is running; its mode changed to this.
    ModeUpgraded(UpdateMode),
    /// A cycle is running; nothing changed.
    AlreadyFetching,
}

/// Snapshot of scheduler state for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub fetching: bool,
    pub mode: Option<UpdateMode>,
    pub next_update_in_secs: u64,
}

#[derive(Debug)]
pub struct UpdateScheduler {
    state: SchedulerState,
    interval: Duration,
    next_update: Instant,
}

impl UpdateScheduler {
    /// The first deadline is `now + warmup`; later ones `interval` apart.
    pub fn new(warmup: Duration, interval: Duration, now: Instant) -> Self {
        Self {
            state: SchedulerState::Idle,
            interval,
            next_update: now + warmup,
        }
    }

    /// Ask for an update. The periodic deadline is rearmed on every call.
    pub fn request_update(&mut self, mode: UpdateMode, now: Instant, consent: bool) -> UpdateDecision {
        self.next_update = now + self.interval;

        if !consent {
            debug!(%mode, "update skipped, terms not accepted");
            return UpdateDecision::Skipped(SkipReason::NoConsent);
        }

        match self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::Fetching(mode);
                UpdateDecision::Start(mode)
            }
            SchedulerState::Fetching(UpdateMode::Background) if mode == UpdateMode::Foreground => {
                self.state = SchedulerState::Fetching(UpdateMode::Foreground);
                UpdateDecision::ModeUpgraded(UpdateMode::Foreground)
            }
            SchedulerState::Fetching(_) => UpdateDecision::AlreadyFetching,
        }
    }

    /// Mark the running cycle as finished. Returns its final mode.
    pub fn finish(&mut self) -> Option<UpdateMode> {
        match std::mem::replace(&mut self.state, SchedulerState::Idle) {
            SchedulerState::Fetching(mode) => Some(mode),
            SchedulerState::Idle => None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn mode(&self) -> Option<UpdateMode> {
        match self.state {
            SchedulerState::Fetching(mode) => Some(mode),
            SchedulerState::Idle => None,
        }
    }

    pub fn next_update(&self) -> Instant {
        self.next_update
    }

    pub fn status(&self, now: Instant) -> SchedulerStatus {
        SchedulerStatus {
            fetching: self.mode().is_some(),
            mode: self.mode(),
            next_update_in_secs: self.next_update.saturating_duration_since(now).as_secs(),
        }
    }
}
