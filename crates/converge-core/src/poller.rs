//! Bounded polling of asynchronous remote operations
//!
//! Some remote mutations are accepted immediately but only take effect once
//! a backend process finishes (a repository onboard reports `Syncing` until
//! it becomes `Connected`). [`await_convergence`] repeatedly probes the
//! remote status on a fixed interval until a terminal status is observed,
//! the time budget runs out, the probe keeps failing, or the caller cancels.
//!
//! ```text
//!            ┌──────────── in progress / probe error ───────────┐
//!            ▼                                                  │
//!        ┌────────┐  probe   ┌──────────┐   sleep(interval)     │
//!  ───▶  │Pending │ ───────▶ │ classify │ ──────────────────────┘
//!        └────────┘          └────┬─────┘
//!                                 │ success / failure / elapsed >= timeout /
//!                                 │ N consecutive probe errors / cancelled
//!                                 ▼
//!     Succeeded | Failed | TimedOut | ProbeUnavailable | Cancelled
//! ```

use crate::error::ConvergenceError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_PROBE_ERRORS: u32 = 3;

/// Source of time for the poll loop
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Timing budget for one awaited operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between the end of one probe and the start of the next
    pub interval: Duration,

    /// Total budget measured from the operation's start
    pub timeout: Duration,

    /// Consecutive probe errors tolerated before giving up
    pub max_probe_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_probe_errors: DEFAULT_MAX_PROBE_ERRORS,
        }
    }
}

impl PollSettings {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_probe_errors(mut self, max: u32) -> Self {
        self.max_probe_errors = max.max(1);
        self
    }
}

/// How a single observed status is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InProgress,
    Succeeded,
    Failed,
    /// Not listed in any of the caller's sets; treated as in progress
    Unrecognized,
}

/// Caller-supplied partition of a remote status space
#[derive(Debug, Clone)]
pub struct TerminalStates<S> {
    succeeded: HashSet<S>,
    failed: HashSet<S>,
    in_progress: HashSet<S>,
}

impl<S: Eq + Hash> TerminalStates<S> {
    pub fn new() -> Self {
        Self {
            succeeded: HashSet::new(),
            failed: HashSet::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn succeeded(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.succeeded.extend(statuses);
        self
    }

    pub fn failed(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.failed.extend(statuses);
        self
    }

    pub fn in_progress(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.in_progress.extend(statuses);
        self
    }

    pub fn classify(&self, status: &S) -> Phase {
        if self.succeeded.contains(status) {
            Phase::Succeeded
        } else if self.failed.contains(status) {
            Phase::Failed
        } else if self.in_progress.contains(status) {
            Phase::InProgress
        } else {
            Phase::Unrecognized
        }
    }
}

impl<S: Eq + Hash> Default for TerminalStates<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight asynchronous remote mutation
pub struct PollableOperation<S, F> {
    /// Name used in logs and errors
    pub name: String,
    /// When the triggering mutation was accepted; defaults to the first poll
    pub start: Option<Instant>,
    pub settings: PollSettings,
    pub states: TerminalStates<S>,
    probe: F,
}

impl<S, F> PollableOperation<S, F> {
    pub fn new(name: impl Into<String>, states: TerminalStates<S>, probe: F) -> Self {
        Self {
            name: name.into(),
            start: None,
            settings: PollSettings::default(),
            states,
            probe,
        }
    }

    pub fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn started_at(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }
}

/// Lifecycle of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Succeeded,
    Failed,
    TimedOut,
    ProbeUnavailable,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Pending)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Pending => write!(f, "pending"),
            PollState::Succeeded => write!(f, "succeeded"),
            PollState::Failed => write!(f, "failed"),
            PollState::TimedOut => write!(f, "timed-out"),
            PollState::ProbeUnavailable => write!(f, "probe-unavailable"),
            PollState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Next move of the poll loop after one probe
#[derive(Debug, PartialEq)]
pub enum Step<S> {
    Wait(Duration),
    Done(Result<S, ConvergenceError>),
}

/// Clock-free state machine behind [`await_convergence`]
///
/// Feed it each probe outcome together with the elapsed time since start;
/// it decides whether to wait again or stop.
#[derive(Debug)]
pub struct Tracker {
    operation: String,
    settings: PollSettings,
    state: PollState,
    probes: u32,
    consecutive_errors: u32,
    last_status: Option<String>,
}

impl Tracker {
    pub fn new(operation: impl Into<String>, settings: PollSettings) -> Self {
        Self {
            operation: operation.into(),
            settings,
            state: PollState::Pending,
            probes: 0,
            consecutive_errors: 0,
            last_status: None,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn probes(&self) -> u32 {
        self.probes
    }

    pub fn observe<S, E>(
        &mut self,
        states: &TerminalStates<S>,
        outcome: Result<S, E>,
        elapsed: Duration,
    ) -> Step<S>
    where
        S: Eq + Hash + fmt::Display,
        E: fmt::Display,
    {
        debug_assert!(!self.state.is_terminal(), "probe observed after terminal state");
        self.probes += 1;

        match outcome {
            Ok(status) => {
                self.consecutive_errors = 0;
                match states.classify(&status) {
                    Phase::Succeeded => {
                        self.state = PollState::Succeeded;
                        info!(
                            operation = %self.operation,
                            status = %status,
                            probes = self.probes,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Operation converged"
                        );
                        return Step::Done(Ok(status));
                    }
                    Phase::Failed => {
                        self.state = PollState::Failed;
                        return Step::Done(Err(ConvergenceError::Failed {
                            operation: self.operation.clone(),
                            status: status.to_string(),
                        }));
                    }
                    Phase::InProgress => {
                        debug!(operation = %self.operation, status = %status, "Still in progress");
                    }
                    Phase::Unrecognized => {
                        warn!(
                            operation = %self.operation,
                            status = %status,
                            "Unrecognized status, treating as in progress"
                        );
                    }
                }
                self.last_status = Some(status.to_string());
            }
            Err(e) => {
                self.consecutive_errors += 1;
                warn!(
                    operation = %self.operation,
                    attempt = self.consecutive_errors,
                    error = %e,
                    "Status probe failed"
                );
                if self.consecutive_errors >= self.settings.max_probe_errors {
                    self.state = PollState::ProbeUnavailable;
                    return Step::Done(Err(ConvergenceError::ProbeUnavailable {
                        operation: self.operation.clone(),
                        attempts: self.consecutive_errors,
                        last_error: e.to_string(),
                    }));
                }
            }
        }

        if elapsed >= self.settings.timeout {
            self.state = PollState::TimedOut;
            return Step::Done(Err(ConvergenceError::TimedOut {
                operation: self.operation.clone(),
                timeout: self.settings.timeout,
                last_status: self.last_status.clone(),
            }));
        }

        // Never sleep past the deadline; one last probe runs exactly at it
        let remaining = self.settings.timeout - elapsed;
        Step::Wait(self.settings.interval.min(remaining))
    }

    /// The deadline passed while a probe was still outstanding
    fn expire_in_flight(&mut self, waited: Duration) -> ConvergenceError {
        self.state = PollState::TimedOut;
        warn!(
            operation = %self.operation,
            waited_ms = waited.as_millis() as u64,
            "Status probe still outstanding at deadline, giving up"
        );
        ConvergenceError::TimedOut {
            operation: self.operation.clone(),
            timeout: self.settings.timeout,
            last_status: self.last_status.clone(),
        }
    }

    fn cancel(&mut self) -> ConvergenceError {
        self.state = PollState::Cancelled;
        info!(operation = %self.operation, probes = self.probes, "Wait cancelled");
        ConvergenceError::Cancelled {
            operation: self.operation.clone(),
        }
    }
}

/// Await an operation on the tokio clock
pub async fn await_convergence<S, F, Fut, E>(
    op: PollableOperation<S, F>,
    cancel: &CancellationToken,
) -> Result<S, ConvergenceError>
where
    S: Eq + Hash + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
    E: fmt::Display,
{
    await_convergence_with(&TokioClock, op, cancel).await
}

/// Await an operation using the given clock
///
/// Probes run strictly one after another. Cancellation is honoured before
/// every probe, while a probe is in flight, and while sleeping. An in-flight
/// probe is abandoned once the deadline (or, for the final probe, one more
/// interval) has passed, so the whole wait ends within `timeout + interval`.
pub async fn await_convergence_with<C, S, F, Fut, E>(
    clock: &C,
    mut op: PollableOperation<S, F>,
    cancel: &CancellationToken,
) -> Result<S, ConvergenceError>
where
    C: Clock + ?Sized,
    S: Eq + Hash + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
    E: fmt::Display,
{
    let start = op.start.unwrap_or_else(|| clock.now());
    let mut tracker = Tracker::new(op.name.clone(), op.settings.clone());

    debug!(
        operation = %op.name,
        interval_ms = op.settings.interval.as_millis() as u64,
        timeout_ms = op.settings.timeout.as_millis() as u64,
        "Awaiting convergence"
    );

    loop {
        if cancel.is_cancelled() {
            return Err(tracker.cancel());
        }

        // A status check may overrun the deadline by at most one interval
        let elapsed = clock.now().saturating_duration_since(start);
        let budget = op
            .settings
            .timeout
            .saturating_sub(elapsed)
            .max(op.settings.interval);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(tracker.cancel()),
            outcome = (op.probe)() => outcome,
            _ = clock.sleep(budget) => return Err(tracker.expire_in_flight(budget)),
        };

        let elapsed = clock.now().saturating_duration_since(start);
        match tracker.observe(&op.states, outcome, elapsed) {
            Step::Done(result) => return result,
            Step::Wait(delay) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(tracker.cancel()),
                    _ = clock.sleep(delay) => {}
                }
            }
        }
    }
}
