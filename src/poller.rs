//! Status polling for dispatched workflow runs.
//!
//! The poller waits a settling delay after dispatch, then repeatedly fetches
//! the most recent run of the workflow until it completes, the attempt limit
//! is reached, or the wall-clock deadline passes. Runs created before the
//! dispatch (minus a clock-skew allowance) belong to an earlier request and
//! are treated as if no run had registered yet.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::api::{ApiError, RunConclusion, RunStatus, WorkflowApi, WorkflowRun};
use crate::credential::{Credential, CredentialError, CredentialProvider, forget_if_unauthorized};
use crate::dispatch::DispatchReceipt;
use crate::status::{PollUpdate, StatusEvent, StatusObserver};

/// Default delay between dispatch and the first poll.
pub const DEFAULT_SETTLING_DELAY: Duration = Duration::from_secs(5);
/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default maximum number of polls per cycle.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 90;
/// Default wall-clock limit for a poll cycle.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1_800);
/// Default tolerance between local and remote clocks.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(5);

/// Classification of the latest run after one poll tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollState {
    /// No run associated with the dispatch exists yet.
    NoRunFound,
    /// The run is waiting for a runner.
    Queued,
    /// The run is executing.
    InProgress,
    /// The run completed with a success conclusion.
    CompletedSuccess,
    /// The run completed with any other conclusion.
    CompletedFailure,
}

impl PollState {
    /// Classifies a run by its status and conclusion.
    #[must_use]
    pub fn of(run: &WorkflowRun) -> Self {
        match run.status {
            RunStatus::Queued | RunStatus::Pending => Self::Queued,
            RunStatus::InProgress => Self::InProgress,
            RunStatus::Completed if run.conclusion == Some(RunConclusion::Success) => {
                Self::CompletedSuccess
            }
            RunStatus::Completed => Self::CompletedFailure,
        }
    }

    /// Returns true for states that end a poll cycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CompletedSuccess | Self::CompletedFailure)
    }
}

/// Timing bounds for a poll cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSettings {
    /// Delay between dispatch and the first poll.
    pub settling_delay: Duration,
    /// Delay between consecutive polls.
    pub interval: Duration,
    /// Maximum number of polls.
    pub max_attempts: u32,
    /// Wall-clock limit measured from the first poll.
    pub timeout: Duration,
    /// Allowance for runs whose creation time precedes the local dispatch
    /// timestamp.
    pub clock_skew: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            settling_delay: DEFAULT_SETTLING_DELAY,
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Result of a single poll tick.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Observation {
    /// Classified state.
    pub state: PollState,
    /// The run that was classified, absent for [`PollState::NoRunFound`].
    pub run: Option<WorkflowRun>,
}

/// Terminal result of a poll cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// The run completed successfully.
    Succeeded(WorkflowRun),
    /// The run completed unsuccessfully; its logs live at `html_url`.
    Failed(WorkflowRun),
}

/// Errors that end a poll cycle without a terminal run state.
#[derive(Debug, Error)]
pub enum PollError {
    /// Raised when no credential has been stored.
    #[error("no API token stored; run `ffl-dispatch token set <TOKEN>` first")]
    MissingCredential,
    /// Raised when the credential store cannot be read.
    #[error("credential store error: {0}")]
    Credential(#[from] CredentialError),
    /// Raised when a status query fails. Polling is not retried.
    #[error("status query failed: {0}")]
    Remote(#[from] ApiError),
    /// Raised when the attempt limit or deadline is reached first.
    #[error(
        "run did not complete after {attempts} polls ({}s)",
        .elapsed.as_secs()
    )]
    Timeout {
        /// Polls performed.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
    },
}

/// Tracks the run started by one dispatch until it reaches a terminal state.
#[derive(Debug)]
pub struct StatusPoller<'a, A, C, O> {
    api: &'a A,
    credentials: &'a C,
    observer: &'a O,
    settings: PollSettings,
}

impl<'a, A, C, O> StatusPoller<'a, A, C, O>
where
    A: WorkflowApi,
    C: CredentialProvider,
    O: StatusObserver,
{
    /// Creates a poller with explicit timing bounds.
    #[must_use]
    pub const fn new(
        api: &'a A,
        credentials: &'a C,
        observer: &'a O,
        settings: PollSettings,
    ) -> Self {
        Self {
            api,
            credentials,
            observer,
            settings,
        }
    }

    /// Polls until the run created by `receipt` completes.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::MissingCredential`] before waiting when no
    /// credential is stored, [`PollError::Remote`] on the first failed
    /// query, and [`PollError::Timeout`] when the run is still pending once
    /// the attempt limit or deadline is reached.
    pub async fn poll(&self, receipt: &DispatchReceipt) -> Result<PollOutcome, PollError> {
        let credential = self.credential()?;
        let not_before = association_floor(receipt.dispatched_at, self.settings.clock_skew);

        sleep(self.settings.settling_delay).await;
        let started = Instant::now();
        let deadline = started.checked_add(self.settings.timeout);
        let mut attempts = 0_u32;

        while attempts < self.settings.max_attempts {
            attempts = attempts.saturating_add(1);
            let observation = self.tick(&credential, Some(not_before), attempts).await?;
            match observation {
                Observation {
                    state: PollState::CompletedSuccess,
                    run: Some(run),
                } => return Ok(PollOutcome::Succeeded(run)),
                Observation {
                    state: PollState::CompletedFailure,
                    run: Some(run),
                } => return Ok(PollOutcome::Failed(run)),
                _ => {}
            }

            if attempts >= self.settings.max_attempts {
                break;
            }
            let next_poll = Instant::now().checked_add(self.settings.interval);
            if let (Some(next), Some(limit)) = (next_poll, deadline)
                && next > limit
            {
                break;
            }
            sleep(self.settings.interval).await;
        }

        let elapsed = started.elapsed();
        info!(attempts, elapsed_secs = elapsed.as_secs(), "gave up waiting for run");
        Err(PollError::Timeout { attempts, elapsed })
    }

    /// Performs one tick against the latest run without associating it with
    /// a dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::MissingCredential`] when no credential is stored
    /// and [`PollError::Remote`] when the query fails.
    pub async fn check(&self) -> Result<Observation, PollError> {
        let credential = self.credential()?;
        self.tick(&credential, None, 1).await
    }

    fn credential(&self) -> Result<Credential, PollError> {
        self.credentials.get()?.ok_or(PollError::MissingCredential)
    }

    async fn tick(
        &self,
        credential: &Credential,
        not_before: Option<DateTime<Utc>>,
        attempt: u32,
    ) -> Result<Observation, PollError> {
        let latest = match self.api.latest_run(credential).await {
            Ok(latest) => latest,
            Err(err) => {
                forget_if_unauthorized(self.credentials, &err);
                return Err(PollError::Remote(err));
            }
        };

        let run = latest.filter(|run| {
            let current = not_before.is_none_or(|floor| run.created_at >= floor);
            if !current {
                debug!(run_id = run.id, created_at = %run.created_at, "ignoring earlier run");
            }
            current
        });
        let state = run.as_ref().map_or(PollState::NoRunFound, PollState::of);
        debug!(attempt, ?state, "poll tick");

        let elapsed = run
            .as_ref()
            .filter(|_| !state.is_terminal())
            .map(|found| Utc::now() - found.created_at);
        self.observer.observe(&StatusEvent::Poll(PollUpdate {
            state,
            attempt,
            elapsed,
            run_url: run.as_ref().map(|found| found.html_url.clone()),
        }));
        if state.is_terminal() {
            info!(?state, "run reached a terminal state");
        }

        Ok(Observation { state, run })
    }
}

fn association_floor(dispatched_at: DateTime<Utc>, clock_skew: Duration) -> DateTime<Utc> {
    let skew = TimeDelta::from_std(clock_skew).unwrap_or(TimeDelta::MAX);
    dispatched_at
        .checked_sub_signed(skew)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
