//! Human-readable status transitions emitted while a schedule is generated.

use std::fmt;

use chrono::TimeDelta;
use tracing::info;

use crate::artifacts::ArtifactLink;
use crate::poller::PollState;

/// Receives status transitions from the dispatcher, poller, and resolver.
pub trait StatusObserver {
    /// Handles one status transition.
    fn observe(&self, event: &StatusEvent);
}

/// A single status transition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StatusEvent {
    /// The dispatch request was accepted.
    Dispatched {
        /// Branch the workflow was dispatched against.
        git_ref: String,
    },
    /// A poll tick classified the latest run.
    Poll(PollUpdate),
    /// The run produced an artifact.
    ArtifactReady(ArtifactLink),
    /// The run succeeded without producing an artifact.
    NoArtifacts {
        /// Browser URL of the run.
        run_url: String,
    },
    /// The run succeeded but its artifacts could not be listed.
    ArtifactUnavailable {
        /// Description of the listing failure.
        reason: String,
        /// Browser URL of the run.
        run_url: String,
    },
}

/// Details of one poll tick.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollUpdate {
    /// State after the tick.
    pub state: PollState,
    /// One-based poll attempt number.
    pub attempt: u32,
    /// Time since the observed run was created, while it is pending.
    pub elapsed: Option<TimeDelta>,
    /// Browser URL of the observed run.
    pub run_url: Option<String>,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatched { git_ref } => write!(
                f,
                "schedule generation requested on {git_ref}; waiting for the run to register"
            ),
            Self::Poll(update) => write!(f, "{update}"),
            Self::ArtifactReady(link) => {
                write!(f, "schedule '{}' ready: {}", link.name, link.url)
            }
            Self::NoArtifacts { run_url } => write!(
                f,
                "run succeeded but produced no artifact; inspect the run at {run_url}"
            ),
            Self::ArtifactUnavailable { reason, run_url } => write!(
                f,
                "run succeeded but its artifacts could not be fetched ({reason}); see {run_url}"
            ),
        }
    }
}

impl fmt::Display for PollUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attempt = self.attempt;
        match self.state {
            PollState::NoRunFound => write!(f, "[{attempt}] waiting for the run to appear"),
            PollState::Queued => write!(f, "[{attempt}] run queued{}", self.elapsed_suffix()),
            PollState::InProgress => {
                write!(f, "[{attempt}] run in progress{}", self.elapsed_suffix())
            }
            PollState::CompletedSuccess => write!(f, "[{attempt}] run completed successfully"),
            PollState::CompletedFailure => match &self.run_url {
                Some(url) => write!(f, "[{attempt}] run failed; logs at {url}"),
                None => write!(f, "[{attempt}] run failed"),
            },
        }
    }
}

impl PollUpdate {
    fn elapsed_suffix(&self) -> String {
        self.elapsed
            .map(|elapsed| format!(" for {}", format_elapsed(elapsed)))
            .unwrap_or_default()
    }
}

/// Renders a duration as `Xm YYs`, clamping negative values to zero.
#[must_use]
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let clamped = elapsed.max(TimeDelta::zero());
    let minutes = clamped.num_minutes();
    let seconds = clamped.num_seconds() - minutes * 60;
    format!("{minutes}m {seconds:02}s")
}

/// Reports status transitions through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl StatusObserver for TracingReporter {
    fn observe(&self, event: &StatusEvent) {
        info!("{event}");
    }
}
