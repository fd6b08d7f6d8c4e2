//! Remote automation API abstraction.
//!
//! [`WorkflowApi`] is the seam between the dispatch/poll/resolve logic and
//! the hosted CI service. The production implementation lives in
//! [`crate::github`]; tests substitute a scripted double.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credential::Credential;
use crate::params::JobParameters;

/// Errors returned by remote API calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the remote service rejects the credential (HTTP 401).
    #[error("credential rejected by the remote service")]
    Unauthorized,
    /// Raised for any other non-success response.
    #[error("remote service rejected the request (status {status}): {message}")]
    RemoteRejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// Raised when the request never produced a response.
    #[error("network failure: {0}")]
    Network(String),
    /// Raised when a success response cannot be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Returns true when the error means the stored credential is invalid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Body of a workflow dispatch request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DispatchRequest {
    /// Branch or tag the workflow runs against.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Workflow inputs.
    pub inputs: JobParameters,
}

/// Lifecycle status of a workflow run.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted but not yet picked up by a runner.
    Queued,
    /// Executing on a runner.
    InProgress,
    /// Finished; see [`WorkflowRun::conclusion`].
    Completed,
    /// Any other pre-execution status (`requested`, `waiting`, `pending`).
    #[serde(other)]
    Pending,
}

/// Outcome of a completed workflow run.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    /// The run succeeded.
    Success,
    /// The run failed.
    Failure,
    /// The run was cancelled.
    Cancelled,
    /// The run exceeded its time limit.
    TimedOut,
    /// Any other conclusion.
    #[serde(other)]
    Other,
}

/// One remote execution of the scheduling workflow.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct WorkflowRun {
    /// Provider identifier of the run.
    pub id: u64,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Outcome, present once the run has completed.
    pub conclusion: Option<RunConclusion>,
    /// Creation timestamp reported by the provider.
    pub created_at: DateTime<Utc>,
    /// Browser URL of the run and its logs.
    pub html_url: String,
}

impl WorkflowRun {
    /// Returns true when the run completed with a success conclusion.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed && self.conclusion == Some(RunConclusion::Success)
    }
}

/// Output artifact attached to a workflow run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Artifact {
    /// Provider identifier of the artifact.
    pub id: u64,
    /// Artifact name chosen by the workflow.
    pub name: String,
    /// Archive size in bytes.
    #[serde(default)]
    pub size_in_bytes: u64,
    /// Whether the artifact has passed its retention period.
    #[serde(default)]
    pub expired: bool,
    /// API URL of the zip archive (requires the API credential).
    pub archive_download_url: String,
}

/// Listing envelope returned by the runs endpoint.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct WorkflowRunList {
    #[serde(default)]
    pub(crate) workflow_runs: Vec<WorkflowRun>,
}

/// Listing envelope returned by the artifacts endpoint.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ArtifactList {
    #[serde(default)]
    pub(crate) artifacts: Vec<Artifact>,
}

/// Future returned by [`WorkflowApi`] operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Minimal interface to the remote automation service.
pub trait WorkflowApi {
    /// Requests a new run of the scheduling workflow.
    fn dispatch<'a>(
        &'a self,
        credential: &'a Credential,
        request: &'a DispatchRequest,
    ) -> ApiFuture<'a, ()>;

    /// Fetches the most recently created run, if any exists.
    fn latest_run<'a>(&'a self, credential: &'a Credential) -> ApiFuture<'a, Option<WorkflowRun>>;

    /// Lists the artifacts attached to a run, in provider order.
    fn list_artifacts<'a>(
        &'a self,
        credential: &'a Credential,
        run_id: u64,
    ) -> ApiFuture<'a, Vec<Artifact>>;
}
