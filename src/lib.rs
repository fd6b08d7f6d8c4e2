//! Core library for the `ffl-dispatch` tournament scheduling client.
//!
//! The crate submits schedule-generation requests to a GitHub Actions
//! workflow, polls the resulting run until it completes, and locates the
//! artifact holding the generated schedule (dispatch → settle → poll →
//! resolve). The remote API, credential store, and status presentation are
//! injected through traits so each stage can be exercised in isolation.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod github;
pub mod issue_link;
pub mod params;
pub mod poller;
pub mod status;
pub mod test_support;
pub mod workflow;

pub use api::{
    ApiError, ApiFuture, Artifact, DispatchRequest, RunConclusion, RunStatus, WorkflowApi,
    WorkflowRun,
};
pub use artifacts::{ArtifactLink, ArtifactResolver, ArtifactResult};
pub use config::{ConfigError, WorkflowConfig};
pub use credential::{Credential, CredentialError, CredentialProvider, FileCredentialStore};
pub use dispatch::{DispatchError, DispatchReceipt, Dispatcher};
pub use github::GithubClient;
pub use issue_link::{IssueLinkError, issue_request_url};
pub use params::{JobParameters, JobParametersBuilder, ParameterError};
pub use poller::{Observation, PollError, PollOutcome, PollSettings, PollState, StatusPoller};
pub use status::{PollUpdate, StatusEvent, StatusObserver, TracingReporter};
pub use workflow::{ScheduleWorkflow, WorkflowError, WorkflowOutcome};
