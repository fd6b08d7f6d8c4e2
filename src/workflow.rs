//! Orchestrates one schedule request end to end.
//!
//! The workflow dispatches the request, polls until the resulting run
//! completes, and resolves its artifact when the run succeeded. Failed runs
//! are reported with their log location and never reach the resolver.

use thiserror::Error;

use crate::api::{WorkflowApi, WorkflowRun};
use crate::artifacts::{ArtifactResolver, ArtifactResult};
use crate::credential::CredentialProvider;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::params::JobParameters;
use crate::poller::{PollError, PollOutcome, PollSettings, StatusPoller};
use crate::status::StatusObserver;

/// Default branch the workflow is dispatched against.
pub const DEFAULT_GIT_REF: &str = "main";

/// Errors surfaced while running a schedule request.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Raised when the dispatch request is not accepted.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Raised when polling ends without a terminal run state.
    #[error(transparent)]
    Poll(#[from] PollError),
}

/// Terminal result of a schedule request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WorkflowOutcome {
    /// The run succeeded. The artifact lookup result is attached.
    Succeeded {
        /// The completed run.
        run: WorkflowRun,
        /// Where the generated schedule can be fetched, if anywhere.
        artifact: ArtifactResult,
    },
    /// The run failed; its logs live at `run.html_url`.
    Failed {
        /// The completed run.
        run: WorkflowRun,
    },
}

/// Sequences dispatch, polling, and artifact resolution.
#[derive(Debug)]
pub struct ScheduleWorkflow<'a, A, C, O> {
    api: &'a A,
    credentials: &'a C,
    observer: &'a O,
    git_ref: String,
    settings: PollSettings,
}

impl<'a, A, C, O> ScheduleWorkflow<'a, A, C, O>
where
    A: WorkflowApi,
    C: CredentialProvider,
    O: StatusObserver,
{
    /// Creates a workflow targeting the default branch with default
    /// polling bounds.
    #[must_use]
    pub fn new(api: &'a A, credentials: &'a C, observer: &'a O) -> Self {
        Self {
            api,
            credentials,
            observer,
            git_ref: DEFAULT_GIT_REF.to_owned(),
            settings: PollSettings::default(),
        }
    }

    /// Overrides the branch the workflow is dispatched against.
    #[must_use]
    pub fn with_git_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = git_ref.into();
        self
    }

    /// Overrides the polling bounds.
    #[must_use]
    pub const fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs one schedule request to completion.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Dispatch`] when the request is refused and
    /// [`WorkflowError::Poll`] when polling fails or times out.
    pub async fn run(&self, params: JobParameters) -> Result<WorkflowOutcome, WorkflowError> {
        let dispatcher =
            Dispatcher::new(self.api, self.credentials, self.observer, self.git_ref.as_str());
        let receipt = dispatcher.dispatch(params).await?;

        let outcome = StatusPoller::new(self.api, self.credentials, self.observer, self.settings)
            .poll(&receipt)
            .await?;

        match outcome {
            PollOutcome::Succeeded(run) => {
                let artifact = ArtifactResolver::new(self.api, self.credentials, self.observer)
                    .resolve(&run)
                    .await;
                Ok(WorkflowOutcome::Succeeded { run, artifact })
            }
            PollOutcome::Failed(run) => Ok(WorkflowOutcome::Failed { run }),
        }
    }
}
