//! Submits schedule-generation requests to the remote workflow.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::api::{ApiError, DispatchRequest, WorkflowApi};
use crate::credential::{CredentialError, CredentialProvider, forget_if_unauthorized};
use crate::params::JobParameters;
use crate::status::{StatusEvent, StatusObserver};

/// Errors raised while dispatching a workflow run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Raised when no credential has been stored.
    #[error("no API token stored; run `ffl-dispatch token set <TOKEN>` first")]
    MissingCredential,
    /// Raised when the credential store cannot be read.
    #[error("credential store error: {0}")]
    Credential(#[from] CredentialError),
    /// Raised when the remote service refuses or never answers the request.
    #[error("dispatch failed: {0}")]
    Remote(#[from] ApiError),
}

/// Proof that the remote service accepted a dispatch request.
///
/// Acceptance does not mean the run has started or that the inputs were
/// valid; the remote side validates asynchronously.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DispatchReceipt {
    /// Local time at which the request was sent.
    pub dispatched_at: DateTime<Utc>,
    /// Branch the workflow was dispatched against.
    pub git_ref: String,
}

/// Sends one dispatch request per call.
#[derive(Debug)]
pub struct Dispatcher<'a, A, C, O> {
    api: &'a A,
    credentials: &'a C,
    observer: &'a O,
    git_ref: String,
}

impl<'a, A, C, O> Dispatcher<'a, A, C, O>
where
    A: WorkflowApi,
    C: CredentialProvider,
    O: StatusObserver,
{
    /// Creates a dispatcher targeting `git_ref`.
    #[must_use]
    pub fn new(
        api: &'a A,
        credentials: &'a C,
        observer: &'a O,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            api,
            credentials,
            observer,
            git_ref: git_ref.into(),
        }
    }

    /// Requests a new workflow run with `params` as its inputs.
    ///
    /// A rejected credential is cleared from the store before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingCredential`] without contacting the
    /// remote service when no credential is stored, and
    /// [`DispatchError::Remote`] when the request is refused or fails in
    /// transit.
    pub async fn dispatch(&self, params: JobParameters) -> Result<DispatchReceipt, DispatchError> {
        let credential = self
            .credentials
            .get()?
            .ok_or(DispatchError::MissingCredential)?;
        let request = DispatchRequest {
            git_ref: self.git_ref.clone(),
            inputs: params,
        };
        let dispatched_at = Utc::now();

        if let Err(err) = self.api.dispatch(&credential, &request).await {
            forget_if_unauthorized(self.credentials, &err);
            return Err(DispatchError::Remote(err));
        }

        info!(git_ref = %self.git_ref, "workflow dispatch accepted");
        self.observer.observe(&StatusEvent::Dispatched {
            git_ref: self.git_ref.clone(),
        });
        Ok(DispatchReceipt {
            dispatched_at,
            git_ref: request.git_ref,
        })
    }
}
