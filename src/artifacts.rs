//! Locates the schedule produced by a successful run.

use tracing::{info, warn};

use crate::api::{Artifact, WorkflowApi, WorkflowRun};
use crate::credential::{CredentialProvider, forget_if_unauthorized};
use crate::status::{StatusEvent, StatusObserver};

/// Where the generated schedule can be retrieved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArtifactLink {
    /// Artifact name chosen by the workflow.
    pub name: String,
    /// Browser URL of the artifact; downloading may require signing in.
    pub url: String,
    /// API URL of the zip archive; requires the API credential.
    pub archive_url: String,
    /// Archive size in bytes.
    pub size_in_bytes: u64,
}

impl ArtifactLink {
    fn from_artifact(run: &WorkflowRun, artifact: Artifact) -> Self {
        Self {
            url: format!(
                "{}/artifacts/{}",
                run.html_url.trim_end_matches('/'),
                artifact.id
            ),
            name: artifact.name,
            archive_url: artifact.archive_download_url,
            size_in_bytes: artifact.size_in_bytes,
        }
    }
}

/// Result of looking up a successful run's artifacts.
///
/// Neither `Empty` nor `Unavailable` turns the run into a failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArtifactResult {
    /// The first listed artifact.
    Available(ArtifactLink),
    /// The run produced no artifacts.
    Empty {
        /// Browser URL of the run.
        run_url: String,
    },
    /// The listing request failed.
    Unavailable {
        /// Description of the failure.
        reason: String,
        /// Browser URL of the run.
        run_url: String,
    },
}

/// Resolves the artifact of a completed run.
#[derive(Debug)]
pub struct ArtifactResolver<'a, A, C, O> {
    api: &'a A,
    credentials: &'a C,
    observer: &'a O,
}

impl<'a, A, C, O> ArtifactResolver<'a, A, C, O>
where
    A: WorkflowApi,
    C: CredentialProvider,
    O: StatusObserver,
{
    /// Creates a resolver.
    #[must_use]
    pub const fn new(api: &'a A, credentials: &'a C, observer: &'a O) -> Self {
        Self {
            api,
            credentials,
            observer,
        }
    }

    /// Lists the artifacts of `run` and returns the first one.
    ///
    /// Failures are folded into [`ArtifactResult::Unavailable`]; a rejected
    /// credential is also cleared from the store.
    pub async fn resolve(&self, run: &WorkflowRun) -> ArtifactResult {
        let result = self.lookup(run).await;
        let event = match &result {
            ArtifactResult::Available(link) => {
                info!(run_id = run.id, artifact = %link.name, "artifact available");
                StatusEvent::ArtifactReady(link.clone())
            }
            ArtifactResult::Empty { run_url } => {
                info!(run_id = run.id, "run produced no artifacts");
                StatusEvent::NoArtifacts {
                    run_url: run_url.clone(),
                }
            }
            ArtifactResult::Unavailable { reason, run_url } => {
                warn!(run_id = run.id, %reason, "artifact lookup failed");
                StatusEvent::ArtifactUnavailable {
                    reason: reason.clone(),
                    run_url: run_url.clone(),
                }
            }
        };
        self.observer.observe(&event);
        result
    }

    async fn lookup(&self, run: &WorkflowRun) -> ArtifactResult {
        let credential = match self.credentials.get() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                return ArtifactResult::Unavailable {
                    reason: String::from("no API token stored"),
                    run_url: run.html_url.clone(),
                };
            }
            Err(err) => {
                return ArtifactResult::Unavailable {
                    reason: err.to_string(),
                    run_url: run.html_url.clone(),
                };
            }
        };

        match self.api.list_artifacts(&credential, run.id).await {
            Ok(artifacts) => artifacts.into_iter().next().map_or_else(
                || ArtifactResult::Empty {
                    run_url: run.html_url.clone(),
                },
                |first| ArtifactResult::Available(ArtifactLink::from_artifact(run, first)),
            ),
            Err(err) => {
                forget_if_unauthorized(self.credentials, &err);
                ArtifactResult::Unavailable {
                    reason: err.to_string(),
                    run_url: run.html_url.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, RunConclusion, RunStatus};
    use crate::test_support::{
        InMemoryCredentials, RecordingObserver, ScriptedApi, artifact, workflow_run,
    };
    use chrono::Utc;
    use rstest::{fixture, rstest};

    #[fixture]
    fn succeeded_run() -> WorkflowRun {
        workflow_run(
            42,
            RunStatus::Completed,
            Some(RunConclusion::Success),
            Utc::now(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn first_listed_artifact_wins(succeeded_run: WorkflowRun) {
        let api = ScriptedApi::new();
        api.push_artifacts(vec![
            artifact(42, 501, "schedule"),
            artifact(42, 502, "debug-log"),
        ]);
        let credentials = InMemoryCredentials::with_token("ghp_test");
        let observer = RecordingObserver::new();

        let result = ArtifactResolver::new(&api, &credentials, &observer)
            .resolve(&succeeded_run)
            .await;

        let ArtifactResult::Available(link) = result else {
            panic!("artifact should be available");
        };
        assert_eq!(link.name, "schedule");
        assert_eq!(
            link.url,
            "https://github.com/octo/schedules/actions/runs/42/artifacts/501"
        );
        assert!(link.archive_url.contains("/artifacts/501/zip"));
        assert_eq!(api.artifact_queries(), vec![42]);
        assert_eq!(observer.events(), vec![StatusEvent::ArtifactReady(link)]);
    }

    #[rstest]
    #[tokio::test]
    async fn zero_artifacts_is_informational(succeeded_run: WorkflowRun) {
        let api = ScriptedApi::new();
        api.push_artifacts(Vec::new());
        let credentials = InMemoryCredentials::with_token("ghp_test");
        let observer = RecordingObserver::new();

        let result = ArtifactResolver::new(&api, &credentials, &observer)
            .resolve(&succeeded_run)
            .await;

        assert_eq!(
            result,
            ArtifactResult::Empty {
                run_url: succeeded_run.html_url.clone()
            }
        );
        assert!(matches!(
            observer.events().as_slice(),
            [StatusEvent::NoArtifacts { .. }]
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn listing_failure_is_reported_not_raised(succeeded_run: WorkflowRun) {
        let api = ScriptedApi::new();
        api.push_artifacts_error(ApiError::RemoteRejected {
            status: 500,
            message: String::from("server error"),
        });
        let credentials = InMemoryCredentials::with_token("ghp_test");
        let observer = RecordingObserver::new();

        let result = ArtifactResolver::new(&api, &credentials, &observer)
            .resolve(&succeeded_run)
            .await;

        let ArtifactResult::Unavailable { reason, run_url } = result else {
            panic!("artifact should be unavailable");
        };
        assert!(reason.contains("server error"), "reason: {reason}");
        assert_eq!(run_url, succeeded_run.html_url);
        assert!(credentials.token().is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn unauthorized_listing_clears_the_credential(succeeded_run: WorkflowRun) {
        let api = ScriptedApi::new();
        api.push_artifacts_error(ApiError::Unauthorized);
        let credentials = InMemoryCredentials::with_token("ghp_test");
        let observer = RecordingObserver::new();

        let result = ArtifactResolver::new(&api, &credentials, &observer)
            .resolve(&succeeded_run)
            .await;

        assert!(matches!(result, ArtifactResult::Unavailable { .. }));
        assert!(credentials.token().is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn missing_credential_skips_the_request(succeeded_run: WorkflowRun) {
        let api = ScriptedApi::new();
        let credentials = InMemoryCredentials::new();
        let observer = RecordingObserver::new();

        let result = ArtifactResolver::new(&api, &credentials, &observer)
            .resolve(&succeeded_run)
            .await;

        assert!(matches!(result, ArtifactResult::Unavailable { .. }));
        assert!(api.artifact_queries().is_empty());
    }
}
