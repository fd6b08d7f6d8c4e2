//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::api::{
    ApiError, ApiFuture, Artifact, DispatchRequest, RunConclusion, RunStatus, WorkflowApi,
    WorkflowRun,
};
use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_WEB_BASE_URL, WorkflowConfig};
use crate::credential::{Credential, CredentialError, CredentialProvider};
use crate::poller::PollState;
use crate::status::{StatusEvent, StatusObserver};

fn lock<T>(mutex: &StdMutex<T>) -> StdMutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ApiScript {
    dispatch_failures: VecDeque<ApiError>,
    dispatched: Vec<serde_json::Value>,
    runs: VecDeque<Result<Option<WorkflowRun>, ApiError>>,
    run_queries: Vec<Instant>,
    artifacts: VecDeque<Result<Vec<Artifact>, ApiError>>,
    artifact_queries: Vec<u64>,
}

/// Scripted [`WorkflowApi`] that replays queued responses in FIFO order.
///
/// The last queued run observation repeats once the queue is drained, so a
/// single `queued` entry keeps a run pending for the rest of a test.
/// Dispatches succeed unless a failure was queued; artifact listings return
/// an empty list unless a response was queued.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    script: Arc<StdMutex<ApiScript>>,
}

impl ScriptedApi {
    /// Creates an API double with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next dispatch fail with `error`.
    pub fn fail_dispatch(&self, error: ApiError) {
        lock(&self.script).dispatch_failures.push_back(error);
    }

    /// Queues the next latest-run observation.
    pub fn push_run(&self, run: Option<WorkflowRun>) {
        lock(&self.script).runs.push_back(Ok(run));
    }

    /// Queues a failing latest-run query.
    pub fn push_run_error(&self, error: ApiError) {
        lock(&self.script).runs.push_back(Err(error));
    }

    /// Queues the next artifact listing.
    pub fn push_artifacts(&self, artifacts: Vec<Artifact>) {
        lock(&self.script).artifacts.push_back(Ok(artifacts));
    }

    /// Queues a failing artifact listing.
    pub fn push_artifacts_error(&self, error: ApiError) {
        lock(&self.script).artifacts.push_back(Err(error));
    }

    /// Returns the JSON bodies of every dispatch request received.
    #[must_use]
    pub fn dispatched(&self) -> Vec<serde_json::Value> {
        lock(&self.script).dispatched.clone()
    }

    /// Returns the instant of every latest-run query.
    #[must_use]
    pub fn run_queries(&self) -> Vec<Instant> {
        lock(&self.script).run_queries.clone()
    }

    /// Returns the run identifiers of every artifact listing request.
    #[must_use]
    pub fn artifact_queries(&self) -> Vec<u64> {
        lock(&self.script).artifact_queries.clone()
    }
}

impl WorkflowApi for ScriptedApi {
    fn dispatch<'a>(
        &'a self,
        _credential: &'a Credential,
        request: &'a DispatchRequest,
    ) -> ApiFuture<'a, ()> {
        let outcome = {
            let mut script = lock(&self.script);
            match serde_json::to_value(request) {
                Ok(body) => {
                    script.dispatched.push(body);
                    script.dispatch_failures.pop_front().map_or(Ok(()), Err)
                }
                Err(err) => Err(ApiError::Parse(err.to_string())),
            }
        };
        Box::pin(async move { outcome })
    }

    fn latest_run<'a>(&'a self, _credential: &'a Credential) -> ApiFuture<'a, Option<WorkflowRun>> {
        let outcome = {
            let mut script = lock(&self.script);
            script.run_queries.push(Instant::now());
            if script.runs.len() > 1 {
                script.runs.pop_front().unwrap_or(Ok(None))
            } else {
                script.runs.front().cloned().unwrap_or(Ok(None))
            }
        };
        Box::pin(async move { outcome })
    }

    fn list_artifacts<'a>(
        &'a self,
        _credential: &'a Credential,
        run_id: u64,
    ) -> ApiFuture<'a, Vec<Artifact>> {
        let outcome = {
            let mut script = lock(&self.script);
            script.artifact_queries.push(run_id);
            script.artifacts.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        };
        Box::pin(async move { outcome })
    }
}

/// In-memory [`CredentialProvider`]. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCredentials {
    slot: Arc<StdMutex<Option<Credential>>>,
}

impl InMemoryCredentials {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `token`.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        *lock(&store.slot) = Some(Credential::new(token));
        store
    }

    /// Returns the stored credential.
    #[must_use]
    pub fn token(&self) -> Option<Credential> {
        lock(&self.slot).clone()
    }
}

impl CredentialProvider for InMemoryCredentials {
    fn get(&self) -> Result<Option<Credential>, CredentialError> {
        Ok(self.token())
    }

    fn set(&self, credential: &Credential) -> Result<(), CredentialError> {
        *lock(&self.slot) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *lock(&self.slot) = None;
        Ok(())
    }
}

/// [`StatusObserver`] that records every event it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    events: Arc<StdMutex<Vec<StatusEvent>>>,
}

impl RecordingObserver {
    /// Creates an observer with no recorded events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<StatusEvent> {
        lock(&self.events).clone()
    }

    /// Returns the states of the recorded poll events.
    #[must_use]
    pub fn poll_states(&self) -> Vec<PollState> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                StatusEvent::Poll(update) => Some(update.state),
                _ => None,
            })
            .collect()
    }
}

impl StatusObserver for RecordingObserver {
    fn observe(&self, event: &StatusEvent) {
        lock(&self.events).push(event.clone());
    }
}

/// Builds a run of the test repository with the given lifecycle state.
#[must_use]
pub fn workflow_run(
    id: u64,
    status: RunStatus,
    conclusion: Option<RunConclusion>,
    created_at: DateTime<Utc>,
) -> WorkflowRun {
    WorkflowRun {
        id,
        status,
        conclusion,
        created_at,
        html_url: format!("https://github.com/octo/schedules/actions/runs/{id}"),
    }
}

/// Builds an artifact attached to run `run_id`.
#[must_use]
pub fn artifact(run_id: u64, id: u64, name: &str) -> Artifact {
    Artifact {
        id,
        name: name.to_owned(),
        size_in_bytes: 2_048,
        expired: false,
        archive_download_url: format!(
            "https://api.github.com/repos/octo/schedules/actions/artifacts/{id}/zip?run={run_id}"
        ),
    }
}

/// Configuration pointing at the `octo/schedules` test repository.
#[must_use]
pub fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        owner: String::from("octo"),
        repo: String::from("schedules"),
        workflow_file: String::from("generate-schedule.yml"),
        git_ref: String::from("main"),
        api_base_url: DEFAULT_API_BASE_URL.to_owned(),
        web_base_url: DEFAULT_WEB_BASE_URL.to_owned(),
        poll_interval_secs: 10,
        settling_delay_secs: 5,
        max_poll_attempts: 90,
        wait_timeout_secs: 1_800,
        clock_skew_secs: 5,
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
