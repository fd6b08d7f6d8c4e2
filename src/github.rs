//! GitHub Actions implementation of [`WorkflowApi`].

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    ApiError, ApiFuture, Artifact, ArtifactList, DispatchRequest, WorkflowApi, WorkflowRun,
    WorkflowRunList,
};
use crate::config::{ConfigError, WorkflowConfig};
use crate::credential::Credential;

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("ffl-dispatch/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the workflow, run, and artifact endpoints of one repository.
#[derive(Clone, Debug)]
pub struct GithubClient {
    http: Client,
    api_base_url: String,
    owner: String,
    repo: String,
    workflow_file: String,
}

impl GithubClient {
    /// Constructs a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation or
    /// the HTTP client cannot be initialised.
    pub fn new(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            owner: config.owner.trim().to_owned(),
            repo: config.repo.trim().to_owned(),
            workflow_file: config.workflow_file.trim().to_owned(),
        })
    }

    fn actions_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/actions/{suffix}",
            self.api_base_url, self.owner, self.repo
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        debug!(url = %url, "querying remote service");
        let response = authorise(self.http.get(url).query(query), credential)
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let checked = check_status(response).await?;
        checked
            .json()
            .await
            .map_err(|err| ApiError::Parse(err.to_string()))
    }
}

impl WorkflowApi for GithubClient {
    fn dispatch<'a>(
        &'a self,
        credential: &'a Credential,
        request: &'a DispatchRequest,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.actions_url(&format!("workflows/{}/dispatches", self.workflow_file));
            debug!(url = %url, git_ref = %request.git_ref, "dispatching workflow");
            let response = authorise(self.http.post(&url).json(request), credential)
                .send()
                .await
                .map_err(|err| ApiError::Network(err.to_string()))?;
            check_status(response).await?;
            Ok(())
        })
    }

    fn latest_run<'a>(&'a self, credential: &'a Credential) -> ApiFuture<'a, Option<WorkflowRun>> {
        Box::pin(async move {
            let url = self.actions_url(&format!("workflows/{}/runs", self.workflow_file));
            let list: WorkflowRunList = self
                .get_json(credential, &url, &[("per_page", "1")])
                .await?;
            Ok(list.workflow_runs.into_iter().next())
        })
    }

    fn list_artifacts<'a>(
        &'a self,
        credential: &'a Credential,
        run_id: u64,
    ) -> ApiFuture<'a, Vec<Artifact>> {
        Box::pin(async move {
            let url = self.actions_url(&format!("runs/{run_id}/artifacts"));
            let list: ArtifactList = self.get_json(credential, &url, &[]).await?;
            Ok(list.artifacts)
        })
    }
}

fn authorise(builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
    builder
        .bearer_auth(credential.expose())
        .header(ACCEPT, MEDIA_TYPE)
        .header(API_VERSION_HEADER, API_VERSION)
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Maps a non-success status and body onto the [`ApiError`] taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthorized;
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| raw_message(status, body), |parsed| parsed.message);
    ApiError::RemoteRejected {
        status: status.as_u16(),
        message,
    }
}

fn raw_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_owned()
    } else {
        trimmed.to_owned()
    }
}
