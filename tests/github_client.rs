//! Integration tests for the GitHub Actions client against a local stub.

#[path = "common/http_stub.rs"]
mod http_stub;

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use ffl_dispatch::test_support::{InMemoryCredentials, RecordingObserver, workflow_config};
use ffl_dispatch::{
    ApiError, ArtifactResult, Credential, DispatchRequest, GithubClient, JobParameters,
    PollSettings, RunConclusion, RunStatus, ScheduleWorkflow, WorkflowApi, WorkflowConfig,
    WorkflowOutcome,
};
use http_stub::{HttpStub, StubResponse};
use rstest::rstest;
use serde_json::json;

fn client_for(stub: &HttpStub) -> GithubClient {
    let config = WorkflowConfig {
        api_base_url: stub.base_url().to_owned(),
        ..workflow_config()
    };
    GithubClient::new(&config).unwrap_or_else(|err| panic!("client should build: {err}"))
}

fn credential() -> Credential {
    Credential::new("ghp_integration")
}

fn run_json(id: u64, status: &str, conclusion: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "status": status,
        "conclusion": conclusion,
        "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "html_url": format!("https://github.com/octo/schedules/actions/runs/{id}"),
        "name": "Generate schedule",
    })
}

#[rstest]
#[tokio::test]
async fn dispatch_posts_inputs_with_auth_headers() {
    let stub = HttpStub::start(vec![StubResponse::no_content()]).await;
    let client = client_for(&stub);
    let request = DispatchRequest {
        git_ref: String::from("main"),
        inputs: JobParameters::builder()
            .num_teams(8)
            .num_tables(2)
            .matches_per_team(6)
            .build()
            .unwrap_or_else(|err| panic!("parameters: {err}")),
    };

    client
        .dispatch(&credential(), &request)
        .await
        .unwrap_or_else(|err| panic!("dispatch should succeed: {err}"));

    let requests = stub.requests();
    let [recorded] = requests.as_slice() else {
        panic!("exactly one request expected, got {requests:?}");
    };
    assert_eq!(recorded.method, "POST");
    assert_eq!(
        recorded.target,
        "/repos/octo/schedules/actions/workflows/generate-schedule.yml/dispatches"
    );
    assert_eq!(recorded.header("authorization"), Some("Bearer ghp_integration"));
    assert_eq!(recorded.header("accept"), Some("application/vnd.github+json"));
    assert_eq!(recorded.header("x-github-api-version"), Some("2022-11-28"));
    assert!(
        recorded
            .header("user-agent")
            .is_some_and(|agent| agent.starts_with("ffl-dispatch/"))
    );

    let body = recorded.json();
    assert_eq!(body["ref"], "main");
    assert_eq!(body["inputs"]["num_teams"], "8");
    assert_eq!(body["inputs"]["num_tables"], "2");
    assert_eq!(body["inputs"]["num_jury_rooms"], "7");
    assert_eq!(body["inputs"]["matches_per_team"], "6");
    assert_eq!(body["inputs"]["num_timeslots"], "50");
}

#[rstest]
#[tokio::test]
async fn latest_run_requests_a_single_run() {
    let stub = HttpStub::start(vec![StubResponse::json(&json!({
        "total_count": 14,
        "workflow_runs": [run_json(31, "in_progress", None)],
    }))])
    .await;
    let client = client_for(&stub);

    let run = client
        .latest_run(&credential())
        .await
        .unwrap_or_else(|err| panic!("query should succeed: {err}"))
        .unwrap_or_else(|| panic!("a run should be returned"));

    assert_eq!(run.id, 31);
    assert_eq!(run.status, RunStatus::InProgress);
    assert_eq!(run.conclusion, None);
    let requests = stub.requests();
    let [recorded] = requests.as_slice() else {
        panic!("exactly one request expected");
    };
    assert_eq!(recorded.method, "GET");
    assert_eq!(
        recorded.target,
        "/repos/octo/schedules/actions/workflows/generate-schedule.yml/runs?per_page=1"
    );
}

#[rstest]
#[case(json!({"total_count": 0, "workflow_runs": []}))]
#[case(json!({"total_count": 0}))]
#[tokio::test]
async fn latest_run_is_none_without_runs(#[case] payload: serde_json::Value) {
    let stub = HttpStub::start(vec![StubResponse::json(&payload)]).await;
    let client = client_for(&stub);

    let run = client
        .latest_run(&credential())
        .await
        .unwrap_or_else(|err| panic!("query should succeed: {err}"));

    assert!(run.is_none());
}

#[rstest]
#[tokio::test]
async fn list_artifacts_preserves_provider_order() {
    let stub = HttpStub::start(vec![StubResponse::json(&json!({
        "total_count": 2,
        "artifacts": [
            {
                "id": 5,
                "name": "schedule",
                "size_in_bytes": 1024,
                "expired": false,
                "archive_download_url": "https://api.github.com/repos/octo/schedules/actions/artifacts/5/zip"
            },
            {
                "id": 6,
                "name": "logs",
                "archive_download_url": "https://api.github.com/repos/octo/schedules/actions/artifacts/6/zip"
            }
        ]
    }))])
    .await;
    let client = client_for(&stub);

    let artifacts = client
        .list_artifacts(&credential(), 31)
        .await
        .unwrap_or_else(|err| panic!("listing should succeed: {err}"));

    let names: Vec<&str> = artifacts.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, ["schedule", "logs"]);
    let targets: Vec<String> = stub
        .requests()
        .into_iter()
        .map(|recorded| recorded.target)
        .collect();
    assert_eq!(targets, ["/repos/octo/schedules/actions/runs/31/artifacts"]);
}

#[rstest]
#[case(
    StubResponse::new(401, "{\"message\":\"Bad credentials\"}"),
    ApiError::Unauthorized
)]
#[case(
    StubResponse::new(422, "{\"message\":\"Unexpected inputs provided: [\\\"foo\\\"]\"}"),
    ApiError::RemoteRejected {
        status: 422,
        message: String::from("Unexpected inputs provided: [\"foo\"]"),
    }
)]
#[case(
    StubResponse::new(404, ""),
    ApiError::RemoteRejected {
        status: 404,
        message: String::from("Not Found"),
    }
)]
#[tokio::test]
async fn failures_are_classified(#[case] response: StubResponse, #[case] expected: ApiError) {
    let stub = HttpStub::start(vec![response]).await;
    let client = client_for(&stub);

    let Err(err) = client.latest_run(&credential()).await else {
        panic!("query should fail");
    };

    assert_eq!(err, expected);
}

#[rstest]
#[tokio::test]
async fn undecodable_success_body_is_a_parse_error() {
    let stub = HttpStub::start(vec![StubResponse::new(200, "not json")]).await;
    let client = client_for(&stub);

    let result = client.list_artifacts(&credential(), 1).await;

    assert!(matches!(result, Err(ApiError::Parse(_))));
}

#[rstest]
#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("address: {err}"));
    drop(listener);
    let config = WorkflowConfig {
        api_base_url: format!("http://{addr}"),
        ..workflow_config()
    };
    let client = GithubClient::new(&config).unwrap_or_else(|err| panic!("client: {err}"));

    let result = client.latest_run(&credential()).await;

    assert!(matches!(result, Err(ApiError::Network(_))));
}

#[rstest]
#[tokio::test]
async fn schedule_workflow_runs_end_to_end() {
    let stub = HttpStub::start(vec![
        StubResponse::no_content(),
        StubResponse::json(&json!({"workflow_runs": [run_json(40, "queued", None)]})),
        StubResponse::json(&json!({"workflow_runs": [run_json(40, "completed", Some("success"))]})),
        StubResponse::json(&json!({"artifacts": [{
            "id": 90,
            "name": "schedule",
            "size_in_bytes": 4096,
            "expired": false,
            "archive_download_url": "https://api.github.com/repos/octo/schedules/actions/artifacts/90/zip"
        }]})),
    ])
    .await;
    let client = client_for(&stub);
    let credentials = InMemoryCredentials::with_token("ghp_integration");
    let observer = RecordingObserver::new();
    let settings = PollSettings {
        settling_delay: Duration::from_millis(10),
        interval: Duration::from_millis(10),
        max_attempts: 5,
        timeout: Duration::from_secs(5),
        clock_skew: Duration::from_secs(30),
    };

    let outcome = ScheduleWorkflow::new(&client, &credentials, &observer)
        .with_poll_settings(settings)
        .run(
            JobParameters::builder()
                .build()
                .unwrap_or_else(|err| panic!("parameters: {err}")),
        )
        .await
        .unwrap_or_else(|err| panic!("workflow should succeed: {err}"));

    let WorkflowOutcome::Succeeded { run, artifact } = outcome else {
        panic!("workflow should succeed");
    };
    assert_eq!(run.conclusion, Some(RunConclusion::Success));
    let ArtifactResult::Available(link) = artifact else {
        panic!("artifact should be available");
    };
    assert_eq!(
        link.url,
        "https://github.com/octo/schedules/actions/runs/40/artifacts/90"
    );
    assert_eq!(stub.requests().len(), 4);
}

#[rstest]
#[tokio::test]
async fn rejected_credential_is_cleared_during_a_workflow() {
    let stub = HttpStub::start(vec![StubResponse::new(
        401,
        "{\"message\":\"Bad credentials\"}",
    )])
    .await;
    let client = client_for(&stub);
    let credentials = InMemoryCredentials::with_token("ghp_revoked");
    let observer = RecordingObserver::new();

    let result = ScheduleWorkflow::new(&client, &credentials, &observer)
        .run(
            JobParameters::builder()
                .build()
                .unwrap_or_else(|err| panic!("parameters: {err}")),
        )
        .await;

    assert!(result.is_err());
    assert!(credentials.token().is_none());
}
