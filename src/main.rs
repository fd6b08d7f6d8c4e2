//! Binary entry point for the `ffl-dispatch` CLI.

use std::future;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ffl_dispatch::{
    ArtifactResult, ConfigError, Credential, CredentialError, CredentialProvider,
    FileCredentialStore, GithubClient, IssueLinkError, JobParameters, ParameterError, PollError,
    PollState, ScheduleWorkflow, StatusPoller, TracingReporter, WorkflowConfig, WorkflowError,
    WorkflowOutcome, WorkflowRun, issue_request_url,
};

mod cli;

use cli::{Cli, ScheduleArgs, ScheduleCommand, TokenAction};

const DEFAULT_LOG_FILTER: &str = "ffl_dispatch=info";
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid tournament parameters: {0}")]
    Parameters(#[from] ParameterError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Status(#[from] PollError),
    #[error(transparent)]
    IssueLink(#[from] IssueLinkError),
    #[error("token must not be empty")]
    EmptyToken,
    #[error("schedule generation failed; see the run logs at {url}")]
    RunFailed { url: String },
    #[error("interrupted before the run completed")]
    Interrupted,
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => INTERRUPTED_EXIT_CODE,
            _ => 1,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Schedule(command) => schedule(command).await,
        Cli::Status => status().await,
        Cli::Token(command) => token(command.action, &FileCredentialStore::from_env()),
        Cli::Link(args) => link(&args),
    }
}

async fn schedule(command: ScheduleCommand) -> Result<(), CliError> {
    let params = build_parameters(&command.params)?;
    let config = WorkflowConfig::load_without_cli_args()?;
    let client = GithubClient::new(&config)?;
    let credentials = FileCredentialStore::from_env();
    let reporter = TracingReporter;
    let workflow = ScheduleWorkflow::new(&client, &credentials, &reporter)
        .with_git_ref(command.git_ref.unwrap_or_else(|| config.git_ref.clone()))
        .with_poll_settings(config.poll_settings());

    let outcome = tokio::select! {
        outcome = workflow.run(params) => outcome?,
        () = interruption(tokio::signal::ctrl_c()) => return Err(CliError::Interrupted),
    };
    write_outcome(io::stdout(), &outcome)
}

/// Resolves once the user interrupts. A signal listener that fails to
/// install never resolves, leaving the workflow to finish on its own.
async fn interruption(signal: impl Future<Output = io::Result<()>>) {
    if let Err(err) = signal.await {
        tracing::warn!(error = %err, "Ctrl-C handling unavailable");
        future::pending::<()>().await;
    }
}

async fn status() -> Result<(), CliError> {
    let config = WorkflowConfig::load_without_cli_args()?;
    let client = GithubClient::new(&config)?;
    let credentials = FileCredentialStore::from_env();
    let reporter = TracingReporter;
    let observation = StatusPoller::new(&client, &credentials, &reporter, config.poll_settings())
        .check()
        .await?;

    write_observation(io::stdout(), observation.state, observation.run.as_ref());
    Ok(())
}

fn write_observation(mut target: impl Write, state: PollState, run: Option<&WorkflowRun>) {
    let written = match run {
        Some(found) => writeln!(
            target,
            "run {}: {} ({})",
            found.id,
            describe_state(state),
            found.html_url
        ),
        None => writeln!(target, "no workflow runs found"),
    };
    written.ok();
}

fn token(action: TokenAction, store: &impl CredentialProvider) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    match action {
        TokenAction::Set { token } => {
            let credential = Credential::new(token);
            if credential.is_empty() {
                return Err(CliError::EmptyToken);
            }
            store.set(&credential)?;
            writeln!(stdout, "token stored").ok();
        }
        TokenAction::Clear => {
            store.clear()?;
            writeln!(stdout, "token cleared").ok();
        }
    }
    Ok(())
}

fn link(args: &ScheduleArgs) -> Result<(), CliError> {
    let params = build_parameters(args)?;
    let config = WorkflowConfig::load_without_cli_args()?;
    let url = issue_request_url(&config.web_base_url, &config.owner, &config.repo, &params)?;
    writeln!(io::stdout(), "{url}").ok();
    Ok(())
}

fn build_parameters(args: &ScheduleArgs) -> Result<JobParameters, ParameterError> {
    let mut builder = JobParameters::builder();
    if let Some(teams) = args.teams {
        builder = builder.num_teams(teams);
    }
    if let Some(tables) = args.tables {
        builder = builder.num_tables(tables);
    }
    if let Some(rooms) = args.jury_rooms {
        builder = builder.num_jury_rooms(rooms);
    }
    if let Some(matches) = args.matches_per_team {
        builder = builder.matches_per_team(matches);
    }
    if let Some(timeslots) = args.timeslots {
        builder = builder.num_timeslots(timeslots);
    }
    builder
        .start_time(args.start_time.clone())
        .match_duration(args.match_duration)
        .jury_duration(args.jury_duration)
        .buffer_time(args.buffer_time)
        .break_enabled(args.break_enabled)
        .build()
}

fn write_outcome(mut target: impl Write, outcome: &WorkflowOutcome) -> Result<(), CliError> {
    match outcome {
        WorkflowOutcome::Succeeded { artifact, .. } => {
            match artifact {
                ArtifactResult::Available(link) => {
                    writeln!(target, "schedule: {}", link.url).ok();
                    writeln!(target, "archive: {}", link.archive_url).ok();
                }
                ArtifactResult::Empty { run_url } => {
                    writeln!(target, "run succeeded without an artifact: {run_url}").ok();
                }
                ArtifactResult::Unavailable { reason, run_url } => {
                    writeln!(
                        target,
                        "run succeeded but the artifact could not be located ({reason}): {run_url}"
                    )
                    .ok();
                }
            }
            Ok(())
        }
        WorkflowOutcome::Failed { run } => Err(CliError::RunFailed {
            url: run.html_url.clone(),
        }),
    }
}

const fn describe_state(state: PollState) -> &'static str {
    match state {
        PollState::NoRunFound => "not found",
        PollState::Queued => "queued",
        PollState::InProgress => "in progress",
        PollState::CompletedSuccess => "completed successfully",
        PollState::CompletedFailure => "failed",
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
