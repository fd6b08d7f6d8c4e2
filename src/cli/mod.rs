//! Command-line interface definitions for the `ffl-dispatch` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `ffl-dispatch` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ffl-dispatch",
    version,
    about = "Generate tournament schedules on GitHub Actions and fetch the result",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Dispatch the scheduling workflow and wait for its artifact.
    #[command(
        name = "schedule",
        about = "Dispatch the scheduling workflow and wait for its artifact"
    )]
    Schedule(ScheduleCommand),
    /// Show the state of the most recent workflow run.
    #[command(name = "status", about = "Show the state of the most recent workflow run")]
    Status,
    /// Manage the stored API token.
    #[command(name = "token", about = "Manage the stored API token")]
    Token(TokenCommand),
    /// Print a pre-filled issue link that requests a schedule.
    #[command(
        name = "link",
        about = "Print a pre-filled issue link that requests a schedule"
    )]
    Link(ScheduleArgs),
}

/// Arguments for the `ffl-dispatch schedule` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ScheduleCommand {
    /// Tournament parameters.
    #[command(flatten)]
    pub(crate) params: ScheduleArgs,
    /// Branch to dispatch the workflow against, overriding configuration.
    #[arg(long = "ref", value_name = "BRANCH")]
    pub(crate) git_ref: Option<String>,
}

/// Tournament parameters. Unset counts fall back to the scheduler defaults
/// (45 teams, 8 tables, 7 jury rooms, 4 matches per team, 50 timeslots).
#[derive(Debug, Args)]
pub(crate) struct ScheduleArgs {
    /// Number of teams.
    #[arg(long, value_name = "N")]
    pub(crate) teams: Option<u32>,
    /// Number of match tables.
    #[arg(long, value_name = "N")]
    pub(crate) tables: Option<u32>,
    /// Number of jury rooms.
    #[arg(long, value_name = "N")]
    pub(crate) jury_rooms: Option<u32>,
    /// Matches each team plays.
    #[arg(long, value_name = "N")]
    pub(crate) matches_per_team: Option<u32>,
    /// Number of timeslots.
    #[arg(long, value_name = "N")]
    pub(crate) timeslots: Option<u32>,
    /// Tournament start time (24-hour HH:MM).
    #[arg(long, value_name = "HH:MM")]
    pub(crate) start_time: Option<String>,
    /// Match duration in minutes.
    #[arg(long, value_name = "MINUTES")]
    pub(crate) match_duration: Option<u32>,
    /// Jury session duration in minutes.
    #[arg(long, value_name = "MINUTES")]
    pub(crate) jury_duration: Option<u32>,
    /// Minimum buffer between a team's activities in minutes.
    #[arg(long, value_name = "MINUTES")]
    pub(crate) buffer_time: Option<u32>,
    /// Schedule a break in the middle of the day.
    #[arg(long, value_name = "BOOL")]
    pub(crate) break_enabled: Option<bool>,
}

/// Arguments for the `ffl-dispatch token` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TokenCommand {
    /// Token operation.
    #[command(subcommand)]
    pub(crate) action: TokenAction,
}

/// Operations on the stored API token.
#[derive(Debug, Subcommand)]
pub(crate) enum TokenAction {
    /// Store a token, replacing any previous one.
    #[command(name = "set", about = "Store a token, replacing any previous one")]
    Set {
        /// Personal access token with `actions:write` scope.
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Remove the stored token.
    #[command(name = "clear", about = "Remove the stored token")]
    Clear,
}
