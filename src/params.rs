//! Tournament parameters handed to the remote scheduling workflow.
//!
//! [`JobParameters`] is the ordered set of workflow inputs. It is built and
//! validated through [`JobParametersBuilder`] so capacity problems surface
//! locally instead of as a failed remote run several minutes later.

use chrono::NaiveTime;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// Input name for the number of teams.
pub const NUM_TEAMS: &str = "num_teams";
/// Input name for the number of match tables.
pub const NUM_TABLES: &str = "num_tables";
/// Input name for the number of jury rooms.
pub const NUM_JURY_ROOMS: &str = "num_jury_rooms";
/// Input name for the number of matches each team plays.
pub const MATCHES_PER_TEAM: &str = "matches_per_team";
/// Input name for the number of timeslots.
pub const NUM_TIMESLOTS: &str = "num_timeslots";
/// Input name for the tournament start time (`HH:MM`).
pub const START_TIME: &str = "start_time";
/// Input name for the match duration in minutes.
pub const MATCH_DURATION: &str = "match_duration";
/// Input name for the jury session duration in minutes.
pub const JURY_DURATION: &str = "jury_duration";
/// Input name for the minimum buffer between activities in minutes.
pub const BUFFER_TIME: &str = "buffer_time";
/// Input name for the break toggle.
pub const BREAK_ENABLED: &str = "break_enabled";

/// Default number of teams used by the scheduler.
pub const DEFAULT_NUM_TEAMS: u32 = 45;
/// Default number of match tables.
pub const DEFAULT_NUM_TABLES: u32 = 8;
/// Default number of jury rooms.
pub const DEFAULT_NUM_JURY_ROOMS: u32 = 7;
/// Default number of matches per team.
pub const DEFAULT_MATCHES_PER_TEAM: u32 = 4;
/// Default number of timeslots.
pub const DEFAULT_NUM_TIMESLOTS: u32 = 50;

/// Errors raised while building [`JobParameters`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParameterError {
    /// Raised when a count or duration is zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Input name of the offending field.
        field: &'static str,
    },
    /// Raised when the tables and timeslots cannot host every match.
    #[error(
        "insufficient match capacity: {required} matches needed, {available} table slots available"
    )]
    MatchCapacity {
        /// Matches required (`num_teams * matches_per_team`).
        required: u64,
        /// Table slots available (`num_timeslots * num_tables`).
        available: u64,
    },
    /// Raised when the jury rooms and timeslots cannot host every team.
    #[error(
        "insufficient jury capacity: {required} sessions needed, {available} room slots available"
    )]
    JuryCapacity {
        /// Jury sessions required (one per team).
        required: u64,
        /// Room slots available (`num_timeslots * num_jury_rooms`).
        available: u64,
    },
    /// Raised when the start time is not a 24-hour `HH:MM` value.
    #[error("start time '{0}' is not a valid HH:MM time")]
    StartTime(String),
}

/// Validated, immutable set of workflow inputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobParameters {
    num_teams: u32,
    num_tables: u32,
    num_jury_rooms: u32,
    matches_per_team: u32,
    num_timeslots: u32,
    start_time: Option<String>,
    match_duration: Option<u32>,
    jury_duration: Option<u32>,
    buffer_time: Option<u32>,
    break_enabled: Option<bool>,
}

impl JobParameters {
    /// Starts a builder pre-filled with the scheduler defaults.
    #[must_use]
    pub fn builder() -> JobParametersBuilder {
        JobParametersBuilder::new()
    }

    /// Number of teams.
    #[must_use]
    pub const fn num_teams(&self) -> u32 {
        self.num_teams
    }

    /// Number of match tables.
    #[must_use]
    pub const fn num_tables(&self) -> u32 {
        self.num_tables
    }

    /// Workflow inputs in their canonical order, rendered as strings.
    ///
    /// The five core counts are always present; the timing fields appear
    /// only when they were set.
    #[must_use]
    pub fn inputs(&self) -> Vec<(&'static str, String)> {
        let mut inputs = vec![
            (NUM_TEAMS, self.num_teams.to_string()),
            (NUM_TABLES, self.num_tables.to_string()),
            (NUM_JURY_ROOMS, self.num_jury_rooms.to_string()),
            (MATCHES_PER_TEAM, self.matches_per_team.to_string()),
            (NUM_TIMESLOTS, self.num_timeslots.to_string()),
        ];
        if let Some(start) = &self.start_time {
            inputs.push((START_TIME, start.clone()));
        }
        if let Some(minutes) = self.match_duration {
            inputs.push((MATCH_DURATION, minutes.to_string()));
        }
        if let Some(minutes) = self.jury_duration {
            inputs.push((JURY_DURATION, minutes.to_string()));
        }
        if let Some(minutes) = self.buffer_time {
            inputs.push((BUFFER_TIME, minutes.to_string()));
        }
        if let Some(enabled) = self.break_enabled {
            inputs.push((BREAK_ENABLED, enabled.to_string()));
        }
        inputs
    }
}

impl Serialize for JobParameters {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let inputs = self.inputs();
        let mut map = serializer.serialize_map(Some(inputs.len()))?;
        for (name, value) in &inputs {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Builder for [`JobParameters`] that validates on construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobParametersBuilder {
    num_teams: u32,
    num_tables: u32,
    num_jury_rooms: u32,
    matches_per_team: u32,
    num_timeslots: u32,
    start_time: Option<String>,
    match_duration: Option<u32>,
    jury_duration: Option<u32>,
    buffer_time: Option<u32>,
    break_enabled: Option<bool>,
}

impl Default for JobParametersBuilder {
    fn default() -> Self {
        Self {
            num_teams: DEFAULT_NUM_TEAMS,
            num_tables: DEFAULT_NUM_TABLES,
            num_jury_rooms: DEFAULT_NUM_JURY_ROOMS,
            matches_per_team: DEFAULT_MATCHES_PER_TEAM,
            num_timeslots: DEFAULT_NUM_TIMESLOTS,
            start_time: None,
            match_duration: None,
            jury_duration: None,
            buffer_time: None,
            break_enabled: None,
        }
    }
}

impl JobParametersBuilder {
    /// Creates a builder holding the scheduler defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of teams.
    #[must_use]
    pub const fn num_teams(mut self, value: u32) -> Self {
        self.num_teams = value;
        self
    }

    /// Sets the number of match tables.
    #[must_use]
    pub const fn num_tables(mut self, value: u32) -> Self {
        self.num_tables = value;
        self
    }

    /// Sets the number of jury rooms.
    #[must_use]
    pub const fn num_jury_rooms(mut self, value: u32) -> Self {
        self.num_jury_rooms = value;
        self
    }

    /// Sets the number of matches per team.
    #[must_use]
    pub const fn matches_per_team(mut self, value: u32) -> Self {
        self.matches_per_team = value;
        self
    }

    /// Sets the number of timeslots.
    #[must_use]
    pub const fn num_timeslots(mut self, value: u32) -> Self {
        self.num_timeslots = value;
        self
    }

    /// Sets the tournament start time (`HH:MM`).
    #[must_use]
    pub fn start_time(mut self, value: Option<String>) -> Self {
        self.start_time = value;
        self
    }

    /// Sets the match duration in minutes.
    #[must_use]
    pub const fn match_duration(mut self, value: Option<u32>) -> Self {
        self.match_duration = value;
        self
    }

    /// Sets the jury session duration in minutes.
    #[must_use]
    pub const fn jury_duration(mut self, value: Option<u32>) -> Self {
        self.jury_duration = value;
        self
    }

    /// Sets the minimum buffer between activities in minutes.
    #[must_use]
    pub const fn buffer_time(mut self, value: Option<u32>) -> Self {
        self.buffer_time = value;
        self
    }

    /// Enables or disables the tournament break.
    #[must_use]
    pub const fn break_enabled(mut self, value: Option<bool>) -> Self {
        self.break_enabled = value;
        self
    }

    /// Validates the collected values and builds [`JobParameters`].
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] when a count is zero, the tables or jury
    /// rooms cannot host every team in the available timeslots, or the start
    /// time is malformed.
    pub fn build(self) -> Result<JobParameters, ParameterError> {
        require_non_zero(NUM_TEAMS, self.num_teams)?;
        require_non_zero(NUM_TABLES, self.num_tables)?;
        require_non_zero(NUM_JURY_ROOMS, self.num_jury_rooms)?;
        require_non_zero(MATCHES_PER_TEAM, self.matches_per_team)?;
        require_non_zero(NUM_TIMESLOTS, self.num_timeslots)?;
        require_optional_non_zero(MATCH_DURATION, self.match_duration)?;
        require_optional_non_zero(JURY_DURATION, self.jury_duration)?;

        let matches_required = u64::from(self.num_teams) * u64::from(self.matches_per_team);
        let table_slots = u64::from(self.num_timeslots) * u64::from(self.num_tables);
        if matches_required > table_slots {
            return Err(ParameterError::MatchCapacity {
                required: matches_required,
                available: table_slots,
            });
        }

        let jury_required = u64::from(self.num_teams);
        let room_slots = u64::from(self.num_timeslots) * u64::from(self.num_jury_rooms);
        if jury_required > room_slots {
            return Err(ParameterError::JuryCapacity {
                required: jury_required,
                available: room_slots,
            });
        }

        let start_time = self.start_time.map(|raw| raw.trim().to_owned());
        if let Some(start) = &start_time
            && NaiveTime::parse_from_str(start, "%H:%M").is_err()
        {
            return Err(ParameterError::StartTime(start.clone()));
        }

        Ok(JobParameters {
            num_teams: self.num_teams,
            num_tables: self.num_tables,
            num_jury_rooms: self.num_jury_rooms,
            matches_per_team: self.matches_per_team,
            num_timeslots: self.num_timeslots,
            start_time,
            match_duration: self.match_duration,
            jury_duration: self.jury_duration,
            buffer_time: self.buffer_time,
            break_enabled: self.break_enabled,
        })
    }
}

const fn require_non_zero(field: &'static str, value: u32) -> Result<(), ParameterError> {
    if value == 0 {
        return Err(ParameterError::Zero { field });
    }
    Ok(())
}

const fn require_optional_non_zero(
    field: &'static str,
    value: Option<u32>,
) -> Result<(), ParameterError> {
    match value {
        Some(0) => Err(ParameterError::Zero { field }),
        _ => Ok(()),
    }
}
