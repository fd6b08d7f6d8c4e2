//! Pre-filled "new issue" links for requesting a schedule without a token.
//!
//! The scheduling repository also reacts to issues opened with the
//! parameters in their body, so anyone with a browser session can request a
//! schedule through the link this module builds.

use reqwest::Url;
use thiserror::Error;

use crate::params::{
    BREAK_ENABLED, BUFFER_TIME, JURY_DURATION, JobParameters, MATCH_DURATION, MATCHES_PER_TEAM,
    NUM_JURY_ROOMS, NUM_TABLES, NUM_TEAMS, NUM_TIMESLOTS, START_TIME,
};

/// Errors raised while building an issue link.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IssueLinkError {
    /// Raised when the web base URL cannot be parsed.
    #[error("invalid web base URL '{base}': {message}")]
    InvalidBase {
        /// The rejected base URL.
        base: String,
        /// Parser error message.
        message: String,
    },
}

/// Builds the URL of a pre-filled issue requesting a schedule for `params`.
///
/// # Errors
///
/// Returns [`IssueLinkError::InvalidBase`] when `web_base_url` is not a
/// valid absolute URL.
pub fn issue_request_url(
    web_base_url: &str,
    owner: &str,
    repo: &str,
    params: &JobParameters,
) -> Result<Url, IssueLinkError> {
    let raw = format!(
        "{}/{}/{}/issues/new",
        web_base_url.trim_end_matches('/'),
        owner.trim(),
        repo.trim()
    );
    let title = format!(
        "Schedule request: {} teams, {} tables",
        params.num_teams(),
        params.num_tables()
    );
    let body = issue_body(params);
    Url::parse_with_params(&raw, [("title", title.as_str()), ("body", body.as_str())]).map_err(
        |err| IssueLinkError::InvalidBase {
            base: web_base_url.to_owned(),
            message: err.to_string(),
        },
    )
}

fn issue_body(params: &JobParameters) -> String {
    let lines: Vec<String> = params
        .inputs()
        .into_iter()
        .map(|(name, value)| format!("- **{}:** {value}", label(name)))
        .collect();
    format!(
        "## Tournament configuration\n\n### Parameters\n{}\n\n---\n\
         A workflow run will start automatically; the schedule is attached as an artifact.\n",
        lines.join("\n")
    )
}

fn label(name: &str) -> &str {
    match name {
        NUM_TEAMS => "Teams",
        NUM_TABLES => "Tables",
        NUM_JURY_ROOMS => "Jury rooms",
        MATCHES_PER_TEAM => "Matches per team",
        NUM_TIMESLOTS => "Timeslots",
        START_TIME => "Start time",
        MATCH_DURATION => "Match duration (min)",
        JURY_DURATION => "Jury duration (min)",
        BUFFER_TIME => "Buffer time (min)",
        BREAK_ENABLED => "Break",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params() -> JobParameters {
        JobParameters::builder()
            .num_teams(12)
            .num_tables(3)
            .start_time(Some(String::from("09:30")))
            .build()
            .unwrap_or_else(|err| panic!("parameters should build: {err}"))
    }

    fn query(url: &Url, key: &str) -> String {
        url.query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| panic!("query should contain {key}"))
    }

    #[rstest]
    fn link_targets_the_new_issue_page() {
        let url = issue_request_url("https://github.com/", "octo", "schedules", &params())
            .unwrap_or_else(|err| panic!("url should build: {err}"));
        assert_eq!(url.path(), "/octo/schedules/issues/new");
        assert_eq!(query(&url, "title"), "Schedule request: 12 teams, 3 tables");
    }

    #[rstest]
    fn body_lists_every_parameter() {
        let url = issue_request_url("https://github.com", "octo", "schedules", &params())
            .unwrap_or_else(|err| panic!("url should build: {err}"));
        let body = query(&url, "body");
        for expected in [
            "- **Teams:** 12",
            "- **Tables:** 3",
            "- **Jury rooms:** 7",
            "- **Matches per team:** 4",
            "- **Timeslots:** 50",
            "- **Start time:** 09:30",
        ] {
            assert!(body.contains(expected), "missing {expected} in {body}");
        }
    }

    #[rstest]
    fn special_characters_are_encoded() {
        let url = issue_request_url("https://github.com", "octo", "schedules", &params())
            .unwrap_or_else(|err| panic!("url should build: {err}"));
        let raw_query = url.query().unwrap_or_default();
        assert!(!raw_query.contains('\n'));
        assert!(!raw_query.contains(' '));
        assert!(raw_query.contains("%23%23+Tournament"), "query: {raw_query}");
        assert!(url.fragment().is_none());
    }

    #[rstest]
    fn invalid_base_is_rejected() {
        let result = issue_request_url("not a url", "octo", "schedules", &params());
        assert!(matches!(result, Err(IssueLinkError::InvalidBase { .. })));
    }
}
