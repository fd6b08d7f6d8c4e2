//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::poller::PollSettings;

/// Default GitHub API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
/// Default GitHub web endpoint used for browser links.
pub const DEFAULT_WEB_BASE_URL: &str = "https://github.com";

/// Coordinates of the remote scheduling workflow and polling behaviour,
/// merged from defaults, `ffl.toml`, and `FFL_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FFL",
    discovery(
        app_name = "ffl-dispatch",
        env_var = "FFL_CONFIG_PATH",
        config_file_name = "ffl.toml",
        dotfile_name = ".ffl.toml",
        project_file_name = "ffl.toml"
    )
)]
pub struct WorkflowConfig {
    /// Owner (user or organisation) of the repository hosting the workflow.
    #[ortho_config(default = "koenvanwijk".to_owned())]
    pub owner: String,
    /// Repository hosting the workflow.
    #[ortho_config(default = "ffl-schedule".to_owned())]
    pub repo: String,
    /// Workflow file name under `.github/workflows`.
    #[ortho_config(default = "generate-schedule.yml".to_owned())]
    pub workflow_file: String,
    /// Branch the workflow is dispatched against.
    #[ortho_config(default = "main".to_owned())]
    pub git_ref: String,
    /// Base URL of the REST API.
    #[ortho_config(default = DEFAULT_API_BASE_URL.to_owned())]
    pub api_base_url: String,
    /// Base URL of the web front-end, used for issue request links.
    #[ortho_config(default = DEFAULT_WEB_BASE_URL.to_owned())]
    pub web_base_url: String,
    /// Seconds between status polls.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Seconds to wait after dispatch before the first poll.
    #[ortho_config(default = 5)]
    pub settling_delay_secs: u64,
    /// Maximum number of status polls before giving up.
    #[ortho_config(default = 90)]
    pub max_poll_attempts: u32,
    /// Overall wall-clock limit for polling, in seconds.
    #[ortho_config(default = 1800)]
    pub wait_timeout_secs: u64,
    /// Tolerated difference between the local and remote clocks when
    /// matching a run to its dispatch, in seconds.
    #[ortho_config(default = 5)]
    pub clock_skew_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to ffl.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl WorkflowConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(metadata.missing());
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("ffl-dispatch")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// or a polling bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.owner,
            &FieldMetadata::new("repository owner", "FFL_OWNER", "owner"),
        )?;
        Self::require_field(
            &self.repo,
            &FieldMetadata::new("repository name", "FFL_REPO", "repo"),
        )?;
        Self::require_field(
            &self.workflow_file,
            &FieldMetadata::new("workflow file", "FFL_WORKFLOW_FILE", "workflow_file"),
        )?;
        Self::require_field(
            &self.git_ref,
            &FieldMetadata::new("target branch", "FFL_GIT_REF", "git_ref"),
        )?;
        Self::require_field(
            &self.api_base_url,
            &FieldMetadata::new("API base URL", "FFL_API_BASE_URL", "api_base_url"),
        )?;
        Self::require_field(
            &self.web_base_url,
            &FieldMetadata::new("web base URL", "FFL_WEB_BASE_URL", "web_base_url"),
        )?;
        Self::require_positive(
            self.settling_delay_secs,
            &FieldMetadata::new(
                "settling delay",
                "FFL_SETTLING_DELAY_SECS",
                "settling_delay_secs",
            ),
        )?;
        Self::require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "FFL_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_positive(
            u64::from(self.max_poll_attempts),
            &FieldMetadata::new(
                "poll attempt limit",
                "FFL_MAX_POLL_ATTEMPTS",
                "max_poll_attempts",
            ),
        )?;
        Self::require_positive(
            self.wait_timeout_secs,
            &FieldMetadata::new("wait timeout", "FFL_WAIT_TIMEOUT_SECS", "wait_timeout_secs"),
        )?;
        Ok(())
    }

    /// Polling bounds derived from this configuration.
    #[must_use]
    pub const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            settling_delay: Duration::from_secs(self.settling_delay_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_poll_attempts,
            timeout: Duration::from_secs(self.wait_timeout_secs),
            clock_skew: Duration::from_secs(self.clock_skew_secs),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when the HTTP client cannot be built from the configuration.
    #[error("failed to initialise HTTP client: {0}")]
    HttpClient(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
