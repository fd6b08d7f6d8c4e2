//! Persistent storage for the remote API bearer credential.
//!
//! The credential lives in a small TOML file located with `OrthoConfig`'s
//! discovery search order, separate from `ffl.toml` so the token never ends
//! up in a project checkout by accident.

use std::env;
use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::ConfigDiscovery;
use thiserror::Error;
use tracing::warn;

use ortho_config::toml;

use crate::api::ApiError;

const APP_NAME: &str = "ffl-dispatch";
/// Environment variable naming an explicit credential file.
pub const CREDENTIALS_PATH_ENV: &str = "FFL_CREDENTIALS_PATH";
const CREDENTIALS_FILE_NAME: &str = "credentials.toml";
const DOTFILE_NAME: &str = ".ffl-credentials.toml";
const PROJECT_FILE_NAME: &str = ".ffl-credentials.toml";
const GITHUB_SECTION: &str = "github";
const TOKEN_KEY: &str = "token";

/// Opaque bearer token used to authenticate API calls.
#[derive(Clone, Eq, PartialEq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token, trimming surrounding whitespace.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_owned())
    }

    /// Returns the raw token for use in an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the token is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Errors raised while reading or updating the credential file.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Raised when no credential file candidates are available.
    #[error("no credential file candidates were discovered")]
    NoCandidates,
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when parsing existing TOML content fails.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when existing TOML has an unexpected structure.
    #[error("invalid credentials in {path}: {message}")]
    InvalidStructure {
        /// Path that had invalid content.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Capability to read and update the stored credential.
///
/// Components receive a provider explicitly so tests can swap in an
/// in-memory fake.
pub trait CredentialProvider {
    /// Returns the stored credential, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the backing store cannot be read.
    fn get(&self) -> Result<Option<Credential>, CredentialError>;

    /// Stores a credential, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the backing store cannot be written.
    fn set(&self, credential: &Credential) -> Result<(), CredentialError>;

    /// Removes the stored credential. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the backing store cannot be written.
    fn clear(&self) -> Result<(), CredentialError>;
}

/// Clears the stored credential when `err` reports it as rejected.
///
/// A failure to clear is logged rather than returned so the original API
/// error still reaches the caller.
pub(crate) fn forget_if_unauthorized<C: CredentialProvider>(credentials: &C, err: &ApiError) {
    if !err.is_unauthorized() {
        return;
    }
    warn!("remote service rejected the stored credential; clearing it");
    if let Err(clear_err) = credentials.clear() {
        warn!(error = %clear_err, "failed to clear rejected credential");
    }
}

/// Stores the credential in `credentials.toml` under `[github] token`.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    location: Location,
}

#[derive(Clone, Debug)]
enum Location {
    Discovered(ConfigDiscovery),
    Fixed(Utf8PathBuf),
}

impl FileCredentialStore {
    /// Builds a store using the standard discovery settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            location: Location::Discovered(
                ConfigDiscovery::builder(APP_NAME)
                    .env_var(CREDENTIALS_PATH_ENV)
                    .config_file_name(CREDENTIALS_FILE_NAME)
                    .dotfile_name(DOTFILE_NAME)
                    .project_file_name(PROJECT_FILE_NAME)
                    .build(),
            ),
        }
    }

    /// Builds a store bound to `FFL_CREDENTIALS_PATH` when it is set, and a
    /// discovering store otherwise.
    #[must_use]
    pub fn from_env() -> Self {
        env::var(CREDENTIALS_PATH_ENV)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map_or_else(Self::new, Self::at)
    }

    /// Builds a store using an explicit discovery configuration.
    #[must_use]
    pub const fn with_discovery(discovery: ConfigDiscovery) -> Self {
        Self {
            location: Location::Discovered(discovery),
        }
    }

    /// Builds a store bound to a single file path.
    #[must_use]
    pub fn at(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            location: Location::Fixed(path.into()),
        }
    }

    fn resolve_target(&self) -> Result<Target, CredentialError> {
        let candidates = match &self.location {
            Location::Fixed(path) => vec![path.clone()],
            Location::Discovered(discovery) => discovery.utf8_candidates(),
        };
        if candidates.is_empty() {
            return Err(CredentialError::NoCandidates);
        }

        for candidate in &candidates {
            if path_exists(candidate)? {
                return Ok(Target {
                    path: candidate.clone(),
                    exists: true,
                });
            }
        }

        let fallback = candidates
            .first()
            .cloned()
            .ok_or(CredentialError::NoCandidates)?;
        Ok(Target {
            path: fallback,
            exists: false,
        })
    }

    fn load(&self) -> Result<(Target, toml::Value), CredentialError> {
        let target = self.resolve_target()?;
        let contents = if target.exists {
            read_file(&target.path)?
        } else {
            String::new()
        };
        let value = parse_toml(&target.path, &contents)?;
        Ok((target, value))
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for FileCredentialStore {
    fn get(&self) -> Result<Option<Credential>, CredentialError> {
        let (target, value) = self.load()?;
        if !target.exists {
            return Ok(None);
        }
        let token = read_token(&target.path, &value)?;
        Ok(token
            .map(Credential::new)
            .filter(|credential| !credential.is_empty()))
    }

    fn set(&self, credential: &Credential) -> Result<(), CredentialError> {
        let (target, mut value) = self.load()?;
        github_section_mut(&target.path, &mut value)?.insert(
            String::from(TOKEN_KEY),
            toml::Value::String(credential.expose().to_owned()),
        );
        write_file(&target.path, &value)
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let (target, mut value) = self.load()?;
        if !target.exists {
            return Ok(());
        }
        if github_section_mut(&target.path, &mut value)?
            .remove(TOKEN_KEY)
            .is_none()
        {
            return Ok(());
        }
        write_file(&target.path, &value)
    }
}

#[derive(Clone, Debug)]
struct Target {
    path: Utf8PathBuf,
    exists: bool,
}

fn split_path(path: &Utf8Path) -> Result<(&Utf8Path, &str), CredentialError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| CredentialError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("credential file path is missing a filename"),
        })?;
    Ok((parent, file_name))
}

fn path_exists(path: &Utf8Path) -> Result<bool, CredentialError> {
    let (parent, file_name) = split_path(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir
            .try_exists(file_name)
            .map_err(|err| CredentialError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(CredentialError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn read_file(path: &Utf8Path) -> Result<String, CredentialError> {
    let (parent, file_name) = split_path(path)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| CredentialError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;

    dir.read_to_string(file_name)
        .map_err(|err| CredentialError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn parse_toml(path: &Utf8Path, contents: &str) -> Result<toml::Value, CredentialError> {
    if contents.trim().is_empty() {
        return Ok(toml::Value::Table(toml::value::Table::new()));
    }

    toml::from_str(contents).map_err(|err| CredentialError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn read_token(path: &Utf8Path, value: &toml::Value) -> Result<Option<String>, CredentialError> {
    let table = value
        .as_table()
        .ok_or_else(|| CredentialError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("credential file root is not a table"),
        })?;

    let Some(section) = table.get(GITHUB_SECTION) else {
        return Ok(None);
    };

    let section_table = section
        .as_table()
        .ok_or_else(|| CredentialError::InvalidStructure {
            path: path.to_path_buf(),
            message: format!("[{GITHUB_SECTION}] must be a table"),
        })?;

    section_table.get(TOKEN_KEY).map_or(Ok(None), |raw| {
        raw.as_str()
            .map(|token| Some(token.to_owned()))
            .ok_or_else(|| CredentialError::InvalidStructure {
                path: path.to_path_buf(),
                message: format!("{GITHUB_SECTION}.{TOKEN_KEY} must be a string"),
            })
    })
}

fn github_section_mut<'a>(
    path: &Utf8Path,
    value: &'a mut toml::Value,
) -> Result<&'a mut toml::value::Table, CredentialError> {
    let table = value
        .as_table_mut()
        .ok_or_else(|| CredentialError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("credential file root is not a table"),
        })?;

    table
        .entry(String::from(GITHUB_SECTION))
        .or_insert_with(|| toml::Value::Table(toml::value::Table::new()))
        .as_table_mut()
        .ok_or_else(|| CredentialError::InvalidStructure {
            path: path.to_path_buf(),
            message: format!("[{GITHUB_SECTION}] must be a table"),
        })
}

fn write_file(path: &Utf8Path, value: &toml::Value) -> Result<(), CredentialError> {
    let (parent, file_name) = split_path(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| {
        CredentialError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }
    })?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| CredentialError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;

    let rendered = toml::to_string_pretty(value).map_err(|err| CredentialError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    dir.write(file_name, rendered)
        .map_err(|err| CredentialError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}
