use crate::activity::ActivityWindow;
use crate::ai::models::{DEFAULT_MODEL, DEFAULT_MODELS_URL};
use crate::cli::Cli;
use crate::error::{Result, WeeklyUpdatesError};
use crate::github::client::{DEFAULT_API_URL, DEFAULT_GRAPHQL_URL};
use crate::github::{dedup_repos, RepoRef};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Contents of the YAML config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// GitHub login to report on (default: the token's user)
    pub user: Option<String>,

    /// Only keep discovered repos owned by this org
    pub org: Option<String>,

    /// Explicit `owner/name` list; skips discovery
    pub repos: Option<Vec<String>>,

    /// Model identifier for the summariser
    pub model: Option<String>,

    /// `owner/name` to commit the report into
    pub push_repo: Option<String>,

    /// Inline system prompt
    pub prompt: Option<String>,

    /// System prompt file, takes precedence over `prompt`
    pub prompt_file: Option<PathBuf>,

    pub github_api_url: Option<String>,
    pub github_graphql_url: Option<String>,
    pub models_url: Option<String>,
}

impl FileConfig {
    /// Load from `explicit`, or from the first default location that exists.
    ///
    /// Returns the defaults when no file is found. An explicit path that does
    /// not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(WeeklyUpdatesError::ConfigNotFound(path.to_path_buf()));
            }
            return Ok((Self::load_from(path)?, Some(path.to_path_buf())));
        }

        for candidate in Self::candidate_paths() {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "loading config");
                return Ok((Self::load_from(&candidate)?, Some(candidate)));
            }
        }

        debug!("no config file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// An empty or `null` document is an empty config
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Option<FileConfig> = serde_yaml::from_str(contents)?;
        Ok(config.unwrap_or_default())
    }

    /// `./config.yaml`, then the per-user config
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Ok(path) = Self::default_config_path() {
            paths.push(path);
        }
        paths
    }

    /// Get the per-user config path (~/.config/gh-weekly-updates/config.yaml)
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| WeeklyUpdatesError::config("Could not determine home directory"))?;
        Ok(home
            .join(".config")
            .join("gh-weekly-updates")
            .join(CONFIG_FILE_NAME))
    }
}

/// Where the system prompt comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Default,
    Inline(String),
    File(PathBuf),
}

impl PromptSource {
    /// Custom prompt text, or `None` for the built-in prompt
    pub fn load(&self) -> Result<Option<String>> {
        match self {
            PromptSource::Default => Ok(None),
            PromptSource::Inline(text) => Ok(Some(text.clone())),
            PromptSource::File(path) => fs::read_to_string(path).map(Some).map_err(|e| {
                WeeklyUpdatesError::config(format!(
                    "cannot read prompt_file {}: {}",
                    path.display(),
                    e
                ))
            }),
        }
    }
}

/// Effective settings for one run, CLI flags over file values
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub user: Option<String>,
    pub org: Option<String>,
    /// `Some` skips discovery
    pub repos: Option<Vec<RepoRef>>,
    pub model: String,
    pub prompt: PromptSource,
    pub push: Option<RepoRef>,
    pub output: Option<PathBuf>,
    pub window: ActivityWindow,
    pub github_api_url: String,
    pub github_graphql_url: String,
    pub models_url: String,
}

impl RunConfig {
    /// Merge flags and file field by field. Performs no I/O.
    pub fn merge(cli: &Cli, file: &FileConfig, now: DateTime<Utc>) -> Result<Self> {
        let window = ActivityWindow::resolve(cli.since.as_deref(), cli.until.as_deref(), now)?;

        let repo_specs = cli
            .repos
            .as_deref()
            .or(file.repos.as_deref())
            .unwrap_or_default();
        let repos = parse_repos(repo_specs)?;

        let push = cli
            .push
            .as_deref()
            .or(file.push_repo.as_deref())
            .map(|spec| spec.parse::<RepoRef>())
            .transpose()?;

        let prompt = match (&file.prompt_file, &file.prompt) {
            (Some(path), _) => PromptSource::File(path.clone()),
            (None, Some(text)) if !text.trim().is_empty() => PromptSource::Inline(text.clone()),
            _ => PromptSource::Default,
        };

        Ok(Self {
            user: non_empty(cli.user.as_ref().or(file.user.as_ref())),
            org: non_empty(cli.org.as_ref().or(file.org.as_ref())),
            repos,
            model: non_empty(cli.model.as_ref().or(file.model.as_ref()))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompt,
            push,
            output: cli.output.clone(),
            window,
            github_api_url: file
                .github_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            github_graphql_url: file
                .github_graphql_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string()),
            models_url: file
                .models_url
                .clone()
                .unwrap_or_else(|| DEFAULT_MODELS_URL.to_string()),
        })
    }
}

/// Parse `owner/name` entries, ignoring blanks. An empty result means "discover".
fn parse_repos(specs: &[String]) -> Result<Option<Vec<RepoRef>>> {
    let repos = specs
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<RepoRef>())
        .collect::<Result<Vec<_>>>()?;

    if repos.is_empty() {
        Ok(None)
    } else {
        Ok(Some(dedup_repos(repos)))
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
