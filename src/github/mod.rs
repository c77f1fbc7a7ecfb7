pub mod client;
pub mod collector;
pub mod discovery;
pub mod types;

use crate::error::WeeklyUpdatesError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A GitHub repository, identified by `owner/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    /// Repository owner/organization
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepoRef {
    pub fn new<O: Into<String>, N: Into<String>>(owner: O, name: N) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name` or a GitHub clone URL
    ///
    /// Accepted forms:
    /// - owner/name
    /// - https://github.com/owner/name(.git)
    /// - git@github.com:owner/name(.git)
    /// - git://github.com/owner/name(.git)
    pub fn parse(input: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(
                r"^(?:https?://github\.com/|git@github\.com:|git://github\.com/)?([A-Za-z0-9][A-Za-z0-9-]*)/([A-Za-z0-9._-]+?)(?:\.git)?/?$",
            )
            .expect("repository pattern is valid")
        });

        let captures = re.captures(input.trim())?;
        let name = captures.get(2)?.as_str();
        if name == "." || name == ".." {
            return None;
        }
        Some(Self::new(captures.get(1)?.as_str(), name))
    }

    /// Parse the `repository_url` field of REST payloads
    /// (`https://api.github.com/repos/owner/name`)
    pub fn from_api_url(url: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"/repos/([^/]+)/([^/]+?)/?$").expect("api url pattern is valid")
        });

        let captures = re.captures(url.trim())?;
        Some(Self::new(
            captures.get(1)?.as_str(),
            captures.get(2)?.as_str(),
        ))
    }

    /// Whether this repository is owned by `org` (case-insensitive, like GitHub logins)
    pub fn belongs_to(&self, org: &str) -> bool {
        self.owner.eq_ignore_ascii_case(org)
    }

    /// Web URL of the repository
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = WeeklyUpdatesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            WeeklyUpdatesError::config(format!(
                "Invalid repository '{}' (expected owner/name)",
                s
            ))
        })
    }
}

/// Deduplicate repositories, keeping the first occurrence of each
pub fn dedup_repos<I: IntoIterator<Item = RepoRef>>(repos: I) -> Vec<RepoRef> {
    let mut seen = std::collections::HashSet::new();
    repos
        .into_iter()
        .filter(|repo| seen.insert(repo.clone()))
        .collect()
}
