use crate::activity::ActivityWindow;
use crate::error::{Result, Warning, WeeklyUpdatesError};
use crate::github::client::GitHubClient;
use crate::github::types::ContributionsData;
use crate::github::{dedup_repos, RepoRef};
use chrono::SecondsFormat;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// One `*ContributionsByRepository` list of the contributions collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionSource {
    Commits,
    Issues,
    PullRequests,
    PullRequestReviews,
}

impl ContributionSource {
    pub const ALL: [ContributionSource; 4] = [
        ContributionSource::Commits,
        ContributionSource::Issues,
        ContributionSource::PullRequests,
        ContributionSource::PullRequestReviews,
    ];

    /// GraphQL field holding this source's repositories
    pub fn field(&self) -> &'static str {
        match self {
            ContributionSource::Commits => "commitContributionsByRepository",
            ContributionSource::Issues => "issueContributionsByRepository",
            ContributionSource::PullRequests => "pullRequestContributionsByRepository",
            ContributionSource::PullRequestReviews => {
                "pullRequestReviewContributionsByRepository"
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContributionSource::Commits => "commit contributions",
            ContributionSource::Issues => "issue contributions",
            ContributionSource::PullRequests => "pull request contributions",
            ContributionSource::PullRequestReviews => "pull request review contributions",
        }
    }

    fn query(&self) -> String {
        format!(
            r#"query($user: String!, $from: DateTime!, $to: DateTime!) {{
  user(login: $user) {{
    contributionsCollection(from: $from, to: $to) {{
      {}(maxRepositories: 100) {{
        repository {{ nameWithOwner }}
      }}
    }}
  }}
}}"#,
            self.field()
        )
    }
}

/// Outcome of resolving the repositories to collect from
#[derive(Debug, Default)]
pub struct Discovery {
    /// Unique repositories, explicit order or sorted when discovered
    pub repos: Vec<RepoRef>,
    /// Sources that failed and contributed nothing
    pub warnings: Vec<Warning>,
    /// `false` when an explicit list was used and no query was issued
    pub discovered: bool,
}

/// Finds the repositories a user touched in a window
pub struct RepoDiscoverer<'a> {
    client: &'a GitHubClient,
}

impl<'a> RepoDiscoverer<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Use `explicit` verbatim when given, otherwise ask the contributions API
    pub async fn resolve(
        &self,
        explicit: Option<&[RepoRef]>,
        user: &str,
        window: &ActivityWindow,
        org: Option<&str>,
    ) -> Result<Discovery> {
        if let Some(repos) = explicit {
            let repos = dedup_repos(repos.iter().cloned());
            info!(count = repos.len(), "Using configured repos, skipping discovery");
            return Ok(Discovery {
                repos,
                warnings: Vec::new(),
                discovered: false,
            });
        }

        self.discover(user, window, org).await
    }

    /// Union of all contribution sources, filtered to `org` when set
    pub async fn discover(
        &self,
        user: &str,
        window: &ActivityWindow,
        org: Option<&str>,
    ) -> Result<Discovery> {
        info!(user, period = %window.label(), "Discovering repos");

        let variables = json!({
            "user": user,
            "from": window.since.to_rfc3339_opts(SecondsFormat::Secs, true),
            "to": window.until.to_rfc3339_opts(SecondsFormat::Secs, true),
        });

        let mut found = BTreeSet::new();
        let mut warnings = Vec::new();

        for source in ContributionSource::ALL {
            match self.query_source(source, variables.clone()).await {
                Ok(repos) => {
                    debug!(source = source.label(), count = repos.len(), "source discovered");
                    found.extend(repos);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(source = source.label(), error = %e, "Discovery source failed, treating as empty");
                    warnings.push(Warning::Discovery {
                        source: source.label().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut repos: Vec<RepoRef> = found.into_iter().collect();
        if let Some(org) = org {
            repos.retain(|repo| repo.belongs_to(org));
            info!(org, "Filtered discovered repos to org");
        }

        info!(count = repos.len(), "Discovered repos");
        Ok(Discovery {
            repos,
            warnings,
            discovered: true,
        })
    }

    async fn query_source(
        &self,
        source: ContributionSource,
        variables: serde_json::Value,
    ) -> Result<Vec<RepoRef>> {
        let data: ContributionsData = self.client.graphql(&source.query(), variables).await?;

        let Some(user) = data.user else {
            return Err(WeeklyUpdatesError::GraphQl(
                "user not found".to_string(),
            ));
        };

        let entries = user
            .contributions_collection
            .get(source.field())
            .map(|entries| entries.as_slice())
            .unwrap_or_default();

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let parsed = RepoRef::parse(&entry.repository.name_with_owner);
                if parsed.is_none() {
                    debug!(name = %entry.repository.name_with_owner, "ignoring unparsable repository");
                }
                parsed
            })
            .collect())
    }
}
