use crate::activity::{ActivityBundle, ActivityItem, ActivityKind, ActivityWindow};
use crate::error::{Result, Warning};
use crate::github::client::GitHubClient;
use crate::github::types::{login_of, DiscussionsData, PullRequestDetail, SearchItem};
use crate::github::RepoRef;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const DISCUSSIONS_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    discussions(first: 50, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number
        title
        url
        createdAt
        body
        category { name }
        author { login }
        comments(first: 50) {
          nodes {
            url
            author { login }
            body
            createdAt
          }
        }
      }
    }
  }
}
"#;

const MAX_DISCUSSION_PAGES: usize = 5;

/// Where to collect from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionScope {
    /// Query each repository in turn
    Repos(Vec<RepoRef>),
    /// Search across all of GitHub without a repo qualifier, restricted to
    /// the collector's org when one is set
    Global,
}

/// One kind of query issued by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    PullRequestsAuthored,
    PullRequestsReviewed,
    IssuesCreated,
    IssueComments,
    Discussions,
}

impl Query {
    pub const ALL: [Query; 5] = [
        Query::PullRequestsAuthored,
        Query::PullRequestsReviewed,
        Query::IssuesCreated,
        Query::IssueComments,
        Query::Discussions,
    ];

    /// Queries that can run without a repository
    pub const GLOBAL: [Query; 3] = [
        Query::PullRequestsAuthored,
        Query::PullRequestsReviewed,
        Query::IssuesCreated,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Query::PullRequestsAuthored => "PRs authored",
            Query::PullRequestsReviewed => "PRs reviewed",
            Query::IssuesCreated => "issues created",
            Query::IssueComments => "issue comments",
            Query::Discussions => "discussions",
        }
    }
}

/// Collected activity plus the queries that failed along the way
#[derive(Debug)]
pub struct Collection {
    pub bundle: ActivityBundle,
    pub warnings: Vec<Warning>,
}

/// Fetches a user's activity within a window
pub struct ActivityCollector<'a> {
    client: &'a GitHubClient,
    username: &'a str,
    window: &'a ActivityWindow,
    org: Option<&'a str>,
}

impl<'a> ActivityCollector<'a> {
    pub fn new(client: &'a GitHubClient, username: &'a str, window: &'a ActivityWindow) -> Self {
        Self {
            client,
            username,
            window,
            org: None,
        }
    }

    /// Keep global searches inside `org`
    pub fn with_org(mut self, org: Option<&'a str>) -> Self {
        self.org = org;
        self
    }

    /// Run every query for the scope, sequentially.
    ///
    /// A failing query is logged and contributes nothing; only authentication
    /// failures abort collection.
    pub async fn collect(&self, scope: &CollectionScope) -> Result<Collection> {
        let repos = match scope {
            CollectionScope::Repos(repos) => repos.clone(),
            CollectionScope::Global => Vec::new(),
        };
        let mut bundle = ActivityBundle::new(self.username, self.window.clone(), repos);
        let mut warnings = Vec::new();

        match scope {
            CollectionScope::Repos(repos) => {
                for repo in repos {
                    info!(repo = %repo, "Collecting activity");
                    for query in Query::ALL {
                        let result = self.run(query, Some(repo)).await;
                        self.absorb(&mut bundle, &mut warnings, &repo.to_string(), query, result)?;
                    }
                }
            }
            CollectionScope::Global => {
                info!(org = ?self.org, "Collecting activity across all repositories");
                for query in Query::GLOBAL {
                    let result = self.run(query, None).await;
                    self.absorb(&mut bundle, &mut warnings, "all repositories", query, result)?;
                }
            }
        }

        info!(
            total = bundle.counts().total(),
            repos = bundle.repos().len(),
            warnings = warnings.len(),
            "Collection complete"
        );
        Ok(Collection { bundle, warnings })
    }

    fn absorb(
        &self,
        bundle: &mut ActivityBundle,
        warnings: &mut Vec<Warning>,
        scope: &str,
        query: Query,
        result: Result<Vec<ActivityItem>>,
    ) -> Result<()> {
        match result {
            Ok(items) => {
                let added = bundle.extend(items);
                debug!(scope, query = query.label(), added, "query complete");
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                if e.is_access_error() {
                    warn!(scope, query = query.label(), error = %e, "Skipping (token may lack access)");
                } else {
                    warn!(scope, query = query.label(), error = %e, "Query failed, skipping");
                }
                warnings.push(Warning::Collection {
                    scope: scope.to_string(),
                    query: query.label().to_string(),
                    message: e.to_string(),
                });
                Ok(())
            }
        }
    }

    async fn run(&self, query: Query, repo: Option<&RepoRef>) -> Result<Vec<ActivityItem>> {
        match (query, repo) {
            (Query::PullRequestsAuthored, repo) => self.pull_requests_authored(repo).await,
            (Query::PullRequestsReviewed, repo) => self.pull_requests_reviewed(repo).await,
            (Query::IssuesCreated, repo) => self.issues_created(repo).await,
            (Query::IssueComments, Some(repo)) => self.issue_comments(repo).await,
            (Query::Discussions, Some(repo)) => self.discussions(repo).await,
            (Query::IssueComments | Query::Discussions, None) => Ok(Vec::new()),
        }
    }

    fn search_query(&self, qualifiers: &str, repo: Option<&RepoRef>) -> String {
        match (repo, self.org) {
            (Some(repo), _) => format!("{} repo:{}", qualifiers, repo),
            (None, Some(org)) => format!("{} org:{}", qualifiers, org),
            (None, None) => qualifiers.to_string(),
        }
    }

    /// Repository of a search hit: the scoped repo, or parsed from
    /// `repository_url` and dropped when it lies outside the org
    fn repo_of(&self, item: &SearchItem, scoped: Option<&RepoRef>) -> Option<RepoRef> {
        if let Some(repo) = scoped {
            return Some(repo.clone());
        }
        let repo = item
            .repository_url
            .as_deref()
            .and_then(RepoRef::from_api_url)?;
        match self.org {
            Some(org) if !repo.belongs_to(org) => {
                debug!(repo = %repo, org, "search hit outside org, skipping");
                None
            }
            _ => Some(repo),
        }
    }

    async fn pull_requests_authored(&self, scoped: Option<&RepoRef>) -> Result<Vec<ActivityItem>> {
        let query = self.search_query(
            &format!(
                "author:{} type:pr created:{}",
                self.username,
                self.window.search_range()
            ),
            scoped,
        );

        let mut items = Vec::new();
        for hit in self.client.search_issues(&query).await? {
            if !self.window.contains(&hit.created_at) {
                continue;
            }
            let Some(repo) = self.repo_of(&hit, scoped) else {
                continue;
            };

            // Without details the search hit still stands, minus diff stats
            let detail = match self.client.pull_request(&repo, hit.number).await {
                Ok(detail) => detail,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(repo = %repo, number = hit.number, error = %e, "PR details unavailable");
                    PullRequestDetail::default()
                }
            };
            let state = if detail.merged_at.is_some() {
                "merged".to_string()
            } else {
                hit.state.clone()
            };

            items.push(ActivityItem {
                repo,
                number: hit.number,
                title: hit.title.clone(),
                url: hit.html_url.clone(),
                timestamp: hit.created_at,
                state,
                body: hit.body.clone(),
                kind: ActivityKind::PullRequest {
                    merged_at: detail.merged_at,
                    additions: detail.additions,
                    deletions: detail.deletions,
                    changed_files: detail.changed_files,
                    labels: hit.label_names(),
                },
            });
        }
        Ok(items)
    }

    async fn pull_requests_reviewed(&self, scoped: Option<&RepoRef>) -> Result<Vec<ActivityItem>> {
        let query = self.search_query(
            &format!(
                "reviewed-by:{} type:pr updated:{}",
                self.username,
                self.window.search_range()
            ),
            scoped,
        );

        let mut items = Vec::new();
        for hit in self.client.search_issues(&query).await? {
            // Self-reviews of authored PRs are already covered
            if hit.is_authored_by(self.username) {
                continue;
            }
            let Some(repo) = self.repo_of(&hit, scoped) else {
                continue;
            };

            let reviews = match self.client.pull_request_reviews(&repo, hit.number).await {
                Ok(reviews) => reviews,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(repo = %repo, number = hit.number, error = %e, "Reviews unavailable, skipping PR");
                    continue;
                }
            };
            for review in reviews {
                if !login_of(&review.user).eq_ignore_ascii_case(self.username)
                    || review.state == "PENDING"
                {
                    continue;
                }
                let Some(submitted_at) = review.submitted_at else {
                    continue;
                };
                if !self.window.contains(&submitted_at) {
                    continue;
                }

                items.push(ActivityItem {
                    repo: repo.clone(),
                    number: hit.number,
                    title: hit.title.clone(),
                    url: review.html_url,
                    timestamp: submitted_at,
                    state: review.state,
                    body: review.body.filter(|b| !b.trim().is_empty()),
                    kind: ActivityKind::Review {
                        pr_url: hit.html_url.clone(),
                    },
                });
            }
        }
        Ok(items)
    }

    async fn issues_created(&self, scoped: Option<&RepoRef>) -> Result<Vec<ActivityItem>> {
        let query = self.search_query(
            &format!(
                "author:{} type:issue created:{}",
                self.username,
                self.window.search_range()
            ),
            scoped,
        );

        let mut items = Vec::new();
        for hit in self.client.search_issues(&query).await? {
            if !self.window.contains(&hit.created_at) {
                continue;
            }
            let Some(repo) = self.repo_of(&hit, scoped) else {
                continue;
            };

            items.push(ActivityItem {
                repo,
                number: hit.number,
                title: hit.title.clone(),
                url: hit.html_url.clone(),
                timestamp: hit.created_at,
                state: hit.state.clone(),
                body: hit.body.clone(),
                kind: ActivityKind::Issue {
                    labels: hit.label_names(),
                    comments: hit.comments,
                },
            });
        }
        Ok(items)
    }

    async fn issue_comments(&self, repo: &RepoRef) -> Result<Vec<ActivityItem>> {
        let comments = self
            .client
            .issue_comments_since(repo, &self.window.since)
            .await?;

        let mut titles: HashMap<u64, String> = HashMap::new();
        let mut items = Vec::new();

        for comment in comments {
            if !login_of(&comment.user).eq_ignore_ascii_case(self.username)
                || !self.window.contains(&comment.created_at)
            {
                continue;
            }

            let number = issue_number_from_url(&comment.issue_url).unwrap_or(0);
            let issue_url = comment
                .html_url
                .split('#')
                .next()
                .unwrap_or(&comment.html_url)
                .to_string();

            if !titles.contains_key(&number) {
                let title = match self.client.issue(repo, number).await {
                    Ok(issue) => issue.title,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        debug!(repo = %repo, number, error = %e, "issue title lookup failed");
                        format!("#{}", number)
                    }
                };
                titles.insert(number, title);
            }

            items.push(ActivityItem {
                repo: repo.clone(),
                number,
                title: titles.get(&number).cloned().unwrap_or_default(),
                url: comment.html_url,
                timestamp: comment.created_at,
                state: "commented".to_string(),
                body: comment.body,
                kind: ActivityKind::IssueComment { issue_url },
            });
        }
        Ok(items)
    }

    async fn discussions(&self, repo: &RepoRef) -> Result<Vec<ActivityItem>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_DISCUSSION_PAGES {
            let data: DiscussionsData = self
                .client
                .graphql(
                    DISCUSSIONS_QUERY,
                    json!({ "owner": repo.owner, "name": repo.name, "cursor": cursor }),
                )
                .await?;

            let Some(connection) = data.repository.and_then(|r| r.discussions) else {
                break;
            };

            for node in connection.nodes {
                // Newest first: everything after this is older than the window
                if node.created_at < self.window.since {
                    return Ok(items);
                }

                if node.created_at <= self.window.until
                    && login_of(&node.author).eq_ignore_ascii_case(self.username)
                {
                    items.push(ActivityItem {
                        repo: repo.clone(),
                        number: node.number,
                        title: node.title.clone(),
                        url: node.url.clone(),
                        timestamp: node.created_at,
                        state: "created".to_string(),
                        body: node.body.clone(),
                        kind: ActivityKind::Discussion {
                            category: node.category.as_ref().map(|c| c.name.clone()),
                        },
                    });
                }

                let comments = node.comments.map(|c| c.nodes).unwrap_or_default();
                for comment in comments {
                    if !login_of(&comment.author).eq_ignore_ascii_case(self.username)
                        || !self.window.contains(&comment.created_at)
                    {
                        continue;
                    }
                    items.push(ActivityItem {
                        repo: repo.clone(),
                        number: node.number,
                        title: node.title.clone(),
                        url: comment.url,
                        timestamp: comment.created_at,
                        state: "commented".to_string(),
                        body: comment.body,
                        kind: ActivityKind::DiscussionComment {
                            discussion_url: node.url.clone(),
                        },
                    });
                }
            }

            if !connection.page_info.has_next_page {
                break;
            }
            cursor = connection.page_info.end_cursor;
        }

        Ok(items)
    }
}

/// Trailing number of an `.../issues/{number}` API URL
fn issue_number_from_url(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}
