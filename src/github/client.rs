use crate::error::{Result, WeeklyUpdatesError};
use crate::github::types::{
    ApiErrorBody, GraphQlResponse, IssueCommentPayload, IssuePayload, PullRequestDetail,
    ReviewPayload, SearchItem, SearchResponse, UserPayload,
};
use crate::github::RepoRef;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("gh-weekly-updates/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size for REST listings and search
pub const PER_PAGE: usize = 100;
/// The search API never returns more than 1000 results
const MAX_SEARCH_PAGES: u32 = 10;
const RATE_LIMIT_LOW_WATER: u64 = 5;

/// GitHub REST + GraphQL client
pub struct GitHubClient {
    client: Client,
    token: String,
    api_url: String,
    graphql_url: String,
}

impl GitHubClient {
    /// Create a new client authenticated with `token`
    pub fn new(token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token,
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
        })
    }

    /// Point the REST calls at another base URL (GHES, tests)
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Point the GraphQL calls at another endpoint
    pub fn with_graphql_url(mut self, graphql_url: String) -> Self {
        self.graphql_url = graphql_url;
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, "GET");

        let response = self
            .authorized(self.client.get(&url))
            .query(query)
            .send()
            .await?;
        let response = check_status(response).await?;
        warn_on_rate_limit(&response);

        Ok(response.json().await?)
    }

    /// Run a GraphQL query and return its `data`
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        debug!(url = %self.graphql_url, "POST graphql");

        let response = self
            .authorized(self.client.post(&self.graphql_url))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let response = check_status(response).await?;
        warn_on_rate_limit(&response);

        let body: GraphQlResponse<T> = response.json().await?;
        if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(WeeklyUpdatesError::GraphQl(messages.join("; ")));
        }

        body.data
            .ok_or_else(|| WeeklyUpdatesError::GraphQl("response carried no data".to_string()))
    }

    /// Login of the user the token belongs to
    pub async fn authenticated_user(&self) -> Result<String> {
        let user: UserPayload = self.get_json("/user", &[]).await?;
        Ok(user.login)
    }

    /// Run an issue/PR search, following pagination
    pub async fn search_issues(&self, query: &str) -> Result<Vec<SearchItem>> {
        let mut results = Vec::new();

        for page in 1..=MAX_SEARCH_PAGES {
            let response: SearchResponse = self
                .get_json(
                    "/search/issues",
                    &[
                        ("q", query.to_string()),
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let received = response.items.len();
            results.extend(response.items);

            if received < PER_PAGE || results.len() as u64 >= response.total_count {
                break;
            }
        }

        debug!(query, count = results.len(), "search complete");
        Ok(results)
    }

    pub async fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestDetail> {
        self.get_json(&format!("/repos/{}/pulls/{}", repo, number), &[])
            .await
    }

    pub async fn pull_request_reviews(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<ReviewPayload>> {
        self.get_json(
            &format!("/repos/{}/pulls/{}/reviews", repo, number),
            &[("per_page", PER_PAGE.to_string())],
        )
        .await
    }

    pub async fn issue(&self, repo: &RepoRef, number: u64) -> Result<IssuePayload> {
        self.get_json(&format!("/repos/{}/issues/{}", repo, number), &[])
            .await
    }

    /// Issue and PR conversation comments in `repo` created at or after `since`, newest first
    pub async fn issue_comments_since(
        &self,
        repo: &RepoRef,
        since: &DateTime<Utc>,
    ) -> Result<Vec<IssueCommentPayload>> {
        let path = format!("/repos/{}/issues/comments", repo);
        let since_param = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut results = Vec::new();
        let mut page = 1u32;

        loop {
            let comments: Vec<IssueCommentPayload> = self
                .get_json(
                    &path,
                    &[
                        ("since", since_param.clone()),
                        ("sort", "created".to_string()),
                        ("direction", "desc".to_string()),
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let received = comments.len();
            // `since` filters on update time; sorted by creation, older ones end the listing
            let mut reached_older = false;
            for comment in comments {
                if comment.created_at < *since {
                    reached_older = true;
                    break;
                }
                results.push(comment);
            }

            if reached_older || received < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(results)
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                text
            }
        });

    if status == StatusCode::UNAUTHORIZED {
        return Err(WeeklyUpdatesError::auth(format!(
            "GitHub rejected the token (HTTP 401): {}",
            message
        )));
    }

    Err(WeeklyUpdatesError::Api {
        status: status.as_u16(),
        message,
    })
}

fn warn_on_rate_limit(response: &Response) {
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(remaining) = remaining {
        if remaining < RATE_LIMIT_LOW_WATER {
            let reset = response
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            warn!(remaining, reset, "GitHub rate limit nearly exhausted");
        }
    }
}
