//! Wire types for the GitHub REST and GraphQL responses we consume.
//!
//! Only the fields the collector reads are declared; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// `GET /search/issues`
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub user: Option<Login>,
    #[serde(default)]
    pub repository_url: Option<String>,
}

impl SearchItem {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn is_authored_by(&self, username: &str) -> bool {
        self.user
            .as_ref()
            .map(|u| u.login.eq_ignore_ascii_case(username))
            .unwrap_or(false)
    }
}

/// `GET /repos/{owner}/{repo}/pulls/{number}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestDetail {
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
}

/// `GET /repos/{owner}/{repo}/pulls/{number}/reviews`
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPayload {
    #[serde(default)]
    pub user: Option<Login>,
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
}

/// `GET /repos/{owner}/{repo}/issues/comments`
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentPayload {
    pub html_url: String,
    pub issue_url: String,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<Login>,
}

/// `GET /repos/{owner}/{repo}/issues/{number}`
#[derive(Debug, Clone, Deserialize)]
pub struct IssuePayload {
    pub title: String,
}

/// `GET /user`
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub login: String,
}

/// Error body returned by the REST API
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

/// Envelope of every GraphQL response
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Data of the contributions discovery query
#[derive(Debug, Deserialize)]
pub struct ContributionsData {
    pub user: Option<ContributionsUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionsUser {
    /// Keyed by the `*ContributionsByRepository` field that was queried
    pub contributions_collection: HashMap<String, Vec<RepoContribution>>,
}

#[derive(Debug, Deserialize)]
pub struct RepoContribution {
    pub repository: NameWithOwner,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameWithOwner {
    pub name_with_owner: String,
}

/// Data of the repository discussions query
#[derive(Debug, Deserialize)]
pub struct DiscussionsData {
    pub repository: Option<DiscussionsRepository>,
}

#[derive(Debug, Deserialize)]
pub struct DiscussionsRepository {
    pub discussions: Option<DiscussionConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionConnection {
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<DiscussionNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionNode {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryName>,
    #[serde(default)]
    pub author: Option<Login>,
    #[serde(default)]
    pub comments: Option<CommentConnection>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryName {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentConnection {
    #[serde(default)]
    pub nodes: Vec<DiscussionCommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionCommentNode {
    pub url: String,
    #[serde(default)]
    pub author: Option<Login>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Login of an optional author, empty for deleted ("ghost") accounts
pub fn login_of(author: &Option<Login>) -> &str {
    author.as_ref().map(|a| a.login.as_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_item_deserialization() {
        let item: SearchItem = serde_json::from_value(json!({
            "number": 42,
            "title": "feat: awesome",
            "html_url": "https://github.com/octo/widgets/pull/42",
            "state": "closed",
            "created_at": "2025-06-03T10:00:00Z",
            "labels": [{"name": "enhancement"}],
            "user": {"login": "octocat"},
            "repository_url": "https://api.github.com/repos/octo/widgets",
            "unexpected": true
        }))
        .unwrap();

        assert_eq!(item.number, 42);
        assert_eq!(item.label_names(), vec!["enhancement".to_string()]);
        assert!(item.is_authored_by("OctoCat"));
        assert!(item.body.is_none());
    }

    #[test]
    fn test_contributions_deserialization() {
        let data: GraphQlResponse<ContributionsData> = serde_json::from_value(json!({
            "data": {"user": {"contributionsCollection": {
                "pullRequestContributionsByRepository": [
                    {"repository": {"nameWithOwner": "octo/widgets"}}
                ]
            }}}
        }))
        .unwrap();

        let user = data.data.unwrap().user.unwrap();
        let entries = &user.contributions_collection["pullRequestContributionsByRepository"];
        assert_eq!(entries[0].repository.name_with_owner, "octo/widgets");
    }

    #[test]
    fn test_graphql_errors_deserialization() {
        let data: GraphQlResponse<ContributionsData> = serde_json::from_value(json!({
            "data": null,
            "errors": [{"message": "Could not resolve to a User"}]
        }))
        .unwrap();
        assert!(data.data.is_none());
        assert_eq!(data.errors.unwrap()[0].message, "Could not resolve to a User");
    }

    #[test]
    fn test_login_of_ghost() {
        assert_eq!(login_of(&None), "");
        assert_eq!(
            login_of(&Some(Login {
                login: "octocat".to_string()
            })),
            "octocat"
        );
    }
}
