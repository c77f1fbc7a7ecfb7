pub mod window;

pub use window::ActivityWindow;

use crate::github::RepoRef;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A single piece of GitHub activity
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityItem {
    /// Repository the activity happened in
    pub repo: RepoRef,
    /// PR, issue or discussion number
    pub number: u64,
    /// Title of the PR/issue/discussion
    pub title: String,
    /// Link to the item itself (comment and review anchors included)
    pub url: String,
    /// When the activity happened
    pub timestamp: DateTime<Utc>,
    /// State or outcome (open, closed, merged, APPROVED, ...)
    pub state: String,
    /// Description, review or comment text
    pub body: Option<String>,
    /// Variant-specific details
    pub kind: ActivityKind,
}

/// Variant-specific payload of an [`ActivityItem`]
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityKind {
    PullRequest {
        merged_at: Option<DateTime<Utc>>,
        additions: u64,
        deletions: u64,
        changed_files: u64,
        labels: Vec<String>,
    },
    Review {
        pr_url: String,
    },
    Issue {
        labels: Vec<String>,
        comments: u64,
    },
    IssueComment {
        issue_url: String,
    },
    Discussion {
        category: Option<String>,
    },
    DiscussionComment {
        discussion_url: String,
    },
}

/// Discriminant of [`ActivityKind`], in presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KindTag {
    PullRequest,
    Review,
    Issue,
    IssueComment,
    Discussion,
    DiscussionComment,
}

impl KindTag {
    /// Section heading used in prompts and console output
    pub fn heading(&self) -> &'static str {
        match self {
            KindTag::PullRequest => "Pull Requests Authored",
            KindTag::Review => "Pull Requests Reviewed",
            KindTag::Issue => "Issues Created",
            KindTag::IssueComment => "Issue Comments",
            KindTag::Discussion => "Discussions Created",
            KindTag::DiscussionComment => "Discussion Comments",
        }
    }
}

impl ActivityKind {
    pub fn tag(&self) -> KindTag {
        match self {
            ActivityKind::PullRequest { .. } => KindTag::PullRequest,
            ActivityKind::Review { .. } => KindTag::Review,
            ActivityKind::Issue { .. } => KindTag::Issue,
            ActivityKind::IssueComment { .. } => KindTag::IssueComment,
            ActivityKind::Discussion { .. } => KindTag::Discussion,
            ActivityKind::DiscussionComment { .. } => KindTag::DiscussionComment,
        }
    }
}

impl ActivityItem {
    /// `owner/name#number`, the reference form used in links
    pub fn reference(&self) -> String {
        format!("{}#{}", self.repo, self.number)
    }
}

/// Per-kind activity counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityCounts {
    pub prs_authored: usize,
    pub prs_reviewed: usize,
    pub issues_created: usize,
    pub issue_comments: usize,
    pub discussions_created: usize,
    pub discussion_comments: usize,
}

impl ActivityCounts {
    pub fn total(&self) -> usize {
        self.prs_authored
            + self.prs_reviewed
            + self.issues_created
            + self.issue_comments
            + self.discussions_created
            + self.discussion_comments
    }
}

/// All activity collected for one user in one window
#[derive(Debug, Clone)]
pub struct ActivityBundle {
    /// GitHub login the activity belongs to
    pub username: String,
    /// Collection window
    pub window: ActivityWindow,
    /// Repositories in presentation order
    repos: Vec<RepoRef>,
    items: Vec<ActivityItem>,
    seen_urls: HashSet<String>,
}

impl ActivityBundle {
    pub fn new(username: impl Into<String>, window: ActivityWindow, repos: Vec<RepoRef>) -> Self {
        Self {
            username: username.into(),
            window,
            repos,
            items: Vec::new(),
            seen_urls: HashSet::new(),
        }
    }

    /// Add an item. Returns `false` if an item with the same URL was already present.
    pub fn push(&mut self, item: ActivityItem) -> bool {
        if !self.seen_urls.insert(item.url.clone()) {
            return false;
        }
        if !self.repos.contains(&item.repo) {
            self.repos.push(item.repo.clone());
        }
        self.items.push(item);
        true
    }

    /// Add many items, returning how many were new
    pub fn extend<I: IntoIterator<Item = ActivityItem>>(&mut self, items: I) -> usize {
        items
            .into_iter()
            .map(|item| self.push(item))
            .filter(|added| *added)
            .count()
    }

    pub fn repos(&self) -> &[RepoRef] {
        &self.repos
    }

    pub fn items(&self) -> &[ActivityItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn counts(&self) -> ActivityCounts {
        let mut counts = ActivityCounts::default();
        for item in &self.items {
            match item.kind.tag() {
                KindTag::PullRequest => counts.prs_authored += 1,
                KindTag::Review => counts.prs_reviewed += 1,
                KindTag::Issue => counts.issues_created += 1,
                KindTag::IssueComment => counts.issue_comments += 1,
                KindTag::Discussion => counts.discussions_created += 1,
                KindTag::DiscussionComment => counts.discussion_comments += 1,
            }
        }
        counts
    }

    /// Items grouped by repository, in repository order.
    ///
    /// Repositories without activity are omitted. Within a repository items are
    /// ordered by kind, then timestamp, then URL, so the result does not depend
    /// on the order in which queries returned.
    pub fn by_repo(&self) -> Vec<(&RepoRef, Vec<&ActivityItem>)> {
        self.repos
            .iter()
            .filter_map(|repo| {
                let mut items: Vec<&ActivityItem> =
                    self.items.iter().filter(|item| &item.repo == repo).collect();
                if items.is_empty() {
                    return None;
                }
                items.sort_by(|a, b| {
                    (a.kind.tag(), a.timestamp, &a.url).cmp(&(b.kind.tag(), b.timestamp, &b.url))
                });
                Some((repo, items))
            })
            .collect()
    }
}
