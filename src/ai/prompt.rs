use crate::activity::{ActivityBundle, ActivityItem, ActivityKind};

/// Default system prompt. `{username}` and `{period}` are substituted.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You write short weekly updates for developers, based on the raw GitHub activity they send you. Turn the activity into an honest summary grouped by project or theme.

Answer in exactly this shape, between the markers:

<START>

# Weekly Update: {username} ({period})

## Wins

One `### Project or theme` heading per group, then 1-4 bullets. Cover merged PRs and what they enable, fixed bugs and their impact, reliability or performance work, and debt paid down. Each bullet names the repo and says why the change matters.

## Challenges

Same heading style, 1-3 bullets per group. Cover work still in progress, blockers and how they were handled, and risks worth attention. Keep the tone constructive.

## What's Next

Same heading style, 1-3 bullets per group. Derive it from open PRs, open issues and active discussions. Reference them concretely.

---

### Activity Summary

One line of counts, e.g. "4 PRs authored, 6 PRs reviewed, 1 issue created".

<END>

Rules:
- Always group by project or theme, never a flat list.
- Link every PR, issue and discussion inline, e.g. [owner/repo#123](https://github.com/owner/repo/pull/123). Use the URLs from the input as given.
- Use real titles and numbers. One or two sentences per bullet.
- If there is little activity, say so plainly. Do not invent plans or outcomes.
"#;

const USER_PREAMBLE: &str =
    "Here is my GitHub activity for the past week. Please generate my weekly impact summary.\n\n";

/// Substitute `{username}` and `{period}` in a custom or the default system prompt
pub fn system_prompt(custom: Option<&str>, username: &str, period: &str) -> String {
    custom
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace("{username}", username)
        .replace("{period}", period)
}

/// Serialize the bundle into the user message.
///
/// The output depends only on the bundle's contents, so the same activity
/// always yields byte-identical text.
pub fn build_payload(bundle: &ActivityBundle) -> String {
    let mut payload = String::from(USER_PREAMBLE);

    payload.push_str(&format!("# GitHub activity for {}\n", bundle.username));
    payload.push_str(&format!("Period: {}\n", bundle.window.label()));

    let repos: Vec<String> = bundle.repos().iter().map(|r| r.to_string()).collect();
    if repos.is_empty() {
        payload.push_str("Repositories: (none)\n");
    } else {
        payload.push_str(&format!("Repositories: {}\n", repos.join(", ")));
    }

    let counts = bundle.counts();
    payload.push_str(&format!(
        "Totals: {} PRs authored, {} PRs reviewed, {} issues created, {} issue comments, {} discussions created, {} discussion comments\n",
        counts.prs_authored,
        counts.prs_reviewed,
        counts.issues_created,
        counts.issue_comments,
        counts.discussions_created,
        counts.discussion_comments,
    ));

    if bundle.is_empty() {
        payload.push_str("\nNo activity was recorded in this period.\n");
        return payload;
    }

    for (repo, items) in bundle.by_repo() {
        payload.push_str(&format!("\n## {}\n", repo));

        let mut current = None;
        for item in items {
            let tag = item.kind.tag();
            if current != Some(tag) {
                payload.push_str(&format!("\n### {}\n", tag.heading()));
                current = Some(tag);
            }
            payload.push_str(&format_item(item));
        }
    }

    payload
}

fn format_item(item: &ActivityItem) -> String {
    let date = item.timestamp.format("%Y-%m-%d");
    let mut line = match &item.kind {
        ActivityKind::PullRequest {
            additions,
            deletions,
            changed_files,
            labels,
            ..
        } => format!(
            "- [{}]({}) {} ({}, {}, +{}/-{}, {} files{})",
            item.reference(),
            item.url,
            item.title,
            item.state,
            date,
            additions,
            deletions,
            changed_files,
            label_suffix(labels)
        ),
        ActivityKind::Review { pr_url } => format!(
            "- [{}]({}) {} (review: {}, {}, review link: {})",
            item.reference(),
            pr_url,
            item.title,
            item.state,
            date,
            item.url
        ),
        ActivityKind::Issue { labels, comments } => format!(
            "- [{}]({}) {} ({}, {}, {} comments{})",
            item.reference(),
            item.url,
            item.title,
            item.state,
            date,
            comments,
            label_suffix(labels)
        ),
        ActivityKind::IssueComment { issue_url } => format!(
            "- Comment on [{}]({}) {} ({}, comment link: {})",
            item.reference(),
            issue_url,
            item.title,
            date,
            item.url
        ),
        ActivityKind::Discussion { category } => format!(
            "- [{}]({}) {} ({}{})",
            item.reference(),
            item.url,
            item.title,
            date,
            category
                .as_deref()
                .map(|c| format!(", category: {}", c))
                .unwrap_or_default()
        ),
        ActivityKind::DiscussionComment { discussion_url } => format!(
            "- Comment on [{}]({}) {} ({}, comment link: {})",
            item.reference(),
            discussion_url,
            item.title,
            date,
            item.url
        ),
    };
    line.push('\n');

    if let Some(body) = item.body.as_deref().map(flatten).filter(|b| !b.is_empty()) {
        line.push_str(&format!("  > {}\n", body));
    }

    line
}

fn label_suffix(labels: &[String]) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!(", labels: {}", labels.join(", "))
    }
}

/// Collapse all whitespace runs (newlines included) into single spaces
fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::{issue_comment, pull_request, window};
    use crate::github::RepoRef;

    fn sample_bundle() -> ActivityBundle {
        let alpha = RepoRef::new("octo", "alpha");
        let beta = RepoRef::new("octo", "beta");
        let mut bundle = ActivityBundle::new("octocat", window(), vec![alpha.clone(), beta.clone()]);
        bundle.push(issue_comment(&beta, 7, 100, 5));
        bundle.push(pull_request(&alpha, 12, 3));
        bundle
    }

    #[test]
    fn test_system_prompt_substitution() {
        let prompt = system_prompt(None, "octocat", "2025-06-01 → 2025-06-07");
        assert!(prompt.contains("# Weekly Update: octocat (2025-06-01 → 2025-06-07)"));
        assert!(prompt.contains("## Wins"));
        assert!(prompt.contains("## Challenges"));
        assert!(prompt.contains("## What's Next"));
        assert!(!prompt.contains("{username}"));
    }

    #[test]
    fn test_custom_prompt_is_used() {
        let prompt = system_prompt(Some("Be brief, {username}."), "octocat", "p");
        assert_eq!(prompt, "Be brief, octocat.");
    }

    #[test]
    fn test_payload_groups_by_repo() {
        let payload = build_payload(&sample_bundle());

        assert!(payload.starts_with(USER_PREAMBLE));
        assert!(payload.contains("Repositories: octo/alpha, octo/beta"));

        let alpha = payload.find("## octo/alpha").unwrap();
        let beta = payload.find("## octo/beta").unwrap();
        let pr = payload
            .find("[octo/alpha#12](https://github.com/octo/alpha/pull/12)")
            .unwrap();
        let comment = payload
            .find("https://github.com/octo/beta/issues/7#issuecomment-100")
            .unwrap();

        assert!(alpha < pr && pr < beta && beta < comment);
        assert!(payload.contains("### Pull Requests Authored"));
        assert!(payload.contains("### Issue Comments"));
        assert!(payload.contains("(merged, 2025-06-03, +10/-2, 1 files)"));
    }

    #[test]
    fn test_payload_is_deterministic() {
        let alpha = RepoRef::new("octo", "alpha");
        let mut reordered = ActivityBundle::new("octocat", window(), vec![alpha.clone(), RepoRef::new("octo", "beta")]);
        reordered.push(pull_request(&alpha, 12, 3));
        reordered.push(issue_comment(&RepoRef::new("octo", "beta"), 7, 100, 5));

        assert_eq!(build_payload(&sample_bundle()), build_payload(&sample_bundle()));
        assert_eq!(build_payload(&sample_bundle()), build_payload(&reordered));
    }

    #[test]
    fn test_empty_bundle_payload() {
        let bundle = ActivityBundle::new("octocat", window(), vec![]);
        let payload = build_payload(&bundle);

        assert!(payload.contains("Repositories: (none)"));
        assert!(payload.contains("No activity was recorded"));
    }

    #[test]
    fn test_body_is_flattened() {
        let repo = RepoRef::new("octo", "alpha");
        let mut item = pull_request(&repo, 1, 2);
        item.body = Some("First line\n\n  second   line\r\nthird".to_string());

        let line = format_item(&item);
        assert!(line.ends_with("  > First line second line third\n"));
        assert_eq!(line.lines().count(), 2);
    }
}
