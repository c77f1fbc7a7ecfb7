use crate::activity::ActivityBundle;
use crate::ai::models::ModelsClient;
use crate::ai::prompt::{build_payload, system_prompt};
use crate::ai::SummaryReport;
use crate::config::RunConfig;
use crate::error::{Result, Warning};
use crate::github::client::GitHubClient;
use crate::github::collector::{ActivityCollector, Collection, CollectionScope};
use crate::github::discovery::{Discovery, RepoDiscoverer};
use crate::publish::{PublishOutcome, Publisher, PushTarget};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;
use tracing::info;

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub report: SummaryReport,
    pub publish: PublishOutcome,
    /// Discovery, collection and publish warnings, in the order they occurred
    pub warnings: Vec<Warning>,
}

/// Drives one run: identity, discovery, collection, summary, publishing
pub struct Orchestrator {
    config: RunConfig,
    token: String,
    github: GitHubClient,
    models: ModelsClient,
}

impl Orchestrator {
    /// Create a new orchestrator. `token` must already be resolved.
    pub fn new(config: RunConfig, token: String) -> Result<Self> {
        let github = GitHubClient::new(token.clone())?
            .with_api_url(config.github_api_url.clone())
            .with_graphql_url(config.github_graphql_url.clone());

        let models = ModelsClient::new(token.clone())?
            .with_model(config.model.clone())
            .with_base_url(config.models_url.clone());

        Ok(Self {
            config,
            token,
            github,
            models,
        })
    }

    /// Run the whole pipeline, writing the report to `stdout` when no other
    /// destination is configured
    pub async fn run<W: Write>(&self, stdout: &mut W) -> Result<RunOutcome> {
        // Fail on an unreadable prompt file before touching the network
        let custom_prompt = self.config.prompt.load()?;

        let user = self.resolve_user().await?;
        info!(user = %user, period = %self.config.window.label(), "Starting weekly update");

        let discovery = self.discover(&user).await?;
        info!(
            repos = discovery.repos.len(),
            discovered = discovery.discovered,
            "Repos resolved"
        );
        let mut warnings = discovery.warnings;

        let scope = if discovery.repos.is_empty() {
            info!(org = ?self.config.org, "No repos found, falling back to a global search");
            CollectionScope::Global
        } else {
            CollectionScope::Repos(discovery.repos)
        };

        let collection = self.collect(&user, &scope).await?;
        warnings.extend(collection.warnings);

        let report = self
            .summarise(&collection.bundle, custom_prompt.as_deref())
            .await?;

        let publish = self.publish(&user, &report, stdout)?;
        warnings.extend(publish.warnings.iter().cloned());

        Ok(RunOutcome {
            report,
            publish,
            warnings,
        })
    }

    async fn resolve_user(&self) -> Result<String> {
        if let Some(user) = &self.config.user {
            return Ok(user.clone());
        }

        let spinner = spinner("Resolving GitHub username...");
        let user = self.github.authenticated_user().await;
        spinner.finish_and_clear();
        user
    }

    async fn discover(&self, user: &str) -> Result<Discovery> {
        let spinner = spinner("Discovering repos you contributed to...");
        let discovery = RepoDiscoverer::new(&self.github)
            .resolve(
                self.config.repos.as_deref(),
                user,
                &self.config.window,
                self.config.org.as_deref(),
            )
            .await;

        match &discovery {
            Ok(d) => spinner.finish_with_message(format!("Found {} repos", d.repos.len())),
            Err(_) => spinner.finish_and_clear(),
        }
        discovery
    }

    async fn collect(&self, user: &str, scope: &CollectionScope) -> Result<Collection> {
        let spinner = spinner("Collecting activity...");
        let collection = ActivityCollector::new(&self.github, user, &self.config.window)
            .with_org(self.config.org.as_deref())
            .collect(scope)
            .await;

        match &collection {
            Ok(c) => {
                let counts = c.bundle.counts();
                spinner.finish_with_message(format!(
                    "Collected {} activities ({} PRs authored, {} reviewed, {} issues, {} issue comments, {} discussions, {} discussion comments)",
                    counts.total(),
                    counts.prs_authored,
                    counts.prs_reviewed,
                    counts.issues_created,
                    counts.issue_comments,
                    counts.discussions_created,
                    counts.discussion_comments,
                ));
            }
            Err(_) => spinner.finish_and_clear(),
        }
        collection
    }

    /// Ask the model for a report; an empty bundle gets the static report instead
    async fn summarise(
        &self,
        bundle: &ActivityBundle,
        custom_prompt: Option<&str>,
    ) -> Result<SummaryReport> {
        if bundle.is_empty() {
            info!("No activity found, skipping summarisation");
            return Ok(SummaryReport::empty(bundle));
        }

        let system = system_prompt(custom_prompt, &bundle.username, &bundle.window.label());
        let payload = build_payload(bundle);

        let spinner = spinner(&format!("Generating summary with {}...", self.models.model()));
        let response = self.models.complete(&system, &payload).await;
        spinner.finish_and_clear();

        Ok(SummaryReport::new(&response?))
    }

    fn publish<W: Write>(
        &self,
        user: &str,
        report: &SummaryReport,
        stdout: &mut W,
    ) -> Result<PublishOutcome> {
        let target = self.config.push.clone().map(PushTarget::github);

        Publisher::new(user, self.config.window.clone())
            .with_output(self.config.output.clone())
            .with_push(target, &self.token)
            .publish(report, stdout)
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::config::FileConfig;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param_contains};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Answers a chat completion with the user message it was sent
    struct EchoPayload;

    impl Respond for EchoPayload {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            let payload = body["messages"][1]["content"].as_str().unwrap_or_default();
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": format!("Preamble\n<START>\n{}\n<END>", payload)}}]
            }))
        }
    }

    fn run_config(server: &MockServer, args: &[&str]) -> RunConfig {
        let mut argv = vec!["gh-weekly-updates"];
        argv.extend_from_slice(args);
        let file = FileConfig {
            github_api_url: Some(server.uri()),
            github_graphql_url: Some(format!("{}/graphql", server.uri())),
            models_url: Some(server.uri()),
            ..FileConfig::default()
        };
        RunConfig::merge(
            &Cli::parse_from(argv),
            &file,
            Utc.with_ymd_and_hms(2025, 6, 20, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    async fn mount_defaults(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"total_count": 0, "items": []})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/alpha/issues/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"repository": {"discussions": {
                    "pageInfo": {"hasNextPage": false, "endCursor": null},
                    "nodes": []
                }}}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_end_to_end_window_to_stdout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param_contains("q", "author:octocat type:pr"))
            .and(query_param_contains("q", "repo:octo/alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "items": [
                    {
                        "number": 12,
                        "title": "Speed up widget rendering",
                        "html_url": "https://github.com/octo/alpha/pull/12",
                        "state": "closed",
                        "created_at": "2025-06-02T09:00:00Z"
                    },
                    {
                        "number": 13,
                        "title": "Too late",
                        "html_url": "https://github.com/octo/alpha/pull/13",
                        "state": "open",
                        "created_at": "2025-06-08T09:00:00Z"
                    }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/alpha/pulls/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "merged_at": "2025-06-03T15:00:00Z",
                "additions": 40,
                "deletions": 12,
                "changed_files": 3
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/beta/issues/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "html_url": "https://github.com/octo/beta/issues/7#issuecomment-2",
                    "issue_url": "https://api.github.com/repos/octo/beta/issues/7",
                    "body": "Follow-up",
                    "created_at": "2025-06-08T10:00:00Z",
                    "user": {"login": "octocat"}
                },
                {
                    "html_url": "https://github.com/octo/beta/issues/7#issuecomment-1",
                    "issue_url": "https://api.github.com/repos/octo/beta/issues/7",
                    "body": "Reproduced on main",
                    "created_at": "2025-06-05T10:00:00Z",
                    "user": {"login": "octocat"}
                }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/beta/issues/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Crash on resize"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(EchoPayload)
            .expect(1)
            .mount(&server)
            .await;
        mount_defaults(&server).await;

        let config = run_config(
            &server,
            &[
                "--user",
                "octocat",
                "--repos",
                "octo/alpha,octo/beta",
                "--since",
                "2025-06-01",
                "--until",
                "2025-06-07",
            ],
        );
        let orchestrator = Orchestrator::new(config, "test-token".to_string()).unwrap();

        let mut stdout = Vec::new();
        let outcome = orchestrator.run(&mut stdout).await.unwrap();
        let printed = String::from_utf8(stdout).unwrap();

        assert!(outcome.warnings.is_empty());
        assert!(outcome.publish.printed);
        assert!(!printed.contains("Preamble"));

        let alpha = printed.find("## octo/alpha").unwrap();
        let pr = printed
            .find("[octo/alpha#12](https://github.com/octo/alpha/pull/12)")
            .unwrap();
        let beta = printed.find("## octo/beta").unwrap();
        let comment = printed
            .find("https://github.com/octo/beta/issues/7#issuecomment-1")
            .unwrap();
        assert!(alpha < pr && pr < beta && beta < comment);

        assert!(!printed.contains("2025-06-08"));
        assert!(!printed.contains("pull/13"));
        assert!(!printed.contains("issuecomment-2"));
    }

    #[tokio::test]
    async fn test_empty_activity_skips_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        mount_defaults(&server).await;

        let config = run_config(
            &server,
            &["--user", "octocat", "--repos", "octo/alpha", "--since", "2025-06-01", "--until", "2025-06-07"],
        );
        let orchestrator = Orchestrator::new(config, "test-token".to_string()).unwrap();

        let mut stdout = Vec::new();
        orchestrator.run(&mut stdout).await.unwrap();
        let printed = String::from_utf8(stdout).unwrap();
        assert!(printed.contains("No GitHub activity found for this period."));
    }

    #[tokio::test]
    async fn test_summarisation_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param_contains("q", "type:issue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "items": [{
                    "number": 1,
                    "title": "Bug",
                    "html_url": "https://github.com/octo/alpha/issues/1",
                    "state": "open",
                    "created_at": "2025-06-02T09:00:00Z"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        mount_defaults(&server).await;

        let config = run_config(
            &server,
            &["--user", "octocat", "--repos", "octo/alpha", "--since", "2025-06-01", "--until", "2025-06-07"],
        );
        let orchestrator = Orchestrator::new(config, "test-token".to_string()).unwrap();

        let mut stdout = Vec::new();
        let result = orchestrator.run(&mut stdout).await;
        assert!(matches!(result, Err(crate::error::WeeklyUpdatesError::Summarisation(_))));
        assert!(stdout.is_empty());
    }

    #[tokio::test]
    async fn test_org_filter_holds_when_discovery_finds_nothing_inside_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("contributionsCollection"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"user": {"contributionsCollection": {
                    "commitContributionsByRepository": [
                        {"repository": {"nameWithOwner": "elsewhere/lib"}}
                    ]
                }}}
            })))
            .mount(&server)
            .await;
        // The search ignores qualifiers and offers out-of-org work
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param_contains("q", "type:issue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "items": [{
                    "number": 77,
                    "title": "Upstream bug",
                    "html_url": "https://github.com/elsewhere/lib/issues/77",
                    "state": "open",
                    "created_at": "2025-06-03T08:00:00Z",
                    "repository_url": "https://api.github.com/repos/elsewhere/lib"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(EchoPayload)
            .expect(0)
            .mount(&server)
            .await;
        mount_defaults(&server).await;

        let config = run_config(
            &server,
            &["--user", "octocat", "--org", "octo", "--since", "2025-06-01", "--until", "2025-06-07"],
        );
        let orchestrator = Orchestrator::new(config, "test-token".to_string()).unwrap();

        let mut stdout = Vec::new();
        orchestrator.run(&mut stdout).await.unwrap();
        let printed = String::from_utf8(stdout).unwrap();
        assert!(printed.contains("No GitHub activity found for this period."));
        assert!(!printed.contains("elsewhere/lib"));
    }

    #[tokio::test]
    async fn test_resolves_user_from_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octocat"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_defaults(&server).await;

        let config = run_config(
            &server,
            &["--repos", "octo/alpha", "--since", "2025-06-01", "--until", "2025-06-07"],
        );
        let orchestrator = Orchestrator::new(config, "test-token".to_string()).unwrap();

        let mut stdout = Vec::new();
        orchestrator.run(&mut stdout).await.unwrap();
        assert!(String::from_utf8(stdout).unwrap().contains("octocat"));
    }
}
