use crate::activity::ActivityWindow;
use crate::ai::SummaryReport;
use crate::error::{Result, Warning, WeeklyUpdatesError};
use crate::github::RepoRef;
use git2::build::RepoBuilder;
use git2::{Cred, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory inside the target repository that receives the reports
pub const REPORT_DIR: &str = "weekly-updates";
const DEFAULT_BRANCH: &str = "refs/heads/main";

/// Repository a report is committed into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub repo: RepoRef,
    /// Clone URL; github.com over HTTPS unless overridden
    pub remote_url: String,
}

impl PushTarget {
    pub fn new(repo: RepoRef, remote_url: impl Into<String>) -> Self {
        Self {
            repo,
            remote_url: remote_url.into(),
        }
    }

    /// The repository on github.com, over HTTPS
    pub fn github(repo: RepoRef) -> Self {
        let remote_url = format!("{}.git", repo.html_url());
        Self::new(repo, remote_url)
    }
}

/// What happened to the target repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { branch: String, commit: String },
    /// The report was already committed with identical content
    Unchanged,
}

/// Result of a publish that did not fail fatally
#[derive(Debug, Default)]
pub struct PublishOutcome {
    pub written: Option<PathBuf>,
    pub pushed: Option<PushOutcome>,
    pub printed: bool,
    pub warnings: Vec<Warning>,
}

/// Delivers a report to a file, a repository and/or stdout
pub struct Publisher {
    username: String,
    window: ActivityWindow,
    output: Option<PathBuf>,
    push: Option<(PushTarget, String)>,
}

impl Publisher {
    pub fn new(username: impl Into<String>, window: ActivityWindow) -> Self {
        Self {
            username: username.into(),
            window,
            output: None,
            push: None,
        }
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Commit into `target`, authenticating with `token`
    pub fn with_push(mut self, target: Option<PushTarget>, token: &str) -> Self {
        self.push = target.map(|t| (t, token.to_string()));
        self
    }

    /// Path of the report inside the target repository
    pub fn report_path(&self) -> PathBuf {
        Path::new(REPORT_DIR).join(format!("{}.md", self.window.file_stem()))
    }

    /// Attempt every requested destination.
    ///
    /// A push failure becomes a warning. A file-write failure is returned as an
    /// error, but only after the push has been attempted.
    pub fn publish<W: Write>(&self, report: &SummaryReport, stdout: &mut W) -> Result<PublishOutcome> {
        let mut outcome = PublishOutcome::default();

        let write_result = match &self.output {
            Some(path) => write_report(path, &report.markdown).map(|()| {
                info!(path = %path.display(), "Wrote report");
                outcome.written = Some(path.clone());
            }),
            None => Ok(()),
        };

        if let Some((target, token)) = &self.push {
            match self.push_report(target, token, &report.markdown) {
                Ok(pushed) => {
                    match &pushed {
                        PushOutcome::Pushed { branch, commit } => {
                            info!(repo = %target.repo, branch = %branch, commit = %commit, "Pushed report")
                        }
                        PushOutcome::Unchanged => {
                            info!(repo = %target.repo, "Report unchanged, nothing to push")
                        }
                    }
                    outcome.pushed = Some(pushed);
                }
                Err(e) => {
                    warn!(repo = %target.repo, error = %e, "Push failed");
                    outcome.warnings.push(Warning::Publish {
                        target: target.repo.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        write_result?;

        if self.output.is_none() && self.push.is_none() {
            stdout.write_all(report.markdown.as_bytes())?;
            stdout.flush()?;
            outcome.printed = true;
        }

        Ok(outcome)
    }

    fn push_report(&self, target: &PushTarget, token: &str, markdown: &str) -> Result<PushOutcome> {
        let scratch = tempfile::Builder::new()
            .prefix("gh-weekly-updates-")
            .tempdir()?;
        let checkout = scratch.path().join("repo");

        info!(repo = %target.repo, "Cloning push target");
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(token_callbacks(token));
        let repo = RepoBuilder::new()
            .fetch_options(fetch)
            .clone(&target.remote_url, &checkout)?;

        let (branch, parent) = match repo.head() {
            Ok(head) => {
                let name = head
                    .name()
                    .ok_or_else(|| WeeklyUpdatesError::publish("HEAD is not valid UTF-8"))?
                    .to_string();
                (name, Some(head.peel_to_commit()?))
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                repo.set_head(DEFAULT_BRANCH)?;
                (DEFAULT_BRANCH.to_string(), None)
            }
            Err(e) => return Err(e.into()),
        };

        let relative = self.report_path();
        write_report(&checkout.join(&relative), markdown)?;

        let mut index = repo.index()?;
        index.add_path(&relative)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;

        if let Some(parent) = &parent {
            if parent.tree_id() == tree.id() {
                return Ok(PushOutcome::Unchanged);
            }
        }

        let email = format!("{}@users.noreply.github.com", self.username);
        let signature = Signature::now(&self.username, &email)?;
        let message = format!("weekly-updates: {}", self.window.label());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let commit = repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)?;

        push_branch(&repo, &branch, token)?;

        Ok(PushOutcome::Pushed {
            branch: branch.trim_start_matches("refs/heads/").to_string(),
            commit: commit.to_string(),
        })
    }
}

fn write_report(path: &Path, markdown: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, markdown)?;
    Ok(())
}

fn token_callbacks(token: &str) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username, _allowed| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    callbacks
}

fn push_branch(repo: &Repository, branch: &str, token: &str) -> Result<()> {
    let mut remote = repo.find_remote("origin")?;
    let refspec = format!("{}:{}", branch, branch);
    let mut rejection: Option<String> = None;

    {
        let mut callbacks = token_callbacks(token);
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejection = Some(format!("{} rejected: {}", refname, status));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        remote.push(&[refspec.as_str()], Some(&mut options))?;
    }

    match rejection {
        Some(message) => Err(WeeklyUpdatesError::publish(message)),
        None => Ok(()),
    }
}
