use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gh-weekly-updates")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Summarise your weekly GitHub activity into a Wins / Challenges / What's Next report",
    long_about = "gh-weekly-updates collects your pull requests, reviews, issues, comments and \
                  discussions over a date window, asks GitHub Models to summarise them, and \
                  prints the report, writes it to a file, or commits it into a repository."
)]
pub struct Cli {
    /// Path to YAML config file (default: ./config.yaml, then ~/.config/gh-weekly-updates/config.yaml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start of the window (YYYY-MM-DD or ISO 8601; default: Monday of previous week)
    #[arg(long)]
    pub since: Option<String>,

    /// End of the window, inclusive (YYYY-MM-DD or ISO 8601; default: now)
    #[arg(long)]
    pub until: Option<String>,

    /// GitHub username (default: the authenticated user)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Comma-separated list of repos (owner/name); skips discovery
    #[arg(long, value_delimiter = ',', value_name = "OWNER/NAME,...")]
    pub repos: Option<Vec<String>>,

    /// Only keep discovered repos owned by this org
    #[arg(long)]
    pub org: Option<String>,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Commit the report into this repository (owner/name)
    #[arg(long, value_name = "OWNER/NAME")]
    pub push: Option<String>,

    /// GitHub Models model identifier (default: openai/gpt-4.1)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate CLI arguments
    pub fn validate(&self) -> Result<(), String> {
        for (flag, value) in [("--since", &self.since), ("--until", &self.until)] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(format!("{} cannot be empty", flag));
            }
        }

        if matches!(&self.push, Some(p) if p.trim().is_empty()) {
            return Err("--push cannot be empty".to_string());
        }

        if let Some(output) = &self.output {
            if output.as_os_str().is_empty() || output.is_dir() {
                return Err(format!("--output must be a file path, got '{}'", output.display()));
            }
        }

        Ok(())
    }
}
