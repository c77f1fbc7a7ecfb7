use crate::error::{Result, WeeklyUpdatesError};
use std::env;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";
const GH_PROGRAM: &str = "gh";
const GH_TIMEOUT: Duration = Duration::from_secs(10);

/// Finds a GitHub token without touching the network.
///
/// Sources are tried in order: the environment variable, then `gh auth token`.
pub struct CredentialResolver {
    env_var: String,
    program: String,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR, GH_PROGRAM)
    }
}

impl CredentialResolver {
    /// Resolve from `env_var`, then from `<program> auth token`
    pub fn new(env_var: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            program: program.into(),
        }
    }

    pub async fn resolve(&self) -> Result<String> {
        if let Some(token) = self.from_env() {
            debug!(source = %self.env_var, "token resolved from environment");
            return Ok(token);
        }

        if let Some(token) = self.from_cli().await {
            debug!(source = %self.program, "token resolved from CLI");
            return Ok(token);
        }

        Err(WeeklyUpdatesError::auth(format!(
            "no GitHub token found. Set {} or run `{} auth login`",
            self.env_var, self.program
        )))
    }

    fn from_env(&self) -> Option<String> {
        env::var(&self.env_var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    async fn from_cli(&self) -> Option<String> {
        let output = Command::new(&self.program)
            .args(["auth", "token"])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(GH_TIMEOUT, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(program = %self.program, error = %e, "token helper unavailable");
                return None;
            }
            Err(_) => {
                debug!(program = %self.program, "token helper timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(program = %self.program, status = %output.status, "token helper failed");
            return None;
        }

        String::from_utf8(output.stdout)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_PROGRAM: &str = "gh-weekly-updates-test-no-such-binary";

    #[tokio::test]
    async fn test_env_token_wins() {
        let var = "GH_WEEKLY_UPDATES_TEST_TOKEN_SET";
        env::set_var(var, "  ghp_fromenv\n");

        let token = CredentialResolver::new(var, MISSING_PROGRAM)
            .resolve()
            .await
            .unwrap();
        assert_eq!(token, "ghp_fromenv");

        env::remove_var(var);
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_auth_error() {
        let err = CredentialResolver::new("GH_WEEKLY_UPDATES_TEST_TOKEN_UNSET", MISSING_PROGRAM)
            .resolve()
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("GH_WEEKLY_UPDATES_TEST_TOKEN_UNSET"));
    }

    #[tokio::test]
    async fn test_blank_env_falls_through() {
        let var = "GH_WEEKLY_UPDATES_TEST_TOKEN_BLANK";
        env::set_var(var, "   ");

        let result = CredentialResolver::new(var, MISSING_PROGRAM)
            .resolve()
            .await;
        assert!(matches!(result, Err(WeeklyUpdatesError::Auth(_))));

        env::remove_var(var);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_helper_counts_as_no_token() {
        // `false` exits non-zero without output
        let result = CredentialResolver::new("GH_WEEKLY_UPDATES_TEST_TOKEN_UNSET", "false")
            .resolve()
            .await;
        assert!(result.is_err());
    }
}
