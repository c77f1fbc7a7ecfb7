use crate::error::{Result, WeeklyUpdatesError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODELS_URL: &str = "https://models.github.ai/inference";
pub const DEFAULT_MODEL: &str = "openai/gpt-4.1";
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_TEMPERATURE: f64 = 0.3;

/// GitHub Models chat-completion client
pub struct ModelsClient {
    token: String,
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl ModelsClient {
    /// Create a new client authenticated with the GitHub token
    pub fn new(token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            token,
            client,
            base_url: DEFAULT_MODELS_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Set the model to use
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Set the inference base URL
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system + user exchange and return the first choice's text
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, chars = user.len(), "POST chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| WeeklyUpdatesError::summarisation(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(WeeklyUpdatesError::summarisation(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| WeeklyUpdatesError::summarisation(format!("malformed response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty());

        match content {
            Some(content) => {
                debug!(chars = content.len(), "received completion");
                Ok(content)
            }
            None => Err(WeeklyUpdatesError::summarisation(
                "No content in model response",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ModelsClient {
        ModelsClient::new("test-token".to_string())
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn test_client_creation() {
        let client = ModelsClient::new("ghp_test".to_string()).unwrap();
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(client.base_url, DEFAULT_MODELS_URL);
    }

    #[test]
    fn test_client_builder() {
        let client = ModelsClient::new("ghp_test".to_string())
            .unwrap()
            .with_model("openai/gpt-4o-mini".to_string())
            .with_base_url("http://localhost:8080/".to_string());

        assert_eq!(client.model(), "openai/gpt-4o-mini");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "max_tokens": 4000,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "activity"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "## Wins\n- shipped"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).complete("sys", "activity").await.unwrap();
        assert_eq!(text, "## Wins\n- shipped");
    }

    #[tokio::test]
    async fn test_non_success_is_summarisation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sys", "u").await.unwrap_err();
        assert!(matches!(err, WeeklyUpdatesError::Summarisation(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn test_empty_choices_is_summarisation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sys", "u").await.unwrap_err();
        assert!(matches!(err, WeeklyUpdatesError::Summarisation(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_summarisation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sys", "u").await.unwrap_err();
        assert!(matches!(err, WeeklyUpdatesError::Summarisation(_)));
    }
}
