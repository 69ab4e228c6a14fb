// Generative Provider Service
// Low-level client for the third-party generative model used by the
// plagiarism classifier and the source researcher. Speaks the
// OpenAI-compatible chat-completions shape with bearer auth.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Instant;
use thiserror::Error;

use crate::services::config_store::{is_placeholder_key, ConfigStore};

pub const GENERATIVE_DEFAULT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
pub const GENERATIVE_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Credential slot name in the config store.
pub const RESEARCH_KEY_SLOT: &str = "research";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

pub struct GenerativeClient {
    client: Client,
    base_url: String,
}

impl Default for GenerativeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerativeClient {
    pub fn new() -> Self {
        let base_url =
            env::var("VERITEXT_GENERATIVE_URL").unwrap_or_else(|_| GENERATIVE_DEFAULT_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(80))
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    /// Single chat call; the caller owns prompt construction and reply parsing.
    pub async fn call(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature: 0.0,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

/// Resolve the research credential from environment or the config file.
/// Placeholder values count as absent.
pub fn get_research_api_key() -> Option<String> {
    for key in ["VERITEXT_RESEARCH_API_KEY", "GEMINI_API_KEY"] {
        if let Ok(val) = env::var(key) {
            if !is_placeholder_key(&val) {
                return Some(val.trim().to_string());
            }
        }
    }

    if let Some(config_dir) = ConfigStore::default_config_dir() {
        let store = ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(RESEARCH_KEY_SLOT) {
            return Some(key);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_default_url() {
        let client = GenerativeClient::with_base_url(GENERATIVE_DEFAULT_URL.to_string());
        assert!(client.base_url.contains("generativelanguage"));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: GENERATIVE_DEFAULT_MODEL.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: 64,
            temperature: 0.0,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"max_tokens\":64"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
