//! Chat-completions provider for the Groq API.
//!
//! The engine talks to the model through [`CompletionProvider`] so tests can
//! substitute a scripted implementation; [`GroqClient`] is the real one,
//! speaking the OpenAI-compatible `/chat/completions` protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use medharvest_shared::{EnrichConfig, MedHarvestError, Result};

/// User-Agent string for LLM requests.
const USER_AGENT: &str = concat!("MedHarvest/", env!("CARGO_PKG_VERSION"));

/// A source of text completions for an enrichment prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Submit one prompt as a single user-role message and return the raw
    /// completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat client for Groq.
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl GroqClient {
    /// Create a client from a resolved API key and the enrichment config.
    pub fn new(api_key: String, config: &EnrichConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MedHarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!(model = %self.model, "sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MedHarvestError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| MedHarvestError::Network(e.to_string()))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| MedHarvestError::Network(format!("body read failed: {e}")))?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                MedHarvestError::Enrichment("invalid response format: missing content".into())
            })?
            .to_string();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medharvest_shared::RetryPolicy;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> EnrichConfig {
        EnrichConfig {
            base_url: base_url.to_string(),
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.2,
            max_tokens: 300,
            retry: RetryPolicy::fixed(3, Duration::ZERO),
            record_delay: Duration::ZERO,
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn sends_chat_request_and_extracts_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "temperature": 0.2,
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body("{\"a\": 1}")),
            )
            .mount(&server)
            .await;

        let client = GroqClient::new("test-key".into(), &test_config(&server.uri())).unwrap();
        let content = client.complete("extract things").await.unwrap();
        assert_eq!(content, "{\"a\": 1}");
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GroqClient::new("test-key".into(), &test_config(&server.uri())).unwrap();
        let result = client.complete("extract things").await;
        assert!(matches!(result, Err(MedHarvestError::Network(_))));
    }

    #[tokio::test]
    async fn missing_content_is_an_enrichment_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = GroqClient::new("test-key".into(), &test_config(&server.uri())).unwrap();
        let result = client.complete("extract things").await;
        assert!(matches!(result, Err(MedHarvestError::Enrichment(_))));
    }
}
