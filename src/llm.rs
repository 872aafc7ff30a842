//! Completion client for a locally hosted, OpenAI-compatible language model.
//!
//! Speaks the `/chat/completions` protocol served by LM Studio, llama.cpp's
//! server, Ollama's OpenAI endpoint and similar. The prompt is sent as a
//! single user message; there is no retry.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{RagError, Result};

/// Timeout for the `/models` health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// `complete(prompt) -> text`.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiCompatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RagError::Llm(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            api_key: config.llm.api_key.clone(),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// `GET {base_url}/models`; any 2xx counts as reachable.
    pub async fn check_models(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(format!("{}/models", self.base_url)))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| RagError::Llm(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Llm(format!("HTTP {}", status)));
        }
        Ok(())
    }
}

pub fn chat_request_body(model: &str, prompt: &str, temperature: Option<f32>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if let Some(t) = temperature {
        body["temperature"] = serde_json::json!(t);
    }
    body
}

/// Extract `choices[0].message.content`.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            RagError::Llm("invalid completion response: missing choices[0].message.content".into())
        })
}

#[async_trait]
impl Completion for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, prompt_chars = prompt.len(), "requesting completion");

        let response = self
            .authorize(self.client.post(&url))
            .json(&chat_request_body(&self.model, prompt, self.temperature))
            .send()
            .await
            .map_err(|e| RagError::Llm(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("HTTP {}: {}", status, body_text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Llm(format!("invalid JSON from {}: {}", url, e)))?;
        parse_chat_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Paris." },
                "finish_reason": "stop"
            }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Paris.");
    }

    #[test]
    fn test_parse_chat_response_missing_choices() {
        let json = serde_json::json!({ "error": { "message": "model not loaded" } });
        assert!(matches!(parse_chat_response(&json), Err(RagError::Llm(_))));
        let empty = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&empty).is_err());
    }

    #[test]
    fn test_request_body() {
        let body = chat_request_body("local-model", "hi", None);
        assert_eq!(body["model"], "local-model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert!(body.get("temperature").is_none());

        let body = chat_request_body("m", "hi", Some(0.5));
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = Config::default();
        config.llm.base_url = "http://localhost:1234/v1/".to_string();
        let client = OpenAiCompatClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
    }
}
