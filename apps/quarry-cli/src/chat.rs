use std::time::Duration;

use serde::{Deserialize, Serialize};

use quarry_core::config::ChatOptions;
use quarry_core::{Error, Result};
use quarry_hybrid::{ChatMessage, ChatProvider};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Non-streaming client for Ollama's `/api/chat`.
pub struct OllamaChat {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(options: &ChatOptions) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| Error::Generation(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/api/chat", options.endpoint.trim_end_matches('/')),
            model: options.model.clone(),
        })
    }
}

impl ChatProvider for OllamaChat {
    fn model_id(&self) -> &str { &self.model }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&ChatRequest { model: &self.model, messages, stream: false })
            .send()
            .map_err(|e| Error::Generation(format!("request to {} failed: {e}", self.url)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Generation(format!("{} returned {status}: {body}", self.url)));
        }
        let parsed: ChatResponse = response.json().map_err(|e| Error::Generation(e.to_string()))?;
        Ok(parsed.message.content)
    }
}
