//! Gemini chat completion adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::ChatCompletion;
use crate::{Error, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One part of a Gemini message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    text: String,
}

/// A message in the Gemini conversation format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: SystemInstruction,
    contents: &'a [Content],
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// Chat completion via the Gemini API, with in-memory conversation history
pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    system_prompt: String,
    history: Vec<Content>,
}

impl GeminiChat {
    /// Create a new chat adapter
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, model: String, system_prompt: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required for chat".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            system_prompt,
            history: Vec::new(),
        })
    }

    /// Drop the conversation history, keeping the system prompt
    pub fn reset(&mut self) {
        self.history.clear();
    }

    async fn send(&self) -> Result<String> {
        let request = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part { text: self.system_prompt.clone() }],
            },
            contents: &self.history,
        };

        let url = format!("{API_BASE}/{}:generateContent?key={}", self.model, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Chat(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(body = %body, "Gemini rate limit hit");
            return Err(Error::RateLimited(format!("Gemini: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Gemini API error");
            return Err(Error::Chat(format!("Gemini API error {status}: {body}")));
        }

        let result: GenerateResponse =
            response.json().await.map_err(|e| Error::Chat(e.to_string()))?;

        let reply = result
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| Error::Chat("empty completion response".to_string()))?;

        Ok(reply)
    }
}

#[async_trait]
impl ChatCompletion for GeminiChat {
    async fn complete(&mut self, message: &str) -> Result<String> {
        self.history.push(Content::new("user", message));

        match self.send().await {
            Ok(reply) => {
                self.history.push(Content::new("model", &reply));
                tracing::debug!(turns = self.history.len() / 2, "completion received");
                Ok(reply)
            }
            Err(e) => {
                // Keep history consistent: the failed message never happened
                self.history.pop();
                Err(e)
            }
        }
    }
}
