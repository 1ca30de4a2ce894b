//! Generative-language bridge for FAQ answers the static table cannot cover.
//!
//! API key: `GENAI_API_KEY` in `.env`. Default model: `gemini-2.0-flash`.
//! Callers bound the prompt and post-process the reply; this module only
//! speaks the wire format.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExternalError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Thin client for the generative-language REST API.
pub struct GenerativeBridge {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GenerativeBridge {
    /// Build from `GENAI_API_KEY` / `GENAI_MODEL`. Returns `None` when no key
    /// is configured; chat then degrades to the apology line.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GENAI_API_KEY").ok()?;
        let key = api_key.trim().to_string();
        if key.is_empty() {
            return None;
        }
        let mut bridge = Self::new(key);
        if let Ok(model) = std::env::var("GENAI_MODEL") {
            if !model.trim().is_empty() {
                bridge = bridge.with_model(model.trim());
            }
        }
        Some(bridge)
    }

    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Single-turn completion. Timeouts surface as their own error kind.
    pub async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 512,
            }),
        };

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ExternalError::from_reqwest)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ExternalError::Service(format!(
                "generative API error {status}: {text}"
            )));
        }

        let parsed: GenerateResponse = res.json().await.map_err(ExternalError::from_reqwest)?;
        let reply = parsed
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|mut p| p.drain(..).next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        if reply.trim().is_empty() {
            return Err(ExternalError::Service("empty completion".into()));
        }
        Ok(reply)
    }
}
