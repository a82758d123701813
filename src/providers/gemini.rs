/*!
 * Gemini transport: Google Generative Language `generateContent` REST calls.
 */

use async_trait::async_trait;
use log::error;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::TransportError;
use crate::translation::prompts::{build_user_prompt, SYSTEM_PROMPT};

use super::{ChunkRequest, ChunkTranslator};

/// Gemini generateContent request
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

/// One content block of parts
#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

/// A single text part
#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

/// Generation parameters; low temperature keeps the array contract stable
#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// Gemini generateContent response envelope
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// Transport for one credentialed Gemini endpoint
#[derive(Debug)]
pub struct GeminiEndpoint {
    /// HTTP client for API requests
    client: Client,
    /// API key, appended to the URL as Gemini expects
    api_key: String,
    /// Fully resolved endpoint URL (model already substituted)
    endpoint: String,
}

impl GeminiEndpoint {
    /// Create a transport for a resolved endpoint URL and key.
    ///
    /// The client-level timeout is a backstop; the pool enforces the
    /// per-call timeout around the whole request.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1) * 2))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> TransportError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                TransportError::AuthInvalid(format!("HTTP {}", status.as_u16()))
            }
            StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited,
            _ => TransportError::Unreachable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )),
        }
    }

    fn extract_text(response: GeminiResponse) -> Option<String> {
        let candidate = response.candidates.into_iter().next()?;
        let content = candidate.content?;
        if content.parts.is_empty() {
            return None;
        }
        Some(
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        )
    }
}

#[async_trait]
impl ChunkTranslator for GeminiEndpoint {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<String, TransportError> {
        let user_prompt = build_user_prompt(&request.chunk, &request.name_map, request.tone);
        let payload = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart {
                        text: SYSTEM_PROMPT.to_string(),
                    },
                    GeminiPart { text: user_prompt },
                ],
            }],
            generation_config: GenerationConfig::default(),
        };

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Self::classify_status(status, &body);
            error!("Gemini call failed for chunk {}: {}", request.chunk, err);
            return Err(err);
        }

        let envelope = response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| TransportError::Unreachable(format!("bad response envelope: {}", e)))?;

        Self::extract_text(envelope)
            .ok_or_else(|| TransportError::Unreachable("response contained no text".to_string()))
    }
}
