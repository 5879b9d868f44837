//! Gemini `generateContent` REST client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::prompts::{self, NO_ANSWER_REPLY};
use super::TeacherGateway;
use crate::config::GatewayConfig;
use crate::domain::exam::EXAM_SCHEMA_VERSION;
use crate::domain::{EncodedImage, ExamDocument};
use crate::error::{ExamGenerationError, GatewayError};

/// Retry configuration for gateway calls
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

// ==================== Wire types ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

fn request_parts(text: String, images: &[EncodedImage]) -> Vec<Part> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(Part::Text(text));
    parts.extend(images.iter().map(|img| {
        Part::InlineData(InlineData {
            mime_type: img.mime.as_str(),
            data: img.data.clone(),
        })
    }));
    parts
}

/// JSON schema the exam model is asked to follow
fn exam_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "questions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "NUMBER" },
                        "question": { "type": "STRING" },
                        "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "correctAnswer": { "type": "STRING" },
                        "marks": { "type": "NUMBER" }
                    },
                    "required": ["id", "question", "correctAnswer", "marks"]
                }
            }
        },
        "required": ["questions"]
    })
}

// ==================== Client ====================

pub struct GeminiGateway {
    client: Client,
    config: GatewayConfig,
    retry_config: RetryConfig,
}

impl GeminiGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Create client with custom retry configuration
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url, model)
    }

    /// Send request with exponential backoff retry logic
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GatewayError> {
        let url = self.endpoint(model);
        let mut last_error = GatewayError::Network("request was never sent".into());
        let mut delay_ms = self.retry_config.initial_delay_ms;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                warn!(
                    "Gateway retry {}/{} after {}ms",
                    attempt, self.retry_config.max_retries, delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                // Exponential backoff with ±10% jitter
                let jitter = (delay_ms as f64 * 0.1 * (rand::random::<f64>() - 0.5)) as i64;
                delay_ms = (delay_ms * 2)
                    .min(self.retry_config.max_delay_ms)
                    .saturating_add_signed(jitter);
            }

            debug!("Sending request to {} (attempt {})", url, attempt + 1);

            let result = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(request)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!("Gateway timed out (retrying)");
                    last_error = GatewayError::Timeout;
                    continue;
                }
                Err(e) if e.is_connect() => {
                    warn!("Gateway connection failed (retrying): {}", e);
                    last_error = GatewayError::Network(e.to_string());
                    continue;
                }
                Err(e) => return Err(GatewayError::Network(e.to_string())),
            };

            let status = response.status();
            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| GatewayError::Network(format!("failed to read body: {}", e)))?;
                debug!("Gateway response body ({} chars)", body.len());
                return serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()));
            }

            let message = response.text().await.unwrap_or_default();
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(GatewayError::Authentication(format!("status {}", status)));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("Gateway rate limited (retrying)");
                    last_error = GatewayError::RateLimited;
                }
                s if s.is_server_error() => {
                    warn!("Gateway server error {} (retrying): {}", s, message);
                    last_error = GatewayError::HttpStatus {
                        status: s.as_u16(),
                        message,
                    };
                }
                s => {
                    return Err(GatewayError::HttpStatus {
                        status: s.as_u16(),
                        message,
                    });
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl TeacherGateway for GeminiGateway {
    async fn converse(
        &self,
        prompt: &str,
        images: &[EncodedImage],
        context: &str,
    ) -> Result<String, GatewayError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: request_parts(prompts::conversation_text(prompt, context), images),
            }],
            generation_config: serde_json::json!({
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
            }),
        };

        let response = self.generate(&self.config.chat_model, &request).await?;
        Ok(response.text().unwrap_or_else(|| NO_ANSWER_REPLY.to_string()))
    }

    async fn generate_exam(
        &self,
        subject_name: &str,
        chapter_title: &str,
        images: &[EncodedImage],
    ) -> Result<ExamDocument, ExamGenerationError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: request_parts(prompts::exam_instruction(subject_name, chapter_title), images),
            }],
            generation_config: serde_json::json!({
                "responseMimeType": "application/json",
                "responseSchema": exam_response_schema(),
            }),
        };

        debug!(
            "Requesting exam for {} - {} (schema v{})",
            subject_name, chapter_title, EXAM_SCHEMA_VERSION
        );
        let response = self.generate(&self.config.exam_model, &request).await?;
        let raw = response.text().ok_or(GatewayError::EmptyResponse)?;
        ExamDocument::from_json(&raw)
    }
}
