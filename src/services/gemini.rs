use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{AppConfig, GEMINI_SETUP};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("{0}")]
    MissingCredentials(String),
    #[error("generative API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generative API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("generative API returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl AiError {
    /// User-facing advice, chosen by matching the provider's message text.
    pub fn guidance(&self) -> String {
        let (status, text) = match self {
            AiError::MissingCredentials(instructions) => return instructions.clone(),
            AiError::InvalidResponse(_) => {
                return "The AI returned a response we could not use. Please try again.".to_string()
            }
            AiError::Api { status, message } => (Some(*status), message.to_lowercase()),
            AiError::Http(err) => (
                err.status().map(|s| s.as_u16()),
                err.to_string().to_lowercase(),
            ),
        };

        let mentions = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if status == Some(429) || mentions(&["quota", "rate limit", "resource_exhausted"]) {
            "The AI service quota has been reached. Wait a few minutes or check the usage limits of your API plan.".to_string()
        } else if matches!(status, Some(401) | Some(403))
            || mentions(&["permission", "api key", "api_key", "unauthenticated"])
        {
            "The AI service rejected our credentials. Check that GEMINI_API_KEY is valid and the Generative Language API is enabled for the project.".to_string()
        } else if matches!(status, Some(500) | Some(503) | Some(504))
            || mentions(&["unavailable", "overloaded", "timed out", "timeout", "deadline"])
        {
            "The AI service is temporarily unavailable. Please try again shortly.".to_string()
        } else {
            format!("The AI service could not complete the request: {}", self)
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// The generative capabilities the application relies on.
#[allow(async_fn_in_trait)]
pub trait Generative {
    fn is_configured(&self) -> bool {
        true
    }

    /// Returns JSON conforming to `schema`.
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value, AiError>;
    async fn generate_text(&self, prompt: &str) -> Result<String, AiError>;
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, AiError>;
}

/// Asks for JSON and validates it against the Rust type at the boundary.
pub async fn generate_typed<T, G>(ai: &G, prompt: &str, schema: &Value) -> Result<T, AiError>
where
    T: DeserializeOwned,
    G: Generative,
{
    let value = ai.generate_json(prompt, schema).await?;
    serde_json::from_value(value).map_err(|e| AiError::InvalidResponse(e.to_string()))
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    image_model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            image_model: config.imagen_model.clone(),
            base_url: config.gemini_base_url.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, AiError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AiError::MissingCredentials(GEMINI_SETUP.to_string()))
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<reqwest::Response, AiError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key()?)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .map(|body| body.error.message)
                .unwrap_or(raw);
            log::error!("Generative API call failed with status {}: {}", status, message);
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn generate_content(
        &self,
        prompt: &str,
        generation_config: Option<GenerationConfig>,
    ) -> Result<String, AiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config,
        };

        let response: GenerateContentResponse = self
            .post(&url, &request)
            .await?
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| AiError::InvalidResponse("no text in response".to_string()))
    }
}

impl Generative for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value, AiError> {
        let text = self
            .generate_content(
                prompt,
                Some(GenerationConfig {
                    response_mime_type: "application/json".to_string(),
                    response_schema: schema.clone(),
                }),
            )
            .await?;
        parse_json_reply(&text)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AiError> {
        let text = self.generate_content(prompt, None).await?;
        Ok(text.trim().to_string())
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, AiError> {
        let url = format!("{}/models/{}:predict", self.base_url, self.image_model);
        let request = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });

        let response: PredictResponse = self
            .post(&url, &request)
            .await?
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let prediction = response
            .predictions
            .into_iter()
            .find(|p| p.bytes_base64_encoded.is_some())
            .ok_or_else(|| AiError::InvalidResponse("no image in response".to_string()))?;

        let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AiError::InvalidResponse(format!("image is not base64: {}", e)))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: prediction
                .mime_type
                .unwrap_or_else(|| "image/png".to_string()),
        })
    }
}

/// Models sometimes wrap JSON in a markdown fence despite JSON mode.
pub fn parse_json_reply(text: &str) -> Result<Value, AiError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| AiError::InvalidResponse(e.to_string()))
}
