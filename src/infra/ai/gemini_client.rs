// =============================================================================
// GEMINI CLIENT - Google AI Studio generateContent
// =============================================================================
//
// Implements `GenerativeBackend` against Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// **Protocol notes:**
// - Authentication: the API key travels as a query parameter (`?key=API_KEY`).
// - Request format: a single `contents[]` entry with role "user" carrying the
//   prompt as one text part.
// - Response format: text lives at `candidates[0].content.parts[*].text`.
//   Parts flagged `thought: true` are the model's reasoning and are dropped.
// - An unknown or retired model answers 404 with status `NOT_FOUND`. That
//   case is reported as `GenerationError::ModelNotFound` so the narrative
//   service can move on to the next candidate.
//
// **Built-in Tools (Server-Side):**
// - `google_search` - real-time web search with grounding metadata
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - API key from https://aistudio.google.com/apikey

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::core::narrative::{GenerationError, GenerationRequest, GenerationTool, GenerativeBackend};

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta";
// Search-grounded answers on thinking models can take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// A single part of content.
///
/// **Note:** `serde(default)` because response parts carry different
/// combinations of fields (thought summaries, plain text, etc.).
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    /// Set on thought-summary parts of thinking models.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    /// "user" for requests, "model" in responses.
    role: String,
    parts: Vec<Part>,
}

/// See: https://ai.google.dev/api/generate-content#generationconfig
#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    /// Range: [0.0, 2.0].
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// =============================================================================
// TOOL DEFINITIONS - REQUEST SIDE
// =============================================================================

#[derive(Debug, Serialize)]
struct GeminiTool {
    /// Google Search grounding tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<GoogleSearchTool>,
}

/// Empty object; presence alone enables the tool.
///
/// ```json
/// { "tools": [{ "google_search": {} }] }
/// ```
#[derive(Debug, Serialize, Default)]
struct GoogleSearchTool {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

// =============================================================================
// RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,

    /// Why the model stopped generating (e.g., "STOP", "SAFETY").
    finish_reason: Option<String>,

    /// Present when Google Search was used.
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    web_search_queries: Vec<String>,

    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    /// Usually just one.
    candidates: Option<Vec<Candidate>>,

    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client for Google's Gemini API.
///
/// # Example
/// ```ignore
/// let client = GeminiClient::new(std::env::var("GEMINI_API_KEY")?);
/// let service = NarrativeService::new(client, vec!["gemini-2.5-flash".into()], true);
/// let narrative = service.generate(&data_block).await?;
/// ```
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_API.to_string(),
        }
    }

    fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
        let tools: Vec<GeminiTool> = request
            .tools
            .iter()
            .map(|tool| match tool {
                GenerationTool::GoogleSearch => GeminiTool {
                    google_search: Some(GoogleSearchTool {}),
                },
            })
            .collect();

        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                    thought: None,
                }],
            }],
            generation_config: request.temperature.map(|temperature| GenerationConfig {
                temperature: Some(temperature),
            }),
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }

    /// Transport errors print the request URL, which carries the key.
    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        GenerationError::Api(err.to_string().replace(&self.api_key, "***"))
    }

    /// Maps a non-success response to a `GenerationError`.
    fn classify_error(status: StatusCode, body: &str, model: &str) -> GenerationError {
        let parsed = serde_json::from_str::<GeminiErrorResponse>(body).ok();
        let not_found = status == StatusCode::NOT_FOUND
            || parsed
                .as_ref()
                .and_then(|p| p.error.status.as_deref())
                .map(|s| s == "NOT_FOUND")
                .unwrap_or(false);

        let message = match parsed {
            Some(p) => p.error.message,
            None => body.to_string(),
        };

        if not_found {
            GenerationError::ModelNotFound {
                model: model.to_string(),
                message,
            }
        } else {
            GenerationError::Api(format!("Gemini API error ({}): {}", status, message))
        }
    }

    /// Joins the non-thought text parts of the first candidate. The text is
    /// passed through as-is; only a response without candidates is an error.
    fn extract_text(
        response: GenerateContentResponse,
        model: &str,
    ) -> Result<String, GenerationError> {
        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| GenerationError::EmptyResponse(model.to_string()))?;

        if let Some(metadata) = &candidate.grounding_metadata {
            let sources: Vec<&str> = metadata
                .grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| web.title.as_deref().or(web.uri.as_deref()))
                .collect();
            tracing::debug!(
                "Gemini grounded on {} web source(s) via {} search(es): {:?}",
                sources.len(),
                metadata.web_search_queries.len(),
                sources
            );
        }

        let text = candidate
            .content
            .parts
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            tracing::warn!(
                "Gemini returned blank text (finish reason: {:?})",
                candidate.finish_reason
            );
        }

        Ok(text)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let body = Self::build_request(request);

        // Never log `url`.
        tracing::debug!(
            "Gemini request to model {}: {} chars, tools: {}",
            request.model,
            request.prompt.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .map_err(|e| self.transport_error(e))?;
            return Err(Self::classify_error(status, &error_text, &request.model));
        }

        let response_json: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        if let Some(usage) = &response_json.usage_metadata {
            tracing::debug!(
                "Gemini usage: {:?} prompt tokens, {:?} response tokens",
                usage.prompt_token_count,
                usage.candidates_token_count
            );
        }

        Self::extract_text(response_json, &request.model)
    }

    /// Search grounding is only available on the 2.x and 3.x families.
    fn supports_search(&self, model: &str) -> bool {
        model.contains("gemini-2") || model.contains("gemini-3")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tools: Vec<GenerationTool>) -> GenerationRequest {
        GenerationRequest {
            model: "gemini-2.5-flash".to_string(),
            prompt: "Summarise this".to_string(),
            tools,
            temperature: None,
        }
    }

    #[test]
    fn test_request_with_google_search() {
        let body = GeminiClient::build_request(&request(vec![GenerationTool::GoogleSearch]));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "Summarise this"}]}],
                "tools": [{"google_search": {}}]
            })
        );
    }

    #[test]
    fn test_request_without_tools_or_config() {
        let body = GeminiClient::build_request(&request(Vec::new()));
        let json = serde_json::to_string(&body).unwrap();

        assert!(!json.contains("tools"));
        assert!(!json.contains("generationConfig"));
    }

    #[test]
    fn test_temperature_serialization() {
        let mut req = request(Vec::new());
        req.temperature = Some(0.5);
        let json = serde_json::to_value(GeminiClient::build_request(&req)).unwrap();

        assert_eq!(json["generationConfig"]["temperature"], serde_json::json!(0.5));
    }

    #[test]
    fn test_not_found_status_is_model_not_found() {
        let body = r#"{"error": {"code": 404, "message": "models/gemini-9 is not found for API version v1beta", "status": "NOT_FOUND"}}"#;
        let err = GeminiClient::classify_error(StatusCode::NOT_FOUND, body, "gemini-9");

        match err {
            GenerationError::ModelNotFound { model, message } => {
                assert_eq!(model, "gemini-9");
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_body_status_with_other_http_code() {
        let body = r#"{"error": {"code": 400, "message": "model retired", "status": "NOT_FOUND"}}"#;
        let err = GeminiClient::classify_error(StatusCode::BAD_REQUEST, body, "gemini-1.0-pro");
        assert!(matches!(err, GenerationError::ModelNotFound { .. }));
    }

    #[test]
    fn test_other_errors_are_api_errors() {
        let body = r#"{"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err =
            GeminiClient::classify_error(StatusCode::TOO_MANY_REQUESTS, body, "gemini-2.5-flash");
        match err {
            GenerationError::Api(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("Resource exhausted"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let plain = GeminiClient::classify_error(StatusCode::BAD_GATEWAY, "<html>", "m");
        assert!(matches!(plain, GenerationError::Api(ref m) if m.contains("<html>")));
    }

    #[test]
    fn test_extract_text_skips_thoughts() {
        let body = r###"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me look at the numbers...", "thought": true},
                        {"text": "## Summary\n"},
                        {"text": "Sessions rose."}
                    ]
                },
                "finishReason": "STOP",
                "groundingMetadata": {
                    "webSearchQueries": ["traffic spike september"],
                    "groundingChunks": [{"web": {"uri": "https://example.com", "title": "example.com"}}]
                }
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 40, "totalTokenCount": 160}
        }"###;

        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let text = GeminiClient::extract_text(response, "gemini-2.5-flash").unwrap();

        assert_eq!(text, "## Summary\nSessions rose.");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        let err = GeminiClient::extract_text(response, "gemini-2.5-flash").unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse(ref m) if m == "gemini-2.5-flash"));
    }

    #[test]
    fn test_extract_text_passes_blank_text_through() {
        let body = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "\n"}]}, "finishReason": "STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            GeminiClient::extract_text(response, "gemini-2.5-flash").unwrap(),
            "\n"
        );

        let body = r#"{"candidates": [{"content": {"role": "model", "parts": []}, "finishReason": "SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(GeminiClient::extract_text(response, "m").unwrap(), "");
    }

    #[test]
    fn test_supports_search() {
        let client = GeminiClient::new("key".to_string());
        assert!(client.supports_search("gemini-2.5-flash"));
        assert!(client.supports_search("gemini-3-pro"));
        assert!(!client.supports_search("gemini-1.5-pro"));
    }
}
