use async_trait::async_trait;
use thiserror::Error;

/// Errors a generative backend can return.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The backend does not know the requested model. This is the only
    /// error that moves the narrative service on to the next candidate.
    #[error("Model '{model}' not found: {message}")]
    ModelNotFound { model: String, message: String },
    #[error("Generative API error: {0}")]
    Api(String),
    #[error("Empty response from model '{0}' - it may have been blocked by safety filters")]
    EmptyResponse(String),
    #[error("No candidate models configured")]
    NoCandidates,
}

/// Server-side tools a request may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTool {
    /// Let the model ground its answer in live web search results.
    GoogleSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub tools: Vec<GenerationTool>,
    pub temperature: Option<f32>,
}

/// Generated text plus the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub text: String,
    pub model: String,
}

/// A "generate content" style text backend.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Returns the raw generated text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Whether `model` accepts the search grounding tool.
    fn supports_search(&self, _model: &str) -> bool {
        true
    }
}
