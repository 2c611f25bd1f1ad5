// Narrative generation: wraps the formatted report block in a fixed
// instruction template and asks a generative backend for a markdown report.
//
// **Model fallback:**
// Candidate models are tried in order, once each. The walk stops at the
// first success. A "model not found" answer moves on to the next candidate;
// any other error is returned immediately. If every candidate is unknown to
// the backend, the last failure is returned.

use super::narrative_models::{
    GenerationError, GenerationRequest, GenerationTool, GenerativeBackend, Narrative,
};

const PROMPT_TEMPLATE: &str = "\
You are an outstanding marketer with deep expertise in Google Analytics 4 (GA4).
The GA4 data below covers the website's results for last month and the month before it.
Write a monthly report based on this data.

[Absolute output rules]
1. Do not write any greeting or self-introduction. Start the very first line with the report content itself (for example a heading).
2. Reproduce ALL of the provided KPI comparison and top-N data at the top of the report as readable markdown tables or lists. Keep the given headings unchanged.
3. After the data, give the following three analyses from a professional point of view:
   - Analysis and conclusion: identify the metric with the largest change versus the previous month and draw one business conclusion from it.
   - Action plan: based on that analysis, propose the single most effective social media initiative for next month to maximise the conversion rate (CVR).
   - Anomaly detection: identify any channel (source) whose sessions grew or dropped sharply, and use web search to investigate external factors that could explain it (news, industry trends, competitor moves, etc.).

[GA4 data]
{data}
";

/// Builds the full prompt for a formatted data block.
pub fn build_prompt(data_block: &str) -> String {
    PROMPT_TEMPLATE.replace("{data}", data_block.trim_end())
}

pub struct NarrativeService<G: GenerativeBackend> {
    backend: G,
    models: Vec<String>,
    google_search: bool,
    temperature: Option<f32>,
}

impl<G: GenerativeBackend> NarrativeService<G> {
    /// `models` is the candidate list, primary first.
    pub fn new(backend: G, models: Vec<String>, google_search: bool) -> Self {
        Self {
            backend,
            models,
            google_search,
            temperature: None,
        }
    }

    /// Sampling temperature sent with every request.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_for(&self, model: &str, prompt: &str) -> GenerationRequest {
        let mut tools = Vec::new();
        if self.google_search {
            if self.backend.supports_search(model) {
                tools.push(GenerationTool::GoogleSearch);
            } else {
                tracing::warn!(
                    "Model {} does not support search grounding; sending the request without it",
                    model
                );
            }
        }

        GenerationRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            tools,
            temperature: self.temperature,
        }
    }

    /// Generates the narrative for `data_block`.
    pub async fn generate(&self, data_block: &str) -> Result<Narrative, GenerationError> {
        let prompt = build_prompt(data_block);
        let mut last_error = None;

        for model in &self.models {
            let request = self.request_for(model, &prompt);
            tracing::info!(
                "Requesting narrative from {} ({} chars prompt, {} tool(s))",
                model,
                prompt.len(),
                request.tools.len()
            );

            match self.backend.generate(&request).await {
                Ok(text) => {
                    return Ok(Narrative {
                        text,
                        model: model.clone(),
                    })
                }
                Err(err @ GenerationError::ModelNotFound { .. }) => {
                    tracing::warn!("{}; trying the next candidate model", err);
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(GenerationError::NoCandidates))
    }
}
