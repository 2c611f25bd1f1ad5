pub mod narrative_models;
pub mod narrative_service;

pub use narrative_models::{GenerationError, GenerationRequest, GenerationTool, GenerativeBackend};
pub use narrative_service::NarrativeService;
