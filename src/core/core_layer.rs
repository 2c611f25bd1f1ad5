// The core module contains all business logic.
// Each stage of the report pipeline gets its own submodule.

#[path = "config/mod.rs"]
pub mod config;

#[path = "reporting/mod.rs"]
pub mod reporting;

#[path = "narrative/mod.rs"]
pub mod narrative;

#[path = "output/mod.rs"]
pub mod output;

#[path = "pipeline/mod.rs"]
pub mod pipeline;
