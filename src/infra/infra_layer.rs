// The infra module contains implementations of core traits.
// Each external system gets its own submodule.

#[path = "google_auth/mod.rs"]
pub mod google_auth;

#[path = "ga4/mod.rs"]
pub mod ga4;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "output/mod.rs"]
pub mod output;
