// GA4 infra layer.
// - `ga4_client.rs` talks to the Google Analytics Data API.

#[path = "ga4_client.rs"]
pub mod ga4_client;

pub use ga4_client::{Ga4DataClient, ANALYTICS_READONLY_SCOPE};
