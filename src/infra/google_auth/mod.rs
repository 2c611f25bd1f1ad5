// Google OAuth2 for server-to-server API calls.

#[path = "service_account.rs"]
pub mod service_account;

pub use service_account::ServiceAccountAuth;
