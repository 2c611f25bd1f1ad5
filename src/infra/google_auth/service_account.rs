// =============================================================================
// GOOGLE SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// OAuth2 "JWT bearer" flow for server-to-server calls to Google APIs:
// sign a short-lived JWT with the service account's private key, exchange it
// at the key's `token_uri` for an access token, and send that token as a
// Bearer header.
//
// **Setup:**
// 1. Create a service account in Google Cloud Console and download a JSON key.
// 2. Enable the "Google Analytics Data API" for the project.
// 3. In GA4 Admin > Property access management, add the service account
//    email (name@project.iam.gserviceaccount.com) as a Viewer.
// 4. Point `GOOGLE_APPLICATION_CREDENTIALS` at the key file, or put the JSON
//    itself in `GOOGLE_SERVICE_ACCOUNT_JSON` (handy in CI secrets).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::config::CredentialsSource;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read service account key {path}: {source}")]
    ReadKey {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid service account JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Failed to sign JWT: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },
}

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// Where to exchange the JWT for an access token.
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    /// At most one hour after `iat`.
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scope: String,
    client: Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Creates an authenticator from JSON key content.
    pub fn from_json(json: &str, scope: &str) -> Result<Self, AuthError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self {
            credentials,
            scope: scope.to_string(),
            client: Client::new(),
            cached_token: RwLock::new(None),
        })
    }

    /// Creates an authenticator from the configured key location.
    pub async fn from_source(source: &CredentialsSource, scope: &str) -> Result<Self, AuthError> {
        match source {
            CredentialsSource::File(path) => {
                let content =
                    tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| AuthError::ReadKey {
                            path: path.display().to_string(),
                            source,
                        })?;
                Self::from_json(&content, scope)
            }
            CredentialsSource::Inline(json) => Self::from_json(json, scope),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let (token, lifetime) = self.fetch_new_token().await?;

        let mut cached = self.cached_token.write().await;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: SystemTime::now() + lifetime,
        });

        Ok(token)
    }

    fn claims(&self, now: u64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        }
    }

    fn signed_assertion(&self, now: u64) -> Result<String, AuthError> {
        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        Ok(encode(&header, &self.claims(now), &key)?)
    }

    /// Fetches a new access token from Google.
    async fn fetch_new_token(&self) -> Result<(String, Duration), AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let jwt = self.signed_assertion(now)?;

        tracing::debug!(
            "Exchanging service account JWT for {} at {}",
            self.credentials.client_email,
            self.credentials.token_uri
        );

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(AuthError::TokenExchange { status, body });
        }

        let token_response: TokenResponse = response.json().await?;
        // Refresh five minutes early.
        let lifetime = token_response
            .expires_in
            .unwrap_or(3600)
            .saturating_sub(300);

        Ok((token_response.access_token, Duration::from_secs(lifetime)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

    fn key_json(private_key: &str) -> String {
        serde_json::json!({
            "type": "service_account",
            "client_email": "reporter@demo-project.iam.gserviceaccount.com",
            "private_key": private_key,
            "token_uri": "https://oauth2.googleapis.com/token",
        })
        .to_string()
    }

    #[test]
    fn test_claims_use_scope_and_token_uri() {
        let auth = ServiceAccountAuth::from_json(&key_json("unused"), SCOPE).unwrap();

        let claims = auth.claims(1_700_000_000);

        assert_eq!(
            claims,
            JwtClaims {
                iss: "reporter@demo-project.iam.gserviceaccount.com".to_string(),
                scope: SCOPE.to_string(),
                aud: "https://oauth2.googleapis.com/token".to_string(),
                iat: 1_700_000_000,
                exp: 1_700_003_600,
            }
        );
    }

    #[test]
    fn test_token_uri_defaults_when_absent() {
        let json = r#"{"client_email": "a@b.iam.gserviceaccount.com", "private_key": "k"}"#;
        let auth = ServiceAccountAuth::from_json(json, SCOPE).unwrap();
        assert_eq!(auth.credentials.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(auth.client_email(), "a@b.iam.gserviceaccount.com");
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let err = ServiceAccountAuth::from_json(r#"{"client_email": "x"}"#, SCOPE)
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_bad_private_key_fails_before_any_request() {
        let auth = ServiceAccountAuth::from_json(&key_json("not a pem"), SCOPE).unwrap();
        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Signing(_)));
    }

    #[tokio::test]
    async fn test_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = CredentialsSource::File(dir.path().join("missing.json"));

        let err = ServiceAccountAuth::from_source(&source, SCOPE)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AuthError::ReadKey { .. }));
    }

    #[tokio::test]
    async fn test_key_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(&path, key_json("pem")).unwrap();

        let auth = ServiceAccountAuth::from_source(&CredentialsSource::File(path), SCOPE)
            .await
            .unwrap();

        assert_eq!(
            auth.client_email(),
            "reporter@demo-project.iam.gserviceaccount.com"
        );
    }
}
