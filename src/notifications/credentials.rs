use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::FcmConfig;

pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are refreshed this long before they expire.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("push credentials are not configured")]
    NotConfigured,

    #[error("invalid service account key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),

    #[error("failed to sign assertion: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("token exchange request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token exchange rejected: {status} - {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Used when no service account is configured. Every exchange fails, so
/// dispatches with targets fail as a whole and nothing is sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredTokenSource;

#[async_trait]
impl AccessTokenSource for UnconfiguredTokenSource {
    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        Err(CredentialError::NotConfigured)
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(client_email: &str, token_uri: &str, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: client_email.to_string(),
            scope: MESSAGING_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Signed-JWT (RS256) exchange against the OAuth2 token endpoint. The access
/// token is cached and reused until shortly before its expiry.
pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    client_email: String,
    private_key: SecretString,
    token_uri: String,
    cache: RwLock<Option<AccessToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(client: reqwest::Client, config: &FcmConfig) -> Self {
        Self {
            client,
            client_email: config.client_email.clone(),
            private_key: config.private_key.clone(),
            token_uri: config.token_uri.clone(),
            cache: RwLock::new(None),
        }
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(CredentialError::InvalidKey)?;
        let claims = AssertionClaims::new(&self.client_email, &self.token_uri, now);
        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(CredentialError::Signing)
    }

    async fn exchange(&self) -> Result<AccessToken, CredentialError> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;
        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body
            .expires_in
            .unwrap_or(ASSERTION_LIFETIME_SECS)
            .min(ASSERTION_LIFETIME_SECS);

        tracing::debug!(expires_in = lifetime, "obtained push access token");

        Ok(AccessToken {
            token: SecretString::from(body.access_token),
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.clone());
        }

        let token = self.exchange().await?;
        *cache = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn assertion_claims_expire_after_one_hour() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let claims = AssertionClaims::new(
            "push@example.iam.gserviceaccount.com",
            "https://oauth2.googleapis.com/token",
            now,
        );

        assert_eq!(claims.iss, "push@example.iam.gserviceaccount.com");
        assert_eq!(claims.aud, "https://oauth2.googleapis.com/token");
        assert_eq!(claims.scope, MESSAGING_SCOPE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_is_stale_inside_skew_window() {
        let now = Utc::now();
        let token = AccessToken {
            token: SecretString::from("t".to_string()),
            expires_at: now + Duration::seconds(30),
        };
        assert!(!token.is_fresh(now));

        let token = AccessToken {
            token: SecretString::from("t".to_string()),
            expires_at: now + Duration::minutes(30),
        };
        assert!(token.is_fresh(now));
    }

    #[test]
    fn signing_with_garbage_key_is_an_invalid_key_error() {
        let config = FcmConfig {
            project_id: "demo".into(),
            client_email: "push@example.com".into(),
            private_key: SecretString::from("not a pem".to_string()),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            vapid_public_key: None,
        };
        let source = ServiceAccountTokenSource::new(reqwest::Client::new(), &config);

        let err = source.sign_assertion(Utc::now()).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn unconfigured_source_always_fails() {
        let err = UnconfiguredTokenSource.access_token().await.unwrap_err();
        assert!(matches!(err, CredentialError::NotConfigured));
    }
}
