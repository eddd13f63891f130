use std::{env, str::FromStr};

use anyhow::Context;
use rust_decimal::Decimal;
use secrecy::SecretString;

use crate::pricing::{PricingConfig, ShippingRule};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub pricing: PricingConfig,
    pub storefront_url: String,
    pub fcm: Option<FcmConfig>,
}

/// Service account used to obtain FCM access tokens.
#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    pub client_email: String,
    pub private_key: SecretString,
    pub token_uri: String,
    pub vapid_public_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let pricing = PricingConfig {
            shipping: ShippingRule {
                flat_rate: decimal_var("SHIPPING_FLAT_RATE", Decimal::new(1500, 2))?,
                free_threshold: decimal_var("SHIPPING_FREE_THRESHOLD", Decimal::new(15000, 2))?,
            },
            tax_rate: decimal_var("TAX_RATE", Decimal::new(8, 2))?,
        };

        let storefront_url = env::var("STOREFRONT_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret: SecretString::from(jwt_secret),
            pricing,
            storefront_url,
            fcm: FcmConfig::from_env(),
        })
    }
}

impl FcmConfig {
    /// Push delivery is enabled only when the whole service account is present.
    fn from_env() -> Option<Self> {
        let project_id = non_empty_var("FCM_PROJECT_ID")?;
        let client_email = non_empty_var("FCM_CLIENT_EMAIL")?;
        // Keys pasted into .env files usually carry escaped newlines.
        let private_key = non_empty_var("FCM_PRIVATE_KEY")?.replace("\\n", "\n");

        Some(Self {
            project_id,
            client_email,
            private_key: SecretString::from(private_key),
            token_uri: non_empty_var("FCM_TOKEN_URI")
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            vapid_public_key: non_empty_var("FCM_VAPID_PUBLIC_KEY"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn decimal_var(key: &str, default: Decimal) -> anyhow::Result<Decimal> {
    match non_empty_var(key) {
        Some(raw) => Decimal::from_str(raw.trim())
            .with_context(|| format!("{key} must be a decimal number, got {raw:?}")),
        None => Ok(default),
    }
}
