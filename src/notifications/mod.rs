//! Web push delivery through Firebase Cloud Messaging.
//!
//! A dispatch resolves the device tokens for an event, exchanges the service
//! account for a short-lived OAuth2 access token and then fans the message out
//! to every token. Each token succeeds or fails on its own; the report lists
//! one entry per target.

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::repositories::StoreError;

pub mod credentials;
pub mod dispatcher;
pub mod fcm;

pub use credentials::{
    AccessToken, AccessTokenSource, CredentialError, ServiceAccountTokenSource,
    UnconfiguredTokenSource,
};
pub use dispatcher::Dispatcher;
pub use fcm::{DeliveryError, FcmGateway, PushGateway};

/// Who receives a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    /// Every administrator with a registered device.
    NewOrder,
    /// A single owner, used to verify a device registration.
    Test { owner_id: Uuid },
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::NewOrder => "new_order",
            PushEvent::Test { .. } => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PushPayload {
    pub title: String,
    pub message: String,
    /// Click-through link opened by the service worker.
    pub url: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TokenDelivery {
    pub owner_id: Uuid,
    /// Last characters of the device token, enough to correlate in logs.
    pub token_suffix: String,
    pub delivered: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    /// The gateway reported the token as unregistered. It is not removed.
    pub token_invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DispatchReport {
    pub success: bool,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<TokenDelivery>,
    pub message: Option<String>,
}

impl DispatchReport {
    pub fn no_targets() -> Self {
        Self {
            success: true,
            success_count: 0,
            failure_count: 0,
            results: Vec::new(),
            message: Some("no targets".to_string()),
        }
    }

    pub fn from_results(results: Vec<TokenDelivery>) -> Self {
        let success_count = results.iter().filter(|r| r.delivered).count();
        let failure_count = results.len() - success_count;
        Self {
            success: true,
            success_count,
            failure_count,
            results,
            message: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to resolve push targets: {0}")]
    Targets(#[from] StoreError),

    #[error("credential exchange failed: {0}")]
    Credential(#[from] CredentialError),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(
        &self,
        event: PushEvent,
        payload: PushPayload,
    ) -> Result<DispatchReport, DispatchError>;
}
