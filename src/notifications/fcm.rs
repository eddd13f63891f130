use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::notifications::PushPayload;

/// FCM HTTP v1 base URL.
const FCM_BASE_URL: &str = "https://fcm.googleapis.com/v1/projects";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("device token is no longer registered")]
    Unregistered,

    #[error("gateway rejected message: {status} - {message}")]
    Rejected { status: u16, message: String },
}

impl DeliveryError {
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, DeliveryError::Unregistered)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Sends one message and returns the gateway's message id.
    async fn send(
        &self,
        access_token: &str,
        device_token: &str,
        payload: &PushPayload,
    ) -> Result<String, DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Clone)]
pub struct FcmGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl FcmGateway {
    pub fn new(client: reqwest::Client, project_id: &str) -> Self {
        Self {
            client,
            endpoint: format!("{FCM_BASE_URL}/{project_id}/messages:send"),
        }
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(
        &self,
        access_token: &str,
        device_token: &str,
        payload: &PushPayload,
    ) -> Result<String, DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&build_message(device_token, payload))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND || message.contains("UNREGISTERED") {
                return Err(DeliveryError::Unregistered);
            }
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SendResponse = response.json().await?;
        Ok(body.name)
    }
}

/// Builds the `messages:send` body. FCM only accepts string values in `data`,
/// so anything else is sent as its JSON text.
pub fn build_message(device_token: &str, payload: &PushPayload) -> Value {
    let mut data: BTreeMap<String, String> = payload
        .data
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect();
    data.entry("url".to_string())
        .or_insert_with(|| payload.url.clone());

    json!({
        "message": {
            "token": device_token,
            "notification": {
                "title": payload.title,
                "body": payload.message,
            },
            "webpush": {
                "fcm_options": {
                    "link": payload.url,
                },
            },
            "data": data,
        }
    })
}
