use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::notifications::PushPayload;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    NewOrder,
    Test,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DispatchRequest {
    #[serde(rename = "type")]
    pub kind: DispatchKind,
    pub payload: PushPayload,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PushConfig {
    pub enabled: bool,
    /// Public key the service worker subscribes with.
    pub vapid_public_key: Option<String>,
}
