use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use secrecy::ExposeSecret;

use crate::{
    models::DeviceToken,
    notifications::{
        AccessTokenSource, DispatchError, DispatchReport, Notifier, PushEvent, PushGateway,
        PushPayload, TokenDelivery,
    },
    repositories::{DeviceTokenStore, StoreError},
};

const TOKEN_SUFFIX_LEN: usize = 8;

pub struct Dispatcher {
    tokens: Arc<dyn DeviceTokenStore>,
    credentials: Arc<dyn AccessTokenSource>,
    gateway: Arc<dyn PushGateway>,
}

impl Dispatcher {
    pub fn new(
        tokens: Arc<dyn DeviceTokenStore>,
        credentials: Arc<dyn AccessTokenSource>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        Self {
            tokens,
            credentials,
            gateway,
        }
    }

    async fn resolve_targets(&self, event: PushEvent) -> Result<Vec<DeviceToken>, StoreError> {
        match event {
            PushEvent::NewOrder => self.tokens.admin_tokens().await,
            PushEvent::Test { owner_id } => {
                Ok(self.tokens.token_for(owner_id).await?.into_iter().collect())
            }
        }
    }

    async fn deliver(
        &self,
        access_token: &str,
        target: &DeviceToken,
        payload: &PushPayload,
    ) -> TokenDelivery {
        let token_suffix = token_suffix(&target.token);
        match self.gateway.send(access_token, &target.token, payload).await {
            Ok(message_id) => TokenDelivery {
                owner_id: target.owner_id,
                token_suffix,
                delivered: true,
                message_id: Some(message_id),
                error: None,
                token_invalid: false,
            },
            Err(err) => {
                tracing::warn!(
                    owner_id = %target.owner_id,
                    token = %token_suffix,
                    error = %err,
                    "push delivery failed"
                );
                TokenDelivery {
                    owner_id: target.owner_id,
                    token_suffix,
                    delivered: false,
                    message_id: None,
                    token_invalid: err.is_invalid_token(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    #[tracing::instrument(
        name = "notifications.dispatch",
        skip_all,
        fields(event = event.name()),
        err
    )]
    async fn dispatch(
        &self,
        event: PushEvent,
        payload: PushPayload,
    ) -> Result<DispatchReport, DispatchError> {
        let targets = self.resolve_targets(event).await?;
        if targets.is_empty() {
            tracing::info!("no push targets registered");
            return Ok(DispatchReport::no_targets());
        }

        let credential = self.credentials.access_token().await?;
        let access_token = credential.token.expose_secret();

        let deliveries = targets
            .iter()
            .map(|target| self.deliver(access_token, target, &payload));
        let report = DispatchReport::from_results(join_all(deliveries).await);

        tracing::info!(
            targets = targets.len(),
            delivered = report.success_count,
            failed = report.failure_count,
            "push dispatch finished"
        );

        Ok(report)
    }
}

fn token_suffix(token: &str) -> String {
    let start = token.len().saturating_sub(TOKEN_SUFFIX_LEN);
    token.get(start..).unwrap_or(token).to_string()
}
