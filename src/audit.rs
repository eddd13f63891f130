use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    OrderPlaced,
    DiscountCreated,
    DiscountUpdated,
    DeviceTokenRegistered,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderPlaced => "order_placed",
            AuditAction::DiscountCreated => "discount_created",
            AuditAction::DiscountUpdated => "discount_updated",
            AuditAction::DeviceTokenRegistered => "device_token_registered",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource: &'static str,
    pub resource_id: Option<String>,
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub fn new(actor_id: Uuid, action: AuditAction, resource: &'static str) -> Self {
        Self {
            actor_id: Some(actor_id),
            action,
            resource,
            resource_id: None,
            metadata: None,
        }
    }

    pub fn resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub async fn log_audit(pool: &DbPool, entry: AuditEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, actor_id, action, resource, resource_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.actor_id)
    .bind(entry.action.as_str())
    .bind(entry.resource)
    .bind(entry.resource_id)
    .bind(entry.metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit writes never fail the request that triggered them.
pub async fn record(pool: &DbPool, entry: AuditEntry) {
    let action = entry.action.as_str();
    if let Err(err) = log_audit(pool, entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_match_stored_values() {
        assert_eq!(AuditAction::OrderPlaced.as_str(), "order_placed");
        assert_eq!(AuditAction::DeviceTokenRegistered.as_str(), "device_token_registered");
    }

    #[test]
    fn builder_fills_optional_fields() {
        let actor = Uuid::new_v4();
        let entry = AuditEntry::new(actor, AuditAction::DiscountCreated, "discount_codes")
            .resource_id(42)
            .metadata(serde_json::json!({ "code": "WELCOME10" }));
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.resource_id.as_deref(), Some("42"));
        assert_eq!(entry.metadata.expect("metadata")["code"], "WELCOME10");
    }
}
