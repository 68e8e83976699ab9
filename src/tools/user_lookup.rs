//! 客户档案查询工具

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::storage::ProductStore;
use crate::tools::Tool;

/// 按 user_id 或 email 查询客户档案（姓名、封禁状态、订阅、预订计数）
pub struct UserLookupTool {
    store: Arc<ProductStore>,
}

impl UserLookupTool {
    pub fn new(store: Arc<ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UserLookupTool {
    fn name(&self) -> &str {
        "lookup_user"
    }

    fn description(&self) -> &str {
        "Look up a customer profile by user_id or email: name, blocked status, \
         subscription and reservation counts. Args: {\"user_id\": \"a4ab87\"} or \
         {\"email\": \"alice@example.com\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "Customer id" },
                "email": { "type": "string", "description": "Customer email" }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let user_id = args.get("user_id").and_then(|v| v.as_str());
        let email = args.get("email").and_then(|v| v.as_str());

        let looked_up = match (user_id, email) {
            (Some(id), _) => self.store.customer_by_id(id),
            (None, Some(mail)) => self.store.customer_by_email(mail),
            (None, None) => {
                return Ok(error_json("please provide either user_id or email"));
            }
        };

        let profile = match looked_up {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                return Ok(error_json(&format!(
                    "user not found: {}",
                    user_id.or(email).unwrap_or_default()
                )));
            }
            Err(e) => return Ok(error_json(&e.to_string())),
        };

        let payload = serde_json::json!({
            "success": true,
            "user": {
                "user_id": profile.customer_id,
                "full_name": profile.full_name,
                "email": profile.email,
                "is_blocked": profile.is_blocked,
                "subscription": profile.subscription.as_ref().map(|s| serde_json::json!({
                    "tier": s.tier,
                    "status": s.status,
                    "monthly_quota": s.monthly_quota,
                })),
                "reservations_total": profile.reservation_total,
                "reservations_active": profile.reservation_active,
            }
        });
        Ok(payload.to_string())
    }
}

pub(crate) fn error_json(message: &str) -> String {
    serde_json::json!({ "success": false, "error": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_tool() -> UserLookupTool {
        let store = ProductStore::open_in_memory().unwrap();
        store
            .insert_customer("a4ab87", "Alice Example", "alice@example.com", false)
            .unwrap();
        store
            .insert_subscription("a4ab87", "premium", "active", 8)
            .unwrap();
        UserLookupTool::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let out = seeded_tool()
            .execute(serde_json::json!({"user_id": "a4ab87"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["user"]["full_name"], "Alice Example");
        assert_eq!(v["user"]["subscription"]["tier"], "premium");
    }

    #[tokio::test]
    async fn test_missing_args_is_structured_error() {
        let out = seeded_tool().execute(serde_json::json!({})).await.unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let out = seeded_tool()
            .execute(serde_json::json!({"user_id": "ghost"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().contains("not found"));
    }
}
