//! 订阅查询工具

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::storage::ProductStore;
use crate::tools::user_lookup::error_json;
use crate::tools::Tool;

/// 查询某客户的订阅详情（层级、状态、月度额度、开通时间）
pub struct SubscriptionLookupTool {
    store: Arc<ProductStore>,
}

impl SubscriptionLookupTool {
    pub fn new(store: Arc<ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SubscriptionLookupTool {
    fn name(&self) -> &str {
        "lookup_subscription"
    }

    fn description(&self) -> &str {
        "Look up subscription details for a customer: tier, status, monthly quota. \
         Args: {\"user_id\": \"a4ab87\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "Customer id" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let Some(user_id) = args.get("user_id").and_then(|v| v.as_str()) else {
            return Ok(error_json("user_id is required"));
        };

        match self.store.subscription_for(user_id) {
            Ok(None) => Ok(error_json(&format!("user not found: {user_id}"))),
            Ok(Some((full_name, None))) => Ok(error_json(&format!(
                "{full_name} has no subscription"
            ))),
            Ok(Some((full_name, Some(sub)))) => Ok(serde_json::json!({
                "success": true,
                "customer": full_name,
                "subscription": {
                    "tier": sub.tier,
                    "status": sub.status,
                    "monthly_quota": sub.monthly_quota,
                    "started_at": sub.started_at.to_rfc3339(),
                }
            })
            .to_string()),
            Err(e) => Ok(error_json(&e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_lookup() {
        let store = ProductStore::open_in_memory().unwrap();
        store
            .insert_customer("c1", "Bob", "bob@example.com", false)
            .unwrap();
        store.insert_subscription("c1", "basic", "active", 4).unwrap();
        let tool = SubscriptionLookupTool::new(Arc::new(store));

        let out = tool
            .execute(serde_json::json!({"user_id": "c1"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["subscription"]["tier"], "basic");
    }

    #[tokio::test]
    async fn test_no_subscription() {
        let store = ProductStore::open_in_memory().unwrap();
        store
            .insert_customer("c2", "Carol", "carol@example.com", false)
            .unwrap();
        let tool = SubscriptionLookupTool::new(Arc::new(store));

        let out = tool
            .execute(serde_json::json!({"user_id": "c2"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().contains("no subscription"));
    }
}
