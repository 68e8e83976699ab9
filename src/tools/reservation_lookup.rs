//! 预订查询工具

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::storage::ProductStore;
use crate::tools::user_lookup::error_json;
use crate::tools::Tool;

/// 查询某客户的预订列表，可按状态过滤（reserved / cancelled / completed）
pub struct ReservationLookupTool {
    store: Arc<ProductStore>,
}

impl ReservationLookupTool {
    pub fn new(store: Arc<ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReservationLookupTool {
    fn name(&self) -> &str {
        "lookup_reservations"
    }

    fn description(&self) -> &str {
        "List a customer's reservations with experience titles, optionally filtered \
         by status. Args: {\"user_id\": \"a4ab87\", \"status\": \"reserved\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "Customer id" },
                "status": {
                    "type": "string",
                    "description": "Optional status filter: reserved / cancelled / completed"
                }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let Some(user_id) = args.get("user_id").and_then(|v| v.as_str()) else {
            return Ok(error_json("user_id is required"));
        };
        let status = args.get("status").and_then(|v| v.as_str());

        match self.store.reservations_for(user_id, status) {
            Ok(None) => Ok(error_json(&format!("user not found: {user_id}"))),
            Ok(Some((full_name, reservations))) => {
                let rows: Vec<Value> = reservations
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "reservation_id": r.reservation_id,
                            "experience": r.experience_title,
                            "status": r.status,
                            "created_at": r.created_at.to_rfc3339(),
                        })
                    })
                    .collect();
                Ok(serde_json::json!({
                    "success": true,
                    "customer": full_name,
                    "count": rows.len(),
                    "reservations": rows,
                })
                .to_string())
            }
            Err(e) => Ok(error_json(&e.to_string())),
        }
    }
}
