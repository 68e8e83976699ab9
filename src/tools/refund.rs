//! 退款提交工具
//!
//! 退款不自动执行：缺少 reason 时返回错误形结果并提示升级；
//! 填写完整时仅登记待审批请求（人工审核后才会进入支付流程）。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::user_lookup::error_json;
use crate::tools::Tool;

const REFUND_POLICY_NOTE: &str =
    "Refunds are typically only available for cancelled subscriptions within 7 days of signup. \
     This request requires manual approval from a support lead.";

/// 退款提交工具（需人工审批）
#[derive(Default)]
pub struct RefundTool;

#[async_trait]
impl Tool for RefundTool {
    fn name(&self) -> &str {
        "submit_refund"
    }

    fn description(&self) -> &str {
        "Submit a refund request for manual approval. Only use when explicitly approved; \
         a reason is mandatory. Args: {\"user_id\": \"a4ab87\", \"amount\": 19.9, \
         \"reason\": \"cancelled within 7 days\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "Customer id" },
                "amount": { "type": "number", "description": "Optional amount; calculated when omitted" },
                "reason": { "type": "string", "description": "Mandatory reason for the refund" }
            },
            "required": ["user_id", "reason"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let Some(user_id) = args.get("user_id").and_then(|v| v.as_str()) else {
            return Ok(error_json("user_id is required"));
        };
        let reason = args
            .get("reason")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(reason) = reason else {
            return Ok(error_json(
                "refund reason is required; refunds can only be processed with approval \
                 from a support lead - please escalate this request",
            ));
        };
        let amount = args.get("amount").and_then(|v| v.as_f64());

        Ok(serde_json::json!({
            "success": true,
            "refund_request": {
                "user_id": user_id,
                "reason": reason,
                "amount": amount,
                "status": "pending_approval",
            },
            "note": REFUND_POLICY_NOTE,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reason_is_mandatory() {
        let out = RefundTool
            .execute(serde_json::json!({"user_id": "c1"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().contains("escalate"));
    }

    #[tokio::test]
    async fn test_submission_is_pending_approval() {
        let out = RefundTool
            .execute(serde_json::json!({
                "user_id": "c1",
                "amount": 19.9,
                "reason": "cancelled within 7 days"
            }))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["refund_request"]["status"], "pending_approval");
    }
}
