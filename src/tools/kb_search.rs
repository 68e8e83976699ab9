//! 知识库检索工具
//!
//! 解答智能体的落地入口：包装只读 KnowledgeIndex，结果为 SearchOutcome 的
//! JSON 序列化。工具本身永不失败——序列化错误也折叠为 success=false。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::retrieval::{KnowledgeIndex, SearchOutcome};
use crate::tools::Tool;

pub const KNOWLEDGE_SEARCH_TOOL: &str = "search_knowledge_base";

/// 知识库检索工具
pub struct KnowledgeSearchTool {
    index: Arc<KnowledgeIndex>,
}

impl KnowledgeSearchTool {
    pub fn new(index: Arc<KnowledgeIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        KNOWLEDGE_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the knowledge base for product features, policies and procedures. \
         Args: {\"query\": \"free text question\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let outcome = if query.trim().is_empty() {
            SearchOutcome::failure(query, "missing query argument")
        } else {
            self.index.search(query)
        };
        tracing::info!(
            tool_name = KNOWLEDGE_SEARCH_TOOL,
            success = outcome.success,
            count = outcome.count,
            "knowledge base search"
        );
        Ok(serde_json::to_string(&outcome).unwrap_or_else(|e| {
            format!(r#"{{"success": false, "error": "serialization failed: {e}"}}"#)
        }))
    }
}
