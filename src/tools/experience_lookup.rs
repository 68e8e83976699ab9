//! 体验查询工具

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::storage::{ExperienceRecord, ProductStore};
use crate::tools::user_lookup::error_json;
use crate::tools::Tool;

/// 按 experience_id 精确查询或按标题模糊检索体验信息
pub struct ExperienceLookupTool {
    store: Arc<ProductStore>,
}

impl ExperienceLookupTool {
    pub fn new(store: Arc<ProductStore>) -> Self {
        Self { store }
    }

    fn render(record: &ExperienceRecord) -> Value {
        serde_json::json!({
            "experience_id": record.experience_id,
            "title": record.title,
            "description": record.description,
            "location": record.location,
            "when": record.happens_at,
            "slots_available": record.slots_available,
            "is_premium": record.is_premium,
        })
    }
}

#[async_trait]
impl Tool for ExperienceLookupTool {
    fn name(&self) -> &str {
        "lookup_experience"
    }

    fn description(&self) -> &str {
        "Look up experience information by id or by partial title match. \
         Args: {\"experience_id\": \"exp-1\"} or {\"title_search\": \"museum\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "experience_id": { "type": "string", "description": "Experience id" },
                "title_search": { "type": "string", "description": "Partial title" }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let experience_id = args.get("experience_id").and_then(|v| v.as_str());
        let title_search = args.get("title_search").and_then(|v| v.as_str());

        match (experience_id, title_search) {
            (Some(id), _) => match self.store.experience_by_id(id) {
                Ok(Some(record)) => Ok(serde_json::json!({
                    "success": true,
                    "experience": Self::render(&record),
                })
                .to_string()),
                Ok(None) => Ok(error_json(&format!("experience not found: {id}"))),
                Err(e) => Ok(error_json(&e.to_string())),
            },
            (None, Some(search)) => match self.store.experiences_by_title(search) {
                Ok(records) if records.is_empty() => {
                    Ok(error_json(&format!("no experiences matching: {search}")))
                }
                Ok(records) => {
                    let rows: Vec<Value> = records.iter().map(Self::render).collect();
                    Ok(serde_json::json!({
                        "success": true,
                        "count": rows.len(),
                        "experiences": rows,
                    })
                    .to_string())
                }
                Err(e) => Ok(error_json(&e.to_string())),
            },
            (None, None) => Ok(error_json("please provide either experience_id or title_search")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_title_search() {
        let store = ProductStore::open_in_memory().unwrap();
        store
            .insert_experience(
                "e1",
                "Museum Night Tour",
                "Evening tour.",
                "Downtown",
                "2026-09-01 19:00",
                12,
                true,
            )
            .unwrap();
        let tool = ExperienceLookupTool::new(Arc::new(store));

        let out = tool
            .execute(serde_json::json!({"title_search": "museum"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["count"], 1);
        assert_eq!(v["experiences"][0]["title"], "Museum Night Tour");
    }
}
