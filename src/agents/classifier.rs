//! 分类智能体
//!
//! 将原始工单文本（含此前对话）映射为结构化分类记录。
//! 结构化输出走 schema 注入：schemars 生成的 JSON Schema 拼入 system prompt，
//! 回复中提取 JSON 反序列化。任何失败都 fail-closed 到确定性回退分类。

use std::sync::Arc;

use schemars::schema_for;

use crate::agents::extract_json;
use crate::core::{Classification, ConversationState, Message, Role};
use crate::llm::LlmClient;

const CLASSIFIER_PROMPT: &str = "You are a ticket classification agent for CultPass customer support. \
Your job is to analyze customer support tickets and classify them accurately. \
Classify tickets into one of these categories:\n\
- login: Issues with account access, passwords, authentication\n\
- subscription: Questions about subscription status, tiers, quotas, cancellation\n\
- reservation: Issues with booking, canceling, or managing reservations\n\
- billing: Payment issues, refunds, billing questions\n\
- technical: App issues, QR codes, technical problems\n\
- other: Anything that doesn't fit the above categories\n\n\
Also assess urgency: low, medium, high, or critical.\n\
Provide a confidence score between 0.0 and 1.0.\n\
Extract relevant tags and provide a brief summary.";

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
        Role::Tool => "Tool",
    }
}

/// 分类智能体
pub struct ClassifierAgent {
    llm: Arc<dyn LlmClient>,
}

impl ClassifierAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 分类当前工单并写入状态；失败时写入回退分类（不中断回合）
    pub async fn run(&self, state: &mut ConversationState) {
        let Some(ticket) = state.messages.last() else {
            return;
        };
        let ticket_content = ticket.content.clone();

        // 此前对话的带角色标注渲染 + 当前工单正文
        let context: String = state.messages[..state.messages.len() - 1]
            .iter()
            .map(|m| format!("{}: {}", role_label(m.role), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let full_context = if context.is_empty() {
            ticket_content
        } else {
            format!("Previous conversation:\n{context}\n\nCurrent ticket: {ticket_content}")
        };

        let schema = serde_json::to_string_pretty(&schema_for!(Classification))
            .unwrap_or_else(|_| String::new());
        let system = format!(
            "{CLASSIFIER_PROMPT}\n\nRespond with a single JSON object matching this schema:\n{schema}"
        );
        let prompt = [
            Message::system(system),
            Message::user(format!("Classify this ticket: {full_context}")),
        ];

        let classification = match self.llm.complete(&prompt).await {
            Ok(output) => parse_classification(&output).unwrap_or_else(|| {
                tracing::warn!(
                    agent = "classifier",
                    thread_id = %state.thread_id,
                    "model output did not match the classification schema, using fallback"
                );
                Classification::fallback()
            }),
            Err(e) => {
                tracing::warn!(
                    agent = "classifier",
                    thread_id = %state.thread_id,
                    error = %e,
                    "classification call failed, using fallback"
                );
                Classification::fallback()
            }
        };

        tracing::info!(
            agent = "classifier",
            thread_id = %state.thread_id,
            classification = %format!(
                "{} ({}, confidence {:.2})",
                classification.issue_type.as_str(),
                classification.urgency.as_str(),
                classification.confidence
            ),
            "ticket classified"
        );
        state.classification = Some(classification);
    }
}

/// 从模型输出提取并解析分类记录；置信度截断到 [0,1]
fn parse_classification(output: &str) -> Option<Classification> {
    let json = extract_json(output)?;
    serde_json::from_str::<Classification>(json)
        .ok()
        .map(Classification::clamped)
}
