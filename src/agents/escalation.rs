//! 升级智能体：人工交接
//!
//! 产出交接消息并生成工单参考号（工单内容的短数字哈希，仅作参考标签，
//! 不保证无碰撞——不可当唯一键使用）。唯一有权置位终态 escalated 的智能体；
//! 模型失败时回退到固定文案，参考号生成逻辑不变。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::{ConversationState, Message};
use crate::llm::LlmClient;

const ESCALATION_PROMPT: &str = "You are an escalation specialist for CultPass customer \
support. Your role is to handle tickets that need human intervention. You should:\n\
- Acknowledge the customer's concern\n\
- Summarize the issue clearly\n\
- Explain that a human agent will review the case\n\
- Set appropriate expectations for response time\n\
- Be empathetic and professional\n\n\
Create a clear summary that will help the human agent understand the issue quickly.";

const RESPONSE_TIME_NOTE: &str =
    "A human support agent will review your case and respond within 24 hours.";

/// 工单参考号：内容哈希取 4 位十进制，前缀 ESC-
pub fn ticket_reference(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("ESC-{:04}", hasher.finish() % 10000)
}

/// 升级智能体
pub struct EscalationAgent {
    llm: Arc<dyn LlmClient>,
}

impl EscalationAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 生成交接消息并无条件置位 escalated + escalation_requested
    pub async fn run(&self, state: &mut ConversationState) {
        let ticket_content = state
            .last_message()
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "No ticket content available".to_string());
        let reference = ticket_reference(&ticket_content);

        let classification_note = state
            .classification
            .as_ref()
            .map(|c| {
                format!(
                    "Issue type: {}, urgency: {}, summary: {}",
                    c.issue_type.as_str(),
                    c.urgency.as_str(),
                    c.summary
                )
            })
            .unwrap_or_else(|| "Not classified".to_string());
        let resolution_note = if state.resolution_attempted {
            "Resolution was attempted but the issue requires human intervention."
        } else {
            "The issue was escalated before a resolution attempt."
        };

        let prompt = [
            Message::system(ESCALATION_PROMPT),
            Message::user(format!(
                "Ticket details: {ticket_content}\n\nClassification: {classification_note}\n\n{resolution_note}"
            )),
        ];

        let handoff = match self.llm.complete(&prompt).await {
            Ok(body) if !body.trim().is_empty() => format!(
                "{}\n\nTicket reference: {reference}\n{RESPONSE_TIME_NOTE}",
                body.trim()
            ),
            Ok(_) | Err(_) => format!(
                "I understand you need additional assistance. I've escalated your ticket \
                 to our human support team.\n\nTicket reference: {reference}\n\
                 {RESPONSE_TIME_NOTE} Thank you for your patience."
            ),
        };

        tracing::info!(
            agent = "escalation",
            thread_id = %state.thread_id,
            reference = %reference,
            "ticket escalated to human support"
        );
        state.messages.push(Message::assistant(handoff));
        state.escalated = true;
        state.escalation_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::MockLlmClient;

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            Err("offline".to_string())
        }
    }

    fn reference_suffix_is_four_digits(reference: &str) -> bool {
        reference
            .strip_prefix("ESC-")
            .map(|s| s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }

    #[test]
    fn test_reference_format_and_determinism() {
        let a = ticket_reference("my password is broken");
        let b = ticket_reference("my password is broken");
        assert_eq!(a, b);
        assert!(reference_suffix_is_four_digits(&a));
    }

    #[tokio::test]
    async fn test_sets_terminal_flags_and_reference() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "We are sorry about the trouble; a specialist will take over.",
        ]));
        let agent = EscalationAgent::new(llm);
        let mut state = ConversationState::new("t", "u", "acct");
        state.messages.push(Message::user("I need a human, now"));

        agent.run(&mut state).await;

        assert!(state.escalated);
        assert!(state.escalation_requested);
        let reply = state.last_assistant_message().unwrap();
        assert!(reply.content.contains("Ticket reference: ESC-"));
        assert!(reply.content.contains("within 24 hours"));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_canned_handoff() {
        let agent = EscalationAgent::new(Arc::new(FailingLlm));
        let mut state = ConversationState::new("t", "u", "acct");
        state.messages.push(Message::user("escalate please"));

        agent.run(&mut state).await;

        assert!(state.escalated);
        assert!(state.escalation_requested);
        let reply = state.last_assistant_message().unwrap();
        assert!(reply.content.contains("Ticket reference: ESC-"));
        assert!(reply.content.contains("Thank you for your patience"));
    }
}
