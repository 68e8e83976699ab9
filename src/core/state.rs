//! 会话状态：工单在多智能体图中的流转单元
//!
//! 显式字段的带标签结构替代动态字典；消息角色为枚举，按 match 分派。
//! Checkpoint 只序列化可持久化子集，thread_id / user_id / account_id 等
//! 路由与身份字段仅在单次调用内有效，不跨检查点存活。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致，外加工具结果角色）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }

    pub fn from_str(s: &str) -> Role {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::System,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }
}

/// 工单问题类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Login,
    Subscription,
    Reservation,
    Billing,
    Technical,
    Other,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Login => "login",
            IssueType::Subscription => "subscription",
            IssueType::Reservation => "reservation",
            IssueType::Billing => "billing",
            IssueType::Technical => "technical",
            IssueType::Other => "other",
        }
    }
}

/// 紧急程度
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

/// 工单分类结果：由分类智能体产出一次，解答/升级智能体只读消费
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct Classification {
    /// 问题类型：login / subscription / reservation / billing / technical / other
    pub issue_type: IssueType,
    /// 紧急程度：low / medium / high / critical
    pub urgency: Urgency,
    /// 分类置信度，0.0 到 1.0
    pub confidence: f32,
    /// 相关标签（可选）
    pub tags: Option<String>,
    /// 问题简述
    pub summary: String,
}

impl Classification {
    /// 将置信度截断到 [0, 1]
    pub fn clamped(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }

    /// 模型无法产出合法结构时的确定性回退分类
    pub fn fallback() -> Self {
        Self {
            issue_type: IssueType::Other,
            urgency: Urgency::Medium,
            confidence: 0.5,
            tags: None,
            summary: "Unable to classify automatically".to_string(),
        }
    }
}

/// 检查点：按 thread_id 持久化的状态子集
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub messages: Vec<Message>,
    pub classification: Option<Classification>,
    pub resolution_attempted: bool,
    pub escalation_requested: bool,
    pub escalated: bool,
}

/// 会话状态：每个用户回合新建一份，由检查点恢复历史，
/// 每个图步骤恰好被一个智能体修改后交还路由器。
///
/// 不变式：escalated 单调（置 true 后不再复位）；resolution_attempted
/// 每回合至多置位一次；消息序列在回合内只追加不截断。
#[derive(Clone, Debug)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub classification: Option<Classification>,
    pub resolution_attempted: bool,
    pub escalation_requested: bool,
    pub escalated: bool,
    // 以下为调用内字段，不写入检查点
    pub thread_id: String,
    pub user_id: String,
    pub account_id: String,
}

impl ConversationState {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            messages: Vec::new(),
            classification: None,
            resolution_attempted: false,
            escalation_requested: false,
            escalated: false,
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            account_id: account_id.into(),
        }
    }

    /// 从检查点恢复持久化子集，身份字段由本次调用重新提供
    pub fn resume(
        checkpoint: Checkpoint,
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            messages: checkpoint.messages,
            classification: checkpoint.classification,
            resolution_attempted: checkpoint.resolution_attempted,
            escalation_requested: checkpoint.escalation_requested,
            escalated: checkpoint.escalated,
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            account_id: account_id.into(),
        }
    }

    pub fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            messages: self.messages.clone(),
            classification: self.classification.clone(),
            resolution_attempted: self.resolution_attempted,
            escalation_requested: self.escalation_requested,
            escalated: self.escalated,
        }
    }

    /// 最新一条消息（任意角色）
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 最近一条用户消息
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// 最近一条助手消息（send 的返回值来源）
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_clamp() {
        let c = Classification {
            issue_type: IssueType::Login,
            urgency: Urgency::High,
            confidence: 1.7,
            tags: None,
            summary: "x".into(),
        }
        .clamped();
        assert_eq!(c.confidence, 1.0);

        let c = Classification { confidence: -0.3, ..c }.clamped();
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_fallback_classification() {
        let c = Classification::fallback();
        assert_eq!(c.issue_type, IssueType::Other);
        assert_eq!(c.urgency, Urgency::Medium);
        assert_eq!(c.confidence, 0.5);
        assert!(c.tags.is_none());
    }

    #[test]
    fn test_checkpoint_roundtrip_drops_identity() {
        let mut state = ConversationState::new("t1", "u1", "acct");
        state.messages.push(Message::user("hello"));
        state.resolution_attempted = true;

        let cp = state.to_checkpoint();
        let json = serde_json::to_string(&cp).unwrap();
        assert!(!json.contains("thread_id"));
        assert!(!json.contains("user_id"));

        let restored: Checkpoint = serde_json::from_str(&json).unwrap();
        let next = ConversationState::resume(restored, "t1", "u2", "acct");
        assert_eq!(next.messages.len(), 1);
        assert!(next.resolution_attempted);
        assert_eq!(next.user_id, "u2");
    }

    #[test]
    fn test_last_user_message() {
        let mut state = ConversationState::new("t", "u", "a");
        state.messages.push(Message::user("first"));
        state.messages.push(Message::assistant("reply"));
        state.messages.push(Message::tool("tool output"));
        assert_eq!(state.last_user_message().unwrap().content, "first");
        assert_eq!(state.last_assistant_message().unwrap().content, "reply");
        assert_eq!(state.last_message().unwrap().content, "tool output");
    }
}
