//! 路由器：工单生命周期状态机的纯决策函数
//!
//! route(state) 只依赖传入状态，给定相同状态必得相同结果，无任何副作用；
//! 规则 5a 的 escalation_requested 置位以返回值表达，由编排器落到状态上。
//!
//! 决策表（严格优先级）：
//! 1. escalated           -> End（终态吸收）
//! 2. escalation_requested -> Escalation
//! 3. 无 classification    -> Classifier
//! 4. 有 classification 且未尝试解答 -> Resolver
//! 5. 已尝试解答：用户最新消息命中升级词 -> Escalation（并请求升级）；
//!    命中满意词或其它 -> End（每回合只尝试一次解答，不自动循环）
//! 空消息历史直接 End，不调用任何智能体。

use crate::core::{ConversationState, Role};

/// 升级意图词表（大小写不敏感的子串匹配）
const ESCALATION_CUES: &[&str] = &["escalate", "human", "agent", "manager", "supervisor", "speak to"];

/// 满意词表
const SATISFACTION_CUES: &[&str] =
    &["thanks", "thank you", "solved", "resolved", "helpful", "perfect", "great"];

/// 路由目标
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    Classifier,
    Resolver,
    Escalation,
    End,
}

impl RouteTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTarget::Classifier => "classifier",
            RouteTarget::Resolver => "resolver",
            RouteTarget::Escalation => "escalation",
            RouteTarget::End => "end",
        }
    }
}

/// 路由决策：目标 + 是否同时请求升级（规则 5a）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteDecision {
    pub target: RouteTarget,
    pub request_escalation: bool,
}

impl RouteDecision {
    fn to(target: RouteTarget) -> Self {
        Self { target, request_escalation: false }
    }
}

/// 状态 -> 下一步。纯函数。
pub fn route(state: &ConversationState) -> RouteDecision {
    if state.messages.is_empty() {
        return RouteDecision::to(RouteTarget::End);
    }

    if state.escalated {
        return RouteDecision::to(RouteTarget::End);
    }

    if state.escalation_requested {
        return RouteDecision::to(RouteTarget::Escalation);
    }

    if state.classification.is_none() {
        return RouteDecision::to(RouteTarget::Classifier);
    }

    if !state.resolution_attempted {
        return RouteDecision::to(RouteTarget::Resolver);
    }

    // 已尝试解答：检查用户最新消息的意图
    let last_user = state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.to_lowercase());
    if let Some(text) = last_user {
        if ESCALATION_CUES.iter().any(|cue| text.contains(cue)) {
            return RouteDecision {
                target: RouteTarget::Escalation,
                request_escalation: true,
            };
        }
        if SATISFACTION_CUES.iter().any(|cue| text.contains(cue)) {
            return RouteDecision::to(RouteTarget::End);
        }
    }

    RouteDecision::to(RouteTarget::End)
}
