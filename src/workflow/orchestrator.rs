//! 编排器：有向图驱动
//!
//! 入口为路由器；路由器按条件转移到 分类 / 解答 / 升级 或终止；
//! 分类与解答完成后回环到路由器，升级总是终止。单回合内节点严格串行执行，
//! 一次只有一个智能体修改状态；步数上限防御环路。

use std::sync::Arc;

use crate::agents::{route, ClassifierAgent, EscalationAgent, ResolverAgent, RouteTarget};
use crate::core::ConversationState;
use crate::llm::LlmClient;
use crate::tools::ToolRegistry;

/// 单回合最大图步数（正常路径最多 4 次路由）
const MAX_GRAPH_STEPS: usize = 8;

/// 工单工作流：路由器 + 三个智能体节点
pub struct TicketWorkflow {
    classifier: ClassifierAgent,
    resolver: ResolverAgent,
    escalation: EscalationAgent,
}

impl TicketWorkflow {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            classifier: ClassifierAgent::new(llm.clone()),
            resolver: ResolverAgent::new(llm.clone(), tools),
            escalation: EscalationAgent::new(llm),
        }
    }

    /// 驱动图直到静止（路由到 end 或升级节点执行完毕）
    pub async fn invoke(&self, state: &mut ConversationState) {
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_GRAPH_STEPS {
                tracing::warn!(
                    thread_id = %state.thread_id,
                    "graph step limit reached, ending turn"
                );
                break;
            }

            let decision = route(state);
            if decision.request_escalation {
                state.escalation_requested = true;
            }
            tracing::info!(
                agent = "supervisor",
                thread_id = %state.thread_id,
                routing_decision = decision.target.as_str(),
                "routing"
            );

            match decision.target {
                RouteTarget::Classifier => self.classifier.run(state).await,
                RouteTarget::Resolver => {
                    let requested_before = state.escalation_requested;
                    self.resolver.run(state).await;
                    // 解答方自己请求升级时本回合到此为止：用户先看到道歉消息，
                    // 升级节点由下一回合的路由规则 2 接手
                    if state.escalation_requested && !requested_before {
                        break;
                    }
                }
                RouteTarget::Escalation => {
                    // 升级节点没有回环边，执行后回合终止
                    self.escalation.run(state).await;
                    break;
                }
                RouteTarget::End => break,
            }
        }
    }
}
