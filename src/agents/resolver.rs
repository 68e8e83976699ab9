//! 解答智能体：落地强制与工具执行核心
//!
//! 关键正确性性质：任何答案产出前必须先尝试一次知识库检索。流程：
//! 1. 取最新消息为问题，无条件调用检索工具（任何模型推理之前）
//! 2. 解析检索结果（容忍对象与字符串化 JSON 两种形态）
//! 3. 分类置信度 < 0.5 或检索无结果 -> 不调用答案模型，直接请求升级
//! 4. 否则拼落地 system prompt，检索结果以工具消息追加，发起带工具的模型调用
//! 5. 模型请求的工具按名执行；未注册工具名以错误形结果回传（不静默跳过）；
//!    工具异常折叠为错误文本写回对话，只保证一轮「观察结果再作答」
//! 6. 无论成败，退出时恰好置位一次 resolution_attempted；
//!    顶层兜底把任何意外错误转成道歉消息并请求升级——回合永远有用户可见输出。

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::agents::extract_json;
use crate::core::{AgentError, ConversationState, Message};
use crate::llm::LlmClient;
use crate::retrieval::SearchOutcome;
use crate::tools::{tool_call_schema_json, ToolRegistry, KNOWLEDGE_SEARCH_TOOL};

/// 低于此置信度不尝试作答，直接升级
const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

const RESOLVER_PROMPT: &str = "You are a helpful customer support agent for CultPass. \
Your goal is to resolve customer issues efficiently and accurately. Ground every answer \
in the knowledge base result provided below; use the available tools to look up account \
information when needed.\n\n\
Guidelines:\n\
- Always be polite and professional\n\
- Use tools to get accurate information before responding\n\
- If you cannot resolve an issue, suggest escalating to human support\n\
- For login issues, guide users through password reset\n\
- For subscription questions, check their subscription status first\n\
- For reservation issues, look up their reservations\n\
- Only submit refunds if explicitly approved (use the refund tool with caution)\n\
- Provide clear, actionable solutions";

const APOLOGY_ESCALATION: &str = "I'm sorry - I couldn't find a reliable answer for this \
request in our knowledge base. Let me connect you with our human support team who can \
help further.";

const FAILURE_ESCALATION: &str = "I'm sorry - I ran into a problem while working on your \
request. Let me hand this over to our human support team.";

const EMPTY_ANSWER_FALLBACK: &str = "I understand your question. Let me help you with that.";

const POST_TOOL_FALLBACK: &str = "I've looked up the information, but I'm having trouble \
formulating a response. Please try rephrasing your question.";

/// 模型请求的单个工具调用：{"tool": "...", "args": {...}}
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// 模型输出的两种形态：最终答案文本，或一组工具调用
enum ResolverOutput {
    Answer(String),
    ToolCalls(Vec<ToolCall>),
}

/// 解析模型输出：含合法 tool call JSON（单个对象或数组）则为 ToolCalls，否则整段视为答案
fn parse_resolver_output(output: &str) -> ResolverOutput {
    let Some(json) = extract_json(output) else {
        return ResolverOutput::Answer(output.trim().to_string());
    };
    if let Ok(call) = serde_json::from_str::<ToolCall>(json) {
        if !call.tool.is_empty() {
            return ResolverOutput::ToolCalls(vec![call]);
        }
    }
    if let Ok(calls) = serde_json::from_str::<Vec<ToolCall>>(json) {
        let calls: Vec<ToolCall> = calls.into_iter().filter(|c| !c.tool.is_empty()).collect();
        if !calls.is_empty() {
            return ResolverOutput::ToolCalls(calls);
        }
    }
    ResolverOutput::Answer(output.trim().to_string())
}

/// 解析检索结果；容忍结构化对象与字符串化 JSON 两种负载
fn parse_search_outcome(raw: &str) -> Option<SearchOutcome> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner).ok()?,
        v => v,
    };
    serde_json::from_value(value).ok()
}

/// 解答智能体
pub struct ResolverAgent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
}

impl ResolverAgent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { llm, tools }
    }

    /// 尝试解答当前工单。退出时 resolution_attempted 必为 true；
    /// 意外错误转为道歉消息并请求升级，不向上传播。
    pub async fn run(&self, state: &mut ConversationState) {
        let outcome = self.attempt(state).await;
        state.resolution_attempted = true;
        if let Err(e) = outcome {
            tracing::error!(
                agent = "resolver",
                thread_id = %state.thread_id,
                error = %e,
                "resolution failed, requesting escalation"
            );
            state.messages.push(Message::assistant(FAILURE_ESCALATION));
            state.escalation_requested = true;
        }
    }

    async fn attempt(&self, state: &mut ConversationState) -> Result<(), AgentError> {
        let Some(question) = state.last_message().map(|m| m.content.clone()) else {
            state
                .messages
                .push(Message::assistant("Could you describe the issue you are running into?"));
            return Ok(());
        };

        // 落地强制：任何模型推理之前先查一次知识库
        let raw_search = match self
            .tools
            .execute(KNOWLEDGE_SEARCH_TOOL, serde_json::json!({ "query": question }))
            .await
        {
            Ok(raw) => raw,
            Err(e) => serde_json::json!({ "success": false, "error": e }).to_string(),
        };
        let search = parse_search_outcome(&raw_search);
        let grounded = search
            .as_ref()
            .map(|s| s.success && !s.articles.is_empty())
            .unwrap_or(false);
        let confidence = state
            .classification
            .as_ref()
            .map(|c| c.confidence)
            .unwrap_or(0.0);

        if confidence < LOW_CONFIDENCE_THRESHOLD || !grounded {
            tracing::info!(
                agent = "resolver",
                thread_id = %state.thread_id,
                confidence,
                grounded,
                "escalating without an answer attempt"
            );
            state.messages.push(Message::assistant(APOLOGY_ESCALATION));
            state.escalation_requested = true;
            return Ok(());
        }

        let mut conversation = vec![
            Message::system(self.system_prompt(state)),
            Message::user(question),
            Message::tool(format!("{KNOWLEDGE_SEARCH_TOOL}: {raw_search}")),
        ];

        let first = self
            .llm
            .complete(&conversation)
            .await
            .map_err(AgentError::LlmError)?;

        match parse_resolver_output(&first) {
            ResolverOutput::Answer(text) => {
                let answer = if text.is_empty() {
                    EMPTY_ANSWER_FALLBACK.to_string()
                } else {
                    text
                };
                state.messages.push(Message::assistant(answer));
            }
            ResolverOutput::ToolCalls(calls) => {
                conversation.push(Message::assistant(first.clone()));
                for call in calls {
                    // 未注册工具与执行失败都以错误形结果回传给模型
                    let result = match self.tools.execute(&call.tool, call.args.clone()).await {
                        Ok(r) => r,
                        Err(e) => serde_json::json!({ "success": false, "error": e }).to_string(),
                    };
                    tracing::info!(
                        agent = "resolver",
                        thread_id = %state.thread_id,
                        tool_name = %call.tool,
                        "tool call executed"
                    );
                    conversation.push(Message::tool(format!("{}: {}", call.tool, result)));
                }

                // 只保证这一轮「观察工具结果再作答」，无无界递归
                let final_reply = self
                    .llm
                    .complete(&conversation)
                    .await
                    .map_err(AgentError::LlmError)?;
                let answer = match parse_resolver_output(&final_reply) {
                    ResolverOutput::Answer(text) if !text.is_empty() => text,
                    _ => POST_TOOL_FALLBACK.to_string(),
                };
                state.messages.push(Message::assistant(answer));
            }
        }
        Ok(())
    }

    fn system_prompt(&self, state: &ConversationState) -> String {
        let classification_note = state
            .classification
            .as_ref()
            .map(|c| {
                format!(
                    "Ticket classification: {} (urgency: {}, confidence: {:.2})\nSummary: {}\n\n",
                    c.issue_type.as_str(),
                    c.urgency.as_str(),
                    c.confidence,
                    c.summary
                )
            })
            .unwrap_or_default();
        let tool_lines: String = self
            .tools
            .tool_descriptions()
            .iter()
            .map(|(name, desc)| format!("- {name}: {desc}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{RESOLVER_PROMPT}\n\n{classification_note}Available tools:\n{tool_lines}\n\n\
             To call a tool, reply with a single JSON object matching this schema:\n{}\n\
             A JSON list of such objects calls several tools. \
             Reply with plain text to give the customer the final answer.",
            tool_call_schema_json()
        )
    }
}
