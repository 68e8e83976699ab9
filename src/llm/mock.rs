//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 支持预置回复队列：每次 complete 弹出一条；队列为空时返回固定兜底文案，
//! 便于在无 Key 环境跑通 分类 -> 解答 -> 升级 全流程。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::Message;
use crate::llm::LlmClient;

/// Mock 客户端：按脚本顺序返回预置回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置回复脚本（按 complete 调用顺序消费）
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        let scripted = self.responses.lock().ok().and_then(|mut queue| queue.pop_front());
        Ok(scripted.unwrap_or_else(|| {
            "I understand your question. Let me help you with that.".to_string()
        }))
    }
}
