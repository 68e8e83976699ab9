//! Agent 错误类型
//!
//! 分类失败回退默认分类、落地失败强制升级、工具失败写回错误结果、
//! 智能体失败由边界捕获并替换为兜底消息、持久化失败仅记日志——任何错误都不直接抛给用户。

use thiserror::Error;

/// 工单流转过程中可能出现的错误（LLM、解析、工具、存储）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}
