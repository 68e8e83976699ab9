//! Deskhub - 多智能体客服工单系统
//!
//! 模块划分：
//! - **agents**: 路由器（纯决策函数）、分类、解答（落地 + 工具循环）、升级
//! - **app**: 应用上下文 HubApp 与对话入口 send
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话状态、检查点子集与错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、嵌入 API
//! - **observability**: 结构化日志初始化
//! - **retrieval**: 知识库索引（语义 / 关键词回退）
//! - **storage**: SQLite 持久化（工单中枢库 / 产品库）
//! - **tools**: 工具箱（知识库检索、账号查询、退款提交）与注册表
//! - **workflow**: 图编排与线程级检查点

pub mod agents;
pub mod app;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod retrieval;
pub mod storage;
pub mod tools;
pub mod workflow;

pub use app::HubApp;
