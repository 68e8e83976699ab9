//! 应用上下文
//!
//! HubApp 在进程启动时构建一次（LLM、嵌入、存储、知识索引、工具箱、工作流、
//! 检查点），以引用传给请求处理方——没有模块级全局单例。
//! send 是对话入口：同一调用幂等，回合持久化为尽力而为，失败只记日志。

use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::core::{ConversationState, Message};
use crate::llm::{create_embedder_from_config, LlmClient, MockLlmClient, OpenAiClient};
use crate::retrieval::KnowledgeIndex;
use crate::storage::{ProductStore, SaveConversation, TicketStore};
use crate::tools::{
    ExperienceLookupTool, KnowledgeSearchTool, RefundTool, ReservationLookupTool,
    SubscriptionLookupTool, ToolRegistry, UserLookupTool,
};
use crate::workflow::{CheckpointStore, TicketWorkflow};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "openai" && std::env::var("OPENAI_API_KEY").is_ok() {
        tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            None,
        ))
    } else {
        if provider != "mock" {
            tracing::warn!("No API key set or provider unknown, using Mock LLM");
        }
        Arc::new(MockLlmClient::new())
    }
}

/// 应用上下文：工作流 + 检查点 + 工单库
pub struct HubApp {
    cfg: AppConfig,
    workflow: TicketWorkflow,
    checkpoints: CheckpointStore,
    tickets: Arc<TicketStore>,
}

impl HubApp {
    /// 构建应用：打开两个库、加载知识库并建索引（启动后只读）、注册全部工具
    pub fn new(cfg: AppConfig) -> anyhow::Result<Self> {
        let llm = create_llm_from_config(&cfg);

        let tickets = Arc::new(
            TicketStore::open(&cfg.storage.hub_db).context("failed to open hub database")?,
        );
        let products = Arc::new(
            ProductStore::open(&cfg.storage.product_db)
                .context("failed to open product database")?,
        );

        let articles = tickets
            .knowledge_articles(&cfg.app.account_id)
            .context("failed to load knowledge base")?;
        if articles.is_empty() {
            tracing::warn!(
                account_id = %cfg.app.account_id,
                "knowledge base is empty; the resolver will escalate every ticket"
            );
        }
        let embedder = create_embedder_from_config(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.embedding.model,
            None,
        );
        let index = Arc::new(KnowledgeIndex::build(articles, embedder, &cfg.retrieval));
        tracing::info!(mode = index.mode(), "retrieval strategy selected");

        let mut registry = ToolRegistry::new();
        registry.register(KnowledgeSearchTool::new(index));
        registry.register(UserLookupTool::new(products.clone()));
        registry.register(SubscriptionLookupTool::new(products.clone()));
        registry.register(ReservationLookupTool::new(products.clone()));
        registry.register(ExperienceLookupTool::new(products));
        registry.register(RefundTool);
        let tools = Arc::new(registry);

        Ok(Self {
            workflow: TicketWorkflow::new(llm, tools),
            checkpoints: CheckpointStore::new(),
            tickets,
            cfg,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn store(&self) -> &TicketStore {
        &self.tickets
    }

    /// 对话入口：按 thread_id 从检查点续上状态，驱动图到静止，
    /// 保存检查点与数据库回合，返回最新的助手消息。
    pub async fn send(
        &self,
        thread_id: &str,
        user_id: &str,
        account_id: &str,
        text: &str,
    ) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "Please provide a message.".to_string();
        }

        let mut state = match self.checkpoints.load(thread_id) {
            Some(checkpoint) => {
                ConversationState::resume(checkpoint, thread_id, user_id, account_id)
            }
            None => ConversationState::new(thread_id, user_id, account_id),
        };
        state.messages.push(Message::user(text));

        self.workflow.invoke(&mut state).await;

        self.checkpoints.save(thread_id, state.to_checkpoint());

        // 尽力持久化：失败不影响已生成的回复
        let status = if state.escalated {
            "escalated"
        } else if state.resolution_attempted {
            "resolved"
        } else {
            "open"
        };
        let save = SaveConversation {
            ticket_id: thread_id,
            account_id,
            external_user_id: user_id,
            channel: &self.cfg.app.channel,
            messages: &state.messages,
            classification: state.classification.as_ref(),
            status,
        };
        if let Err(e) = self.tickets.save_conversation(&save) {
            tracing::error!(
                thread_id = %thread_id,
                error = %e,
                "failed to persist conversation"
            );
        }

        state
            .last_assistant_message()
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "I'm processing your request. Please try again.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.storage.hub_db = dir.join("hub.db");
        cfg.storage.product_db = dir.join("product.db");
        cfg
    }

    fn seed_kb(cfg: &AppConfig) {
        let store = TicketStore::open(&cfg.storage.hub_db).unwrap();
        store
            .insert_article(
                &cfg.app.account_id,
                "Password Reset",
                "Open the app, tap 'Forgot password' and follow the reset link.",
                Some("login, password"),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_produces_reply_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        seed_kb(&cfg);
        let app = HubApp::new(cfg).unwrap();

        let reply = app
            .send("t-1", "u-1", "cultpass", "How do I reset my password?")
            .await;
        assert!(!reply.is_empty());

        let history = app
            .store()
            .conversation_history("cultpass", "u-1", 5)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].messages.iter().any(|m| m.role == "user"));
        assert!(history[0].messages.iter().any(|m| m.role == "assistant"));
    }

    #[tokio::test]
    async fn test_repeat_send_deduplicates_messages() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        seed_kb(&cfg);
        let app = HubApp::new(cfg).unwrap();

        app.send("t-1", "u-1", "cultpass", "How do I reset my password?")
            .await;
        let before = app
            .store()
            .conversation_history("cultpass", "u-1", 5)
            .unwrap()[0]
            .messages
            .len();

        // 同一 thread 的后续回合带着完整历史再次保存，不能重复落旧消息
        app.send("t-1", "u-1", "cultpass", "thanks, that solved it").await;
        let after = app
            .store()
            .conversation_history("cultpass", "u-1", 5)
            .unwrap()[0]
            .messages
            .len();
        assert!(after > before);
        assert!(after <= before + 2);
    }

    #[tokio::test]
    async fn test_empty_message_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let app = HubApp::new(cfg).unwrap();

        let reply = app.send("t-1", "u-1", "cultpass", "   ").await;
        assert_eq!(reply, "Please provide a message.");
    }
}
