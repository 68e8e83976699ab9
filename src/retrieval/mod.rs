//! 知识库检索子系统
//!
//! 对一段自由文本查询返回至多 top_k 条排序后的知识库摘录。
//! 两种可互换策略，启动时按嵌入服务可用性选择：
//! - 语义模式：文章分块 -> 嵌入 -> 余弦近邻（index）
//! - 关键词回退：去停用词的加权词重叠打分（keyword）
//!
//! 契约：search 永不 panic，总是返回带 success 标志的结构化结果；
//! 内部失败转为 success=false 与错误消息；空知识库立即 success=false。

pub mod index;
pub mod keyword;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RetrievalSection;
use crate::llm::EmbeddingProvider;

pub use index::SemanticIndex;
pub use keyword::KeywordIndex;

/// 知识库文章（从存储加载，启动后只读）
#[derive(Clone, Debug)]
pub struct KnowledgeArticle {
    pub title: String,
    pub content: String,
    pub tags: Option<String>,
}

/// 检索命中的一条摘录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievedArticle {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub relevance_score: f32,
}

/// 检索结果契约
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub success: bool,
    pub query: String,
    pub articles: Vec<RetrievedArticle>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn hits(query: impl Into<String>, articles: Vec<RetrievedArticle>) -> Self {
        let count = articles.len();
        Self {
            success: true,
            query: query.into(),
            articles,
            count,
            error: None,
        }
    }

    pub fn failure(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            query: query.into(),
            articles: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// 知识库索引：启动时构建一次，此后只读
pub enum KnowledgeIndex {
    Semantic(SemanticIndex),
    Keyword(KeywordIndex),
}

impl KnowledgeIndex {
    /// 构建索引；有嵌入提供方且索引成功则用语义模式，否则回退关键词模式
    pub fn build(
        articles: Vec<KnowledgeArticle>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        cfg: &RetrievalSection,
    ) -> Self {
        if let Some(embedder) = embedder {
            match SemanticIndex::build(&articles, embedder, cfg) {
                Ok(index) => {
                    tracing::info!(
                        chunks = index.len(),
                        "knowledge index built in semantic mode"
                    );
                    return KnowledgeIndex::Semantic(index);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "semantic indexing failed, using keyword matching");
                }
            }
        }
        KnowledgeIndex::Keyword(KeywordIndex::new(articles, cfg))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            KnowledgeIndex::Semantic(_) => "semantic",
            KnowledgeIndex::Keyword(_) => "keyword",
        }
    }

    /// 检索；永不 panic，任何内部失败都折叠为 success=false
    pub fn search(&self, query: &str) -> SearchOutcome {
        match self {
            KnowledgeIndex::Semantic(index) => index.search(query),
            KnowledgeIndex::Keyword(index) => index.search(query),
        }
    }
}
