//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DESKHUB__*` 覆盖
//! （双下划线表示嵌套，如 `DESKHUB__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub log: LogSection,
}

/// [app] 段：租户与默认身份
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 租户账号（知识库与工单按账号隔离）
    pub account_id: String,
    /// CLI 默认的外部用户 ID
    pub user_id: String,
    /// 工单渠道标识
    pub channel: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            account_id: "cultpass".to_string(),
            user_id: "local-user".to_string(),
            channel: "chat".to_string(),
        }
    }
}

/// [llm] 段：后端选择与模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock；无 API Key 时自动回落到 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub embedding: EmbeddingSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            embedding: EmbeddingSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [llm.embedding] 段：语义检索使用的嵌入模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self { model: default_embedding_model() }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// [retrieval] 段：知识库检索参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// 返回的最大条目数
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// 文章分块窗口（字符数）
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// 相邻块重叠（字符数）
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// 关键词回退模式的最低接受分
    #[serde(default = "default_min_keyword_score")]
    pub min_keyword_score: f32,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_keyword_score: default_min_keyword_score(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_min_keyword_score() -> f32 {
    2.0
}

/// [storage] 段：SQLite 数据库路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// 工单中枢库（用户 / 工单 / 消息 / 知识库）
    pub hub_db: PathBuf,
    /// 外部产品库（客户 / 订阅 / 预订 / 体验），由查询工具只读访问
    pub product_db: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            hub_db: PathBuf::from("data/deskhub.db"),
            product_db: PathBuf::from("data/product.db"),
        }
    }
}

/// [log] 段：日志输出格式
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogSection {
    /// true 时输出 JSON lines
    pub json: bool,
}

/// 从 config 目录加载配置，环境变量 DESKHUB__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DESKHUB__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DESKHUB")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.account_id, "cultpass");
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.retrieval.chunk_size, 1000);
        assert_eq!(cfg.retrieval.chunk_overlap, 200);
        assert_eq!(cfg.llm.provider, "openai");
        assert!(!cfg.log.json);
    }
}
