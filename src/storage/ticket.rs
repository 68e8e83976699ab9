//! 工单中枢库
//!
//! 实体：users / tickets / ticket_metadata / ticket_messages / knowledge_articles。
//! 保存以 (role, content 前 500 字符) 去重，同一工单重复调用不会重复落消息；
//! 元数据状态随工单生命周期更新（open / resolved / escalated）。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::core::{Classification, Message};
use crate::retrieval::KnowledgeArticle;
use crate::storage::StorageError;

/// 消息去重比较使用的内容前缀长度
const DEDUP_PREFIX_CHARS: usize = 500;

/// 单次保存请求：图到达 end 后的整个回合
pub struct SaveConversation<'a> {
    pub ticket_id: &'a str,
    pub account_id: &'a str,
    pub external_user_id: &'a str,
    pub channel: &'a str,
    pub messages: &'a [Message],
    pub classification: Option<&'a Classification>,
    /// open / resolved / escalated
    pub status: &'a str,
}

/// 历史查询返回的单条存储消息
#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 历史查询返回的单个工单
#[derive(Clone, Debug)]
pub struct TicketHistory {
    pub ticket_id: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub issue_type: Option<String>,
    pub messages: Vec<StoredMessage>,
}

/// 用户偏好摘要：从历史工单推导
#[derive(Clone, Debug, Default)]
pub struct PreferenceDigest {
    pub resolved_count: usize,
    pub most_common_issue: Option<(String, usize)>,
}

/// 工单中枢库
pub struct TicketStore {
    conn: Mutex<Connection>,
}

impl TicketStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::bootstrap(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn bootstrap(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                user_id          TEXT PRIMARY KEY,
                account_id       TEXT NOT NULL,
                external_user_id TEXT NOT NULL,
                user_name        TEXT NOT NULL,
                UNIQUE (account_id, external_user_id)
            );
            CREATE TABLE IF NOT EXISTS tickets (
                ticket_id  TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                user_id    TEXT NOT NULL REFERENCES users (user_id),
                channel    TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ticket_metadata (
                ticket_id       TEXT PRIMARY KEY REFERENCES tickets (ticket_id),
                status          TEXT NOT NULL,
                main_issue_type TEXT,
                tags            TEXT,
                updated_at      TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ticket_messages (
                message_id TEXT PRIMARY KEY,
                ticket_id  TEXT NOT NULL REFERENCES tickets (ticket_id),
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS knowledge_articles (
                article_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                title      TEXT NOT NULL,
                content    TEXT NOT NULL,
                tags       TEXT
            );",
        )?;
        Ok(())
    }

    /// 保存一个回合：单事务内补齐用户 / 工单 / 元数据并去重写入消息。
    /// 任一步失败则整体回滚，未提交状态全部丢弃。
    pub fn save_conversation(&self, req: &SaveConversation<'_>) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        // get-or-create 用户
        let user_id: String = match tx
            .query_row(
                "SELECT user_id FROM users WHERE account_id = ?1 AND external_user_id = ?2",
                params![req.account_id, req.external_user_id],
                |row| row.get(0),
            )
            .optional()?
        {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO users (user_id, account_id, external_user_id, user_name)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        id,
                        req.account_id,
                        req.external_user_id,
                        format!("User {}", req.external_user_id)
                    ],
                )?;
                id
            }
        };

        // get-or-create 工单
        let ticket_exists: Option<String> = tx
            .query_row(
                "SELECT ticket_id FROM tickets WHERE ticket_id = ?1",
                params![req.ticket_id],
                |row| row.get(0),
            )
            .optional()?;
        if ticket_exists.is_none() {
            tx.execute(
                "INSERT INTO tickets (ticket_id, account_id, user_id, channel, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![req.ticket_id, req.account_id, user_id, req.channel, now],
            )?;
        }

        // upsert 元数据
        let issue_type = req.classification.map(|c| c.issue_type.as_str());
        let tags = req.classification.and_then(|c| c.tags.as_deref());
        let metadata_exists: Option<String> = tx
            .query_row(
                "SELECT ticket_id FROM ticket_metadata WHERE ticket_id = ?1",
                params![req.ticket_id],
                |row| row.get(0),
            )
            .optional()?;
        if metadata_exists.is_none() {
            tx.execute(
                "INSERT INTO ticket_metadata (ticket_id, status, main_issue_type, tags, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![req.ticket_id, req.status, issue_type, tags, now],
            )?;
        } else {
            tx.execute(
                "UPDATE ticket_metadata
                 SET status = ?2, main_issue_type = COALESCE(?3, main_issue_type),
                     tags = COALESCE(?4, tags), updated_at = ?5
                 WHERE ticket_id = ?1",
                params![req.ticket_id, req.status, issue_type, tags, now],
            )?;
        }

        // 已存在消息的 (role, content 前缀) 集合
        let mut existing: HashSet<(String, String)> = HashSet::new();
        {
            let mut stmt = tx.prepare(
                "SELECT role, substr(content, 1, ?2) FROM ticket_messages WHERE ticket_id = ?1",
            )?;
            let rows = stmt.query_map(params![req.ticket_id, DEDUP_PREFIX_CHARS as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                existing.insert(row?);
            }
        }

        for msg in req.messages {
            let prefix: String = msg.content.chars().take(DEDUP_PREFIX_CHARS).collect();
            let key = (msg.role.as_str().to_string(), prefix);
            if existing.contains(&key) {
                continue;
            }
            tx.execute(
                "INSERT INTO ticket_messages (message_id, ticket_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    req.ticket_id,
                    msg.role.as_str(),
                    msg.content,
                    now
                ],
            )?;
            existing.insert(key);
        }

        tx.commit()?;
        Ok(())
    }

    /// 某账号下全部知识库文章（启动时加载一次）
    pub fn knowledge_articles(&self, account_id: &str) -> Result<Vec<KnowledgeArticle>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT title, content, tags FROM knowledge_articles WHERE account_id = ?1",
        )?;
        let rows = stmt.query_map(params![account_id], |row| {
            Ok(KnowledgeArticle {
                title: row.get(0)?,
                content: row.get(1)?,
                tags: row.get(2)?,
            })
        })?;
        let mut articles = Vec::new();
        for row in rows {
            articles.push(row?);
        }
        Ok(articles)
    }

    pub fn insert_article(
        &self,
        account_id: &str,
        title: &str,
        content: &str,
        tags: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO knowledge_articles (article_id, account_id, title, content, tags)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![Uuid::new_v4().to_string(), account_id, title, content, tags],
        )?;
        Ok(())
    }

    /// 某用户最近的工单历史（含消息），新工单在前
    pub fn conversation_history(
        &self,
        account_id: &str,
        external_user_id: &str,
        limit: usize,
    ) -> Result<Vec<TicketHistory>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;

        let user_id: Option<String> = conn
            .query_row(
                "SELECT user_id FROM users WHERE account_id = ?1 AND external_user_id = ?2",
                params![account_id, external_user_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(user_id) = user_id else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(
            "SELECT t.ticket_id, t.created_at,
                    COALESCE(m.status, 'unknown'), m.main_issue_type
             FROM tickets t
             LEFT JOIN ticket_metadata m ON m.ticket_id = t.ticket_id
             WHERE t.account_id = ?1 AND t.user_id = ?2
             ORDER BY t.created_at DESC
             LIMIT ?3",
        )?;
        let tickets = stmt.query_map(params![account_id, user_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, DateTime<Utc>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut histories = Vec::new();
        for ticket in tickets {
            let (ticket_id, created_at, status, issue_type) = ticket?;
            let mut msg_stmt = conn.prepare(
                "SELECT role, content, created_at FROM ticket_messages
                 WHERE ticket_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = msg_stmt.query_map(params![ticket_id], |row| {
                Ok(StoredMessage {
                    role: row.get(0)?,
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            histories.push(TicketHistory {
                ticket_id,
                created_at,
                status,
                issue_type,
                messages,
            });
        }
        Ok(histories)
    }

    /// 偏好摘要：已解决工单数与最常见问题类型
    pub fn preference_digest(
        &self,
        account_id: &str,
        external_user_id: &str,
    ) -> Result<PreferenceDigest, StorageError> {
        let histories = self.conversation_history(account_id, external_user_id, 20)?;
        let mut digest = PreferenceDigest::default();
        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for h in &histories {
            if h.status == "resolved" {
                digest.resolved_count += 1;
            }
            if let Some(issue) = &h.issue_type {
                *counts.entry(issue.clone()).or_insert(0) += 1;
            }
        }
        digest.most_common_issue = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));
        Ok(digest)
    }
}
