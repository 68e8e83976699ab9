//! SQLite 持久化
//!
//! 两个库：工单中枢库（用户 / 工单 / 元数据 / 消息 / 知识库文章）与
//! 外部产品库（客户 / 订阅 / 预订 / 体验，查询工具只读访问）。
//! 连接以 Mutex 会话化持有，每次保存一个事务，出错回滚、任何退出路径都释放。

pub mod product;
pub mod ticket;

use thiserror::Error;

pub use product::{
    CustomerProfile, ExperienceRecord, ProductStore, ReservationRecord, SubscriptionRecord,
};
pub use ticket::{PreferenceDigest, SaveConversation, StoredMessage, TicketHistory, TicketStore};

/// 存储层错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection lock poisoned")]
    Poisoned,
}
